//! Text decoding and path helpers shared by entry sources and formats.

use std::borrow::Cow;
use std::cmp::Ordering;

use percent_encoding::percent_decode_str;

/// Decode bytes to a string.
///
/// With an explicit encoding label (`"utf-8"`, `"gbk"`, `"windows-1252"`, ...)
/// the bytes are decoded with that encoding; a BOM overrides the label. The
/// label `"auto"` tries UTF-8 first and falls back to Windows-1252, which
/// covers most legacy content.
///
/// Returns `None` for a label `encoding_rs` does not know.
pub fn decode_text<'a>(bytes: &'a [u8], label: &str) -> Option<Cow<'a, str>> {
    if label.eq_ignore_ascii_case("auto") {
        let (text, _, malformed) = encoding_rs::UTF_8.decode(bytes);
        if !malformed {
            return Some(text);
        }
        let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
        return Some(text);
    }

    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())?;
    let (text, _, _) = encoding.decode(bytes);
    Some(text)
}

/// Whether [`decode_text`] accepts `label`.
pub fn is_known_encoding(label: &str) -> bool {
    label.eq_ignore_ascii_case("auto") || encoding_rs::Encoding::for_label(label.as_bytes()).is_some()
}

/// Canonical form used for non-strict entry lookups.
///
/// Percent-escapes are decoded, `\` becomes `/`, leading `./` and `/` are
/// dropped and ASCII letters are lowercased.
pub fn normalize_path(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let mut s = decoded.replace('\\', "/");
    loop {
        if let Some(rest) = s.strip_prefix("./") {
            s = rest.to_string();
        } else if let Some(rest) = s.strip_prefix('/') {
            s = rest.to_string();
        } else {
            break;
        }
    }
    s.make_ascii_lowercase();
    s
}

/// Lowercased extension of a `/`-separated path, without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Compare paths so that embedded numbers sort by value: `p2 < p10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (da, ra) = split_digits(a);
                let (db, rb) = split_digits(b);
                let ord = cmp_numeric(da, db);
                if ord != Ordering::Equal {
                    return ord;
                }
                a = ra;
                b = rb;
            }
            (Some(x), Some(y)) => {
                let ord = x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let n = s.iter().take_while(|c| c.is_ascii_digit()).count();
    s.split_at(n)
}

fn cmp_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let trim = |s: &[u8]| -> usize { s.iter().take_while(|&&c| c == b'0').count() };
    let (a, b) = (&a[trim(a)..], &b[trim(b)..]);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
