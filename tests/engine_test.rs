//! End-to-end tests of the parse, read and unzip flows.
//!
//! Fixtures are built on the fly: small zip archives written with
//! `zip::ZipWriter` and plain directory trees, both under a `TempDir`.

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use folio::crypto::{CipherProvider, CryptoProvider, CryptorConfig, Mode, Purpose, run_entry};
use folio::formats::{Comic, ComicBook, RawComicBook, RawComicItem};
use folio::{Action, Book, Content, ErrorCode, Format, Item, ItemBase, OptionSchema, ParseContext, Parser, Task};
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const PAGES: &[(&str, &[u8])] = &[
    ("pages/p10.png", b"tenth page"),
    ("pages/p2.png", b"second page!"),
    ("pages/p1.png", b"first"),
    ("notes.txt", b"caf\xe9 notes"),
];

fn write_zip(path: &Path, files: &[(&str, Vec<u8>)]) {
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    zip.add_directory("pages/", SimpleFileOptions::default()).unwrap();
    for (name, data) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

fn plain_files() -> Vec<(&'static str, Vec<u8>)> {
    PAGES.iter().map(|(n, d)| (*n, d.to_vec())).collect()
}

fn archive_fixture(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("volume1.cbz");
    write_zip(&path, &plain_files());
    path
}

fn directory_fixture(dir: &TempDir) -> PathBuf {
    let root = dir.path().join("volume1");
    for (name, data) in PAGES {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }
    root
}

fn options(value: Value) -> Map<String, Value> {
    value.as_object().unwrap().clone()
}

fn page_paths(book: &ComicBook) -> Vec<&str> {
    book.items().iter().map(|item| item.path()).collect()
}

fn missing_item() -> folio::formats::ComicItem {
    let raw = RawComicBook {
        title: None,
        items: vec![RawComicItem {
            base: ItemBase::builder().index(0).path("pages/gone.png").size(5).build().unwrap(),
            extension: "png".into(),
        }],
    };
    ComicBook::from_raw(raw).unwrap().items()[0].clone()
}

// ============================================================================
// Parse
// ============================================================================

#[test]
fn test_parse_archive_orders_pages_naturally() {
    let dir = TempDir::new().unwrap();
    let mut parser = Parser::new(archive_fixture(&dir), Comic::new());
    let book = parser.parse(None).unwrap();

    assert_eq!(book.title(), Some("volume1"));
    assert_eq!(page_paths(&book), vec!["pages/p1.png", "pages/p2.png", "pages/p10.png"]);
    for (i, item) in book.items().iter().enumerate() {
        assert_eq!(item.index(), i);
        assert_eq!(item.extension(), "png");
    }
    assert_eq!(book.items()[1].size(), 12);
}

#[test]
fn test_archive_and_directory_parse_the_same() {
    let dir = TempDir::new().unwrap();
    let from_zip = Parser::new(archive_fixture(&dir), Comic::new()).parse(None).unwrap();
    let from_dir = Parser::new(directory_fixture(&dir), Comic::new()).parse(None).unwrap();
    assert_eq!(from_zip, from_dir);
}

#[test]
fn test_parse_options_override_defaults() {
    let dir = TempDir::new().unwrap();
    let mut parser = Parser::new(archive_fixture(&dir), Comic::new());
    let opts = options(json!({ "title": "Custom", "extensions": ["txt"] }));
    let book = parser.parse(Some(&opts)).unwrap();
    assert_eq!(book.title(), Some("Custom"));
    assert_eq!(page_paths(&book), vec!["notes.txt"]);
}

#[test]
fn test_options_are_validated_before_the_input_is_opened() {
    let mut parser = Parser::new("/definitely/not/here.cbz", Comic::new());
    let opts = options(json!({ "overwrite": "yes" }));
    let err = parser.parse(Some(&opts)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert!(err.to_string().contains("overwrite"));

    let err = parser.parse(None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoSuchPath);
}

#[test]
fn test_read_options_are_validated_before_the_input_is_opened() {
    let mut parser = Parser::new("/definitely/not/here.cbz", Comic::new());
    for bad in [json!({ "range": [9, 2] }), json!({ "range": [1] }), json!({ "encoding": "klingon" })] {
        let err = parser.read_item(&missing_item(), Some(&options(bad.clone()))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument, "{bad}");
    }

    let err = parser.read_item(&missing_item(), Some(&options(json!({ "range": [2, 9] })))).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoSuchPath);
}

/// Comic pages without the ability to expand the container.
struct SealedComic;

impl Format for SealedComic {
    type Book = ComicBook;

    fn name(&self) -> &str {
        "sealed-comic"
    }

    fn parse_schema(&self) -> OptionSchema {
        Comic::new().parse_schema()
    }

    fn parse_tasks(&self) -> Vec<Task<ParseContext<ComicBook>>> {
        Comic::new().parse_tasks()
    }

    fn parse_after_tasks(&self) -> Vec<Task<ParseContext<ComicBook>>> {
        Comic::new().parse_after_tasks()
    }

    fn supports_unzip(&self) -> bool {
        false
    }
}

#[test]
fn test_unsupported_unzip_fails_before_the_input_is_opened() {
    let dir = TempDir::new().unwrap();
    let mut parser = Parser::new("/definitely/not/here.cbz", SealedComic);
    let opts = options(json!({ "unzip_path": dir.path().join("out").display().to_string() }));
    let err = parser.parse(Some(&opts)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotImplemented);
    assert!(!dir.path().join("out").exists());

    let err = parser.unzip(dir.path().join("out"), false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotImplemented);

    let mut parser = Parser::new(archive_fixture(&dir), SealedComic);
    assert_eq!(parser.parse(None).unwrap().items().len(), 3);
}

#[test]
fn test_parse_without_images_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.cbz");
    write_zip(&path, &[("readme.txt", b"nothing here".to_vec())]);
    let err = Parser::new(path, Comic::new()).parse(None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingElement);
}

#[test]
fn test_to_raw_round_trips_through_json() {
    let dir = TempDir::new().unwrap();
    let book = Parser::new(archive_fixture(&dir), Comic::new()).parse(None).unwrap();
    let json = serde_json::to_string(&book.to_raw()).unwrap();
    let raw: RawComicBook = serde_json::from_str(&json).unwrap();
    assert_eq!(ComicBook::from_raw(raw).unwrap(), book);
}

#[test]
fn test_progress_reports_every_task() {
    let dir = TempDir::new().unwrap();
    let mut parser = Parser::new(archive_fixture(&dir), Comic::new());
    assert_eq!(
        parser.parse_pipeline(None).names(),
        vec!["validate-options", "open-entries", "scan-images", "require-images", "unzip", "build-book"]
    );

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    parser.set_progress(move |p| sink.borrow_mut().push((p.step, p.total, p.action)));

    let book = parser.parse(None).unwrap();
    parser.read_item(&book.items()[0], None).unwrap();

    let seen = seen.borrow();
    let parse: Vec<_> = seen.iter().filter(|p| p.2 == Action::Parse).collect();
    assert_eq!(parse.len(), 6);
    assert_eq!(*parse[5], (6, 6, Action::Parse));
    let read: Vec<_> = seen.iter().filter(|p| p.2 == Action::ReadItems).collect();
    assert_eq!(read.len(), 4);
}

// ============================================================================
// Read
// ============================================================================

#[test]
fn test_read_item_bytes_text_and_range() {
    let dir = TempDir::new().unwrap();
    let mut parser = Parser::new(archive_fixture(&dir), Comic::new());
    let book = parser.parse(None).unwrap();
    let second = &book.items()[1];

    let bytes = parser.read_item(second, None).unwrap();
    assert_eq!(bytes, Content::Bytes(b"second page!".to_vec()));

    let opts = options(json!({ "range": [7, 11] }));
    assert_eq!(parser.read_item(second, Some(&opts)).unwrap().as_bytes(), b"page");

    let opts = options(json!({ "encoding": "utf-8" }));
    assert_eq!(
        parser.read_item(second, Some(&opts)).unwrap(),
        Content::Text("second page!".into())
    );
}

#[test]
fn test_read_text_with_legacy_encoding() {
    let dir = TempDir::new().unwrap();
    let mut parser = Parser::new(archive_fixture(&dir), Comic::new());
    let opts = options(json!({ "extensions": ["txt"] }));
    let book = parser.parse(Some(&opts)).unwrap();

    let opts = options(json!({ "encoding": "auto" }));
    let text = parser.read_item(&book.items()[0], Some(&opts)).unwrap();
    assert_eq!(text.as_text(), Some("café notes"));

    let opts = options(json!({ "encoding": "klingon" }));
    let err = parser.read_item(&book.items()[0], Some(&opts)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[test]
fn test_read_items_keeps_caller_order() {
    let dir = TempDir::new().unwrap();
    let mut parser = Parser::new(directory_fixture(&dir), Comic::new());
    let book = parser.parse(None).unwrap();
    let items = vec![book.items()[2].clone(), book.items()[0].clone()];
    let contents = parser.read_items(&items, None).unwrap();
    assert_eq!(contents[0].as_bytes(), b"tenth page");
    assert_eq!(contents[1].as_bytes(), b"first");
}

#[test]
fn test_read_missing_item_fails_with_and_without_force() {
    let dir = TempDir::new().unwrap();
    let mut parser = Parser::new(archive_fixture(&dir), Comic::new());
    let gone = missing_item();

    let err = parser.read_item(&gone, None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoSuchFile);

    let opts = options(json!({ "force": true }));
    let err = parser.read_item(&gone, Some(&opts)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoSuchFile);
}

#[test]
fn test_stale_item_needs_force() {
    let dir = TempDir::new().unwrap();
    let root = directory_fixture(&dir);
    let mut parser = Parser::new(&root, Comic::new());
    let book = parser.parse(None).unwrap();

    fs::write(root.join("pages/p1.png"), b"first, redrawn").unwrap();

    let err = parser.read_item(&book.items()[0], None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert!(err.to_string().contains("stale"));

    let opts = options(json!({ "force": true }));
    let fresh = parser.read_item(&book.items()[0], Some(&opts)).unwrap();
    assert_eq!(fresh.as_bytes(), b"first, redrawn");
}

// ============================================================================
// Unzip
// ============================================================================

#[test]
fn test_unzip_twice_needs_overwrite() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("out");
    let mut parser = Parser::new(archive_fixture(&dir), Comic::new());

    assert!(parser.unzip(&target, false).unwrap());
    assert_eq!(fs::read(target.join("pages/p2.png")).unwrap(), b"second page!");
    assert_eq!(fs::read(target.join("notes.txt")).unwrap(), b"caf\xe9 notes");

    let err = parser.unzip(&target, false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);

    fs::write(target.join("stray.bin"), b"x").unwrap();
    assert!(parser.unzip(&target, true).unwrap());
    assert!(!target.join("stray.bin").exists());
}

#[test]
fn test_unzip_during_parse() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("expanded");
    let mut parser = Parser::new(archive_fixture(&dir), Comic::new());
    let opts = options(json!({ "unzip_path": target.to_str().unwrap() }));

    let book = parser.parse(Some(&opts)).unwrap();
    assert_eq!(book.items().len(), 3);

    let from_dir = Parser::new(&target, Comic::new()).parse(None).unwrap();
    assert_eq!(page_paths(&from_dir), page_paths(&book));

    let err = parser.parse(Some(&opts)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
}

// ============================================================================
// Encrypted containers
// ============================================================================

fn png_only(path: &str, _: Purpose) -> bool {
    path.ends_with(".png")
}

fn sealed_archive(dir: &TempDir, provider: &CipherProvider) -> PathBuf {
    let files: Vec<_> = PAGES
        .iter()
        .map(|(name, data)| (*name, run_entry(provider, data.to_vec(), name, Purpose::Write).unwrap()))
        .collect();
    let path = dir.path().join("sealed.cbz");
    write_zip(&path, &files);
    path
}

fn cbc_provider() -> CipherProvider {
    CipherProvider::new(CryptorConfig::new(Mode::Cbc, [3u8; 16]).with_iv([5u8; 16])).protect_if(png_only)
}

#[test]
fn test_whole_buffer_provider_decrypts_reads() {
    let dir = TempDir::new().unwrap();
    let path = sealed_archive(&dir, &cbc_provider());

    let mut parser = Parser::new(&path, Comic::new()).with_provider(cbc_provider());
    let book = parser.parse(None).unwrap();
    assert_eq!(parser.read_item(&book.items()[0], None).unwrap().as_bytes(), b"first");

    let opts = options(json!({ "range": [0, 6] }));
    assert_eq!(parser.read_item(&book.items()[1], Some(&opts)).unwrap().as_bytes(), b"second");

    let mut plain = Parser::new(&path, Comic::new());
    assert_ne!(plain.read_item(&book.items()[0], Some(&options(json!({ "force": true })))).unwrap().as_bytes(), b"first");
}

#[test]
fn test_stream_provider_decrypts_only_the_needed_units() {
    let dir = TempDir::new().unwrap();
    let make = || {
        CipherProvider::new(CryptorConfig::new(Mode::Ctr, [8u8; 32]).with_iv([1u8; 16]))
            .stream_mode(16)
            .unwrap()
            .protect_if(png_only)
    };
    let path = sealed_archive(&dir, &make());

    let provider: Rc<dyn CryptoProvider> = Rc::new(make());
    let mut parser = Parser::new(&path, Comic::new()).with_shared_provider(provider);
    let book = parser.parse(None).unwrap();

    assert_eq!(parser.read_item(&book.items()[2], None).unwrap().as_bytes(), b"tenth page");
    let opts = options(json!({ "range": [3, 8] }));
    assert_eq!(parser.read_item(&book.items()[2], Some(&opts)).unwrap().as_bytes(), b"th pa");
}

#[test]
fn test_cbc_stream_provider_handles_a_short_last_unit() {
    let dir = TempDir::new().unwrap();
    let make = || {
        CipherProvider::new(CryptorConfig::new(Mode::Cbc, [4u8; 16]).with_iv([9u8; 16]))
            .stream_mode(32)
            .unwrap()
    };
    let page: Vec<u8> = (0..100u8).collect();
    let sealed = run_entry(&make(), page.clone(), "pages/p1.png", Purpose::Write).unwrap();
    assert_eq!(sealed.len(), 112);
    let path = dir.path().join("cbc.cbz");
    write_zip(&path, &[("pages/p1.png", sealed)]);

    let mut parser = Parser::new(&path, Comic::new()).with_provider(make());
    let book = parser.parse(None).unwrap();
    let item = &book.items()[0];
    assert_eq!(parser.read_item(item, None).unwrap().as_bytes(), &page[..]);
    for (start, end) in [(0u64, 32u64), (20, 70), (90, 100), (96, 200)] {
        let opts = options(json!({ "range": [start, end] }));
        let end = end.min(100);
        assert_eq!(
            parser.read_item(item, Some(&opts)).unwrap().as_bytes(),
            &page[start as usize..end as usize],
            "range {start}..{end}"
        );
    }

    let target = dir.path().join("copy");
    parser.unzip(&target, false).unwrap();
    assert_eq!(fs::read(target.join("pages/p1.png")).unwrap().len(), 112);
    let mut copy = Parser::new(&target, Comic::new()).with_provider(make());
    let book = copy.parse(None).unwrap();
    assert_eq!(copy.read_item(&book.items()[0], None).unwrap().as_bytes(), &page[..]);
}

#[test]
fn test_unzip_reencrypts_for_write() {
    let dir = TempDir::new().unwrap();
    let path = sealed_archive(&dir, &cbc_provider());
    let target = dir.path().join("copy");

    let mut parser = Parser::new(&path, Comic::new()).with_provider(cbc_provider());
    parser.unzip(&target, false).unwrap();

    let stored = fs::read(target.join("pages/p1.png")).unwrap();
    assert_ne!(stored, b"first");
    assert_eq!(fs::read(target.join("notes.txt")).unwrap(), b"caf\xe9 notes");

    let mut copy = Parser::new(&target, Comic::new()).with_provider(cbc_provider());
    let book = copy.parse(None).unwrap();
    assert_eq!(copy.read_item(&book.items()[0], None).unwrap().as_bytes(), b"first");
}
