//! Image-sequence containers (CBZ archives and image directories).
//!
//! Every image entry becomes one page, ordered by natural path order so that
//! `page2.png` comes before `page10.png`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::model::{Book, Item, ItemBase};
use crate::options::OptionSchema;
use crate::parser::{Format, ParseContext};
use crate::pipeline::Task;
use crate::util::{extension, natural_cmp};

const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "avif"];

/// One page of a comic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicItem {
    base: ItemBase,
    extension: String,
}

impl ComicItem {
    /// Lowercased file extension, e.g. `"png"`.
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl Item for ComicItem {
    fn base(&self) -> &ItemBase {
        &self.base
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicBook {
    title: Option<String>,
    items: Vec<ComicItem>,
}

impl ComicBook {
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComicItem {
    #[serde(flatten)]
    pub base: ItemBase,
    pub extension: String,
}

/// Serializable form of a [`ComicBook`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComicBook {
    pub title: Option<String>,
    pub items: Vec<RawComicItem>,
}

impl Book for ComicBook {
    type Item = ComicItem;
    type Raw = RawComicBook;

    fn items(&self) -> &[ComicItem] {
        &self.items
    }

    fn to_raw(&self) -> RawComicBook {
        RawComicBook {
            title: self.title.clone(),
            items: self
                .items
                .iter()
                .map(|item| RawComicItem {
                    base: item.base.clone(),
                    extension: item.extension.clone(),
                })
                .collect(),
        }
    }

    fn from_raw(raw: RawComicBook) -> Result<Self> {
        let items = raw
            .items
            .into_iter()
            .enumerate()
            .map(|(position, RawComicItem { base, extension })| {
                if base.index() != position {
                    return Err(Error::InvalidArgument(format!(
                        "item `{}` has index {} at position {position}",
                        base.path(),
                        base.index()
                    )));
                }
                Ok(ComicItem { base, extension })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ComicBook {
            title: raw.title,
            items,
        })
    }
}

/// The comic format.
#[derive(Debug, Clone, Default)]
pub struct Comic;

impl Comic {
    pub fn new() -> Self {
        Self
    }
}

impl Format for Comic {
    type Book = ComicBook;

    fn name(&self) -> &str {
        "comic"
    }

    fn parse_schema(&self) -> OptionSchema {
        OptionSchema::new()
            .field("extensions", "Array", json!(DEFAULT_EXTENSIONS))
            .field("title", "String|Null", Value::Null)
    }

    fn parse_tasks(&self) -> Vec<Task<ParseContext<ComicBook>>> {
        vec![Task::new("scan-images", |mut ctx: ParseContext<ComicBook>| {
            let wanted: Vec<String> = ctx
                .options
                .array("extensions")
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_ascii_lowercase)
                .collect();

            let entries = ctx.entries()?;
            let mut pages: Vec<(&str, u64, String)> = entries
                .iter()
                .filter_map(|entry| {
                    let ext = extension(entry.path())?;
                    wanted.contains(&ext).then(|| (entry.path(), entry.size(), ext))
                })
                .collect();
            pages.sort_by(|a, b| natural_cmp(a.0, b.0));

            let mut items = Vec::with_capacity(pages.len());
            for (index, (path, size, ext)) in pages.into_iter().enumerate() {
                let base = ItemBase::builder().index(index).path(path).size(size).build()?;
                items.push(RawComicItem {
                    base,
                    extension: ext,
                });
            }
            let title = ctx
                .options
                .str("title")
                .map(str::to_string)
                .unwrap_or_else(|| entries.name().to_string());

            tracing::debug!(pages = items.len(), %title, "scanned comic");
            ctx.raw.items = items;
            ctx.raw.title = Some(title);
            Ok(ctx)
        })]
    }

    fn parse_after_tasks(&self) -> Vec<Task<ParseContext<ComicBook>>> {
        vec![Task::new("require-images", |ctx: ParseContext<ComicBook>| {
            if ctx.raw.items.is_empty() {
                return Err(Error::MissingElement("image entries".into()));
            }
            Ok(ctx)
        })]
    }
}
