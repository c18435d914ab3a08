//! Immutable book and item contracts shared by every format.
//!
//! Formats define their own book and item types and implement [`Book`] and
//! [`Item`] for them. The engine is generic over these traits and never needs
//! to know the concrete format.
//!
//! Items and books are read-only once built. Fields are private and there are
//! no setters, so this does not compile:
//!
//! ```compile_fail
//! let mut item = folio::ItemBase::builder().index(0).path("a.png").size(1).build().unwrap();
//! item.index = 3;
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One addressable content unit of a book.
pub trait Item: Clone + fmt::Debug {
    fn base(&self) -> &ItemBase;

    /// Position of the item in its book.
    fn index(&self) -> usize {
        self.base().index()
    }

    /// Path of the backing entry in the container.
    fn path(&self) -> &str {
        self.base().path()
    }

    /// Stored size of the backing entry when the book was parsed.
    fn size(&self) -> u64 {
        self.base().size()
    }
}

/// The result of parsing one container.
pub trait Book: Sized {
    type Item: Item;

    /// Plain form that fully describes the book. Formats accumulate it while
    /// parsing and [`Book::from_raw`] freezes it.
    type Raw: Serialize + DeserializeOwned + Clone + Default + fmt::Debug;

    fn items(&self) -> &[Self::Item];

    fn to_raw(&self) -> Self::Raw;

    fn from_raw(raw: Self::Raw) -> Result<Self>;

    fn item(&self, index: usize) -> Option<&Self::Item> {
        self.items().get(index)
    }
}

/// Fields every item carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemBase {
    index: usize,
    path: String,
    size: u64,
}

impl ItemBase {
    pub fn builder() -> ItemBuilder {
        ItemBuilder::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Item for ItemBase {
    fn base(&self) -> &ItemBase {
        self
    }
}

/// Mutable staging form of an [`ItemBase`].
#[derive(Debug, Clone, Default)]
pub struct ItemBuilder {
    index: Option<usize>,
    path: Option<String>,
    size: Option<u64>,
}

impl ItemBuilder {
    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }

    /// Freeze into an [`ItemBase`]. Every field must have been set.
    pub fn build(self) -> Result<ItemBase> {
        Ok(ItemBase {
            index: self.index.ok_or_else(|| Error::MissingParameter("item index".into()))?,
            path: self.path.ok_or_else(|| Error::MissingParameter("item path".into()))?,
            size: self.size.ok_or_else(|| Error::MissingParameter("item size".into()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_freezes_all_fields() {
        let mut staging = ItemBase::builder().path("p/1.png").size(42);
        staging.set_index(3);
        let item = staging.build().unwrap();
        assert_eq!(item.index(), 3);
        assert_eq!(Item::path(&item), "p/1.png");
        assert_eq!(Item::size(&item), 42);
    }

    #[test]
    fn test_builder_reports_missing_field() {
        let err = ItemBase::builder().index(0).size(1).build().unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::MissingParameter);
        assert!(err.to_string().contains("item path"));
    }

    #[test]
    fn test_item_base_serde_round_trip() {
        let item = ItemBase::builder().index(1).path("a").size(2).build().unwrap();
        let json = serde_json::to_string(&item).unwrap();
        let back: ItemBase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
