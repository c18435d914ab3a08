//! The parse / read / unzip flows shared by every format.
//!
//! A [`Parser`] couples an input path with a [`Format`]. Each call builds a
//! fresh [`Pipeline`] from the engine's own tasks and the format's tasks,
//! then runs it over a fresh context:
//!
//! | flow  | before                           | core            | after                                   |
//! |-------|----------------------------------|-----------------|-----------------------------------------|
//! | parse | validate-options, open-entries   | format tasks    | format tasks, unzip, build-book         |
//! | read  | validate-options, open-entries   | resolve-items, load-contents, format tasks | format tasks |
//!
//! # Example
//!
//! ```no_run
//! use folio::formats::Comic;
//! use folio::{Book, Item, Parser};
//!
//! let mut parser = Parser::new("volume1.cbz", Comic::new());
//! let book = parser.parse(None)?;
//! for item in book.items() {
//!     let bytes = parser.read_item(item, None)?.into_bytes();
//!     println!("{} {} bytes", item.path(), bytes.len());
//! }
//! # Ok::<(), folio::Error>(())
//! ```

mod context;
mod unzip;

use std::mem;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::{Map, Value, json};

pub use context::{Content, ParseContext, ReadContext};

use crate::crypto::CryptoProvider;
use crate::entry::EntrySource;
use crate::error::{Error, Result};
use crate::model::{Book, Item};
use crate::options::{OptionSchema, Options};
use crate::pipeline::{Action, Phase, Pipeline, Progress, Task};
use crate::util::{decode_text, is_known_encoding};

/// Item type of a format's book.
pub type ItemOf<F> = <<F as Format>::Book as Book>::Item;

/// Format-specific collaborator: option declarations plus the tasks spliced
/// into the engine's flows.
pub trait Format: Sized + 'static {
    type Book: Book + 'static;

    fn name(&self) -> &str;

    /// Parse options layered over [`base_parse_schema`].
    fn parse_schema(&self) -> OptionSchema {
        OptionSchema::new()
    }

    /// Read options layered over [`base_read_schema`].
    fn read_schema(&self) -> OptionSchema {
        OptionSchema::new()
    }

    /// Tasks filling `ctx.raw` from the entries.
    fn parse_tasks(&self) -> Vec<Task<ParseContext<Self::Book>>>;

    /// Tasks run after the core tasks and before the book is built.
    fn parse_after_tasks(&self) -> Vec<Task<ParseContext<Self::Book>>> {
        Vec::new()
    }

    /// Tasks run after the contents are loaded.
    fn read_tasks(&self) -> Vec<Task<ReadContext<ItemOf<Self>>>> {
        Vec::new()
    }

    fn read_after_tasks(&self) -> Vec<Task<ReadContext<ItemOf<Self>>>> {
        Vec::new()
    }

    /// Whether the container can be expanded to a directory.
    fn supports_unzip(&self) -> bool {
        true
    }
}

/// Options every parse accepts.
pub fn base_parse_schema() -> OptionSchema {
    OptionSchema::new()
        .field("unzip_path", "String|Null", Value::Null)
        .field("overwrite", "Boolean", json!(false))
}

/// Options every read accepts.
pub fn base_read_schema() -> OptionSchema {
    OptionSchema::new()
        .field("force", "Boolean", json!(false))
        .field("encoding", "String|Null", Value::Null)
        .field("range", "Array|Null", Value::Null)
}

trait HasEntries {
    fn entries_slot(&mut self) -> &mut Option<EntrySource>;
}

impl<B: Book> HasEntries for ParseContext<B> {
    fn entries_slot(&mut self) -> &mut Option<EntrySource> {
        &mut self.entries
    }
}

impl<I> HasEntries for ReadContext<I> {
    fn entries_slot(&mut self) -> &mut Option<EntrySource> {
        &mut self.entries
    }
}

#[derive(Default)]
struct UnzipContext {
    entries: Option<EntrySource>,
}

impl HasEntries for UnzipContext {
    fn entries_slot(&mut self) -> &mut Option<EntrySource> {
        &mut self.entries
    }
}

fn open_entries<C: HasEntries + 'static>(input: PathBuf, provider: Option<Rc<dyn CryptoProvider>>) -> Task<C> {
    Task::new("open-entries", move |mut ctx: C| {
        *ctx.entries_slot() = Some(EntrySource::open(&input, provider.clone())?);
        Ok(ctx)
    })
}

fn range_option(options: &Options) -> Result<Option<Range<u64>>> {
    let Some(values) = options.array("range") else {
        return Ok(None);
    };
    if let [start, end] = values
        && let (Some(start), Some(end)) = (start.as_u64(), end.as_u64())
        && start <= end
    {
        return Ok(Some(start..end));
    }
    Err(Error::invalid_option(
        "range",
        "[start, end] with 0 <= start <= end",
        Value::Array(values.to_vec()),
    ))
}

/// Parses one container with one format.
pub struct Parser<F: Format> {
    input: PathBuf,
    format: F,
    provider: Option<Rc<dyn CryptoProvider>>,
    progress: Option<Box<dyn FnMut(Progress)>>,
}

impl<F: Format> Parser<F> {
    pub fn new(input: impl Into<PathBuf>, format: F) -> Self {
        Self {
            input: input.into(),
            format,
            provider: None,
            progress: None,
        }
    }

    pub fn with_provider(self, provider: impl CryptoProvider + 'static) -> Self {
        self.with_shared_provider(Rc::new(provider))
    }

    /// Use a provider that the caller keeps a handle to, e.g. to inspect its cache.
    pub fn with_shared_provider(mut self, provider: Rc<dyn CryptoProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Called with `(step, total, action)` after every task of every flow.
    pub fn set_progress(&mut self, progress: impl FnMut(Progress) + 'static) {
        self.progress = Some(Box::new(progress));
    }

    pub fn clear_progress(&mut self) {
        self.progress = None;
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    pub fn parse_schema(&self) -> OptionSchema {
        base_parse_schema().extend(&self.format.parse_schema())
    }

    pub fn read_schema(&self) -> OptionSchema {
        base_read_schema().extend(&self.format.read_schema())
    }

    /// The tasks `parse()` runs with these options.
    pub fn parse_pipeline(&self, supplied: Option<Map<String, Value>>) -> Pipeline<ParseContext<F::Book>> {
        let schema = self.parse_schema();
        let provider = self.provider.clone();
        let supports_unzip = self.format.supports_unzip();
        let format_name = self.format.name().to_string();

        Pipeline::new()
            .push(
                Phase::Before,
                Task::new("validate-options", move |mut ctx: ParseContext<F::Book>| {
                    ctx.options = schema.validate(supplied.as_ref())?;
                    if !supports_unzip && ctx.options.str("unzip_path").is_some() {
                        return Err(Error::NotImplemented(format!("unzip for {format_name}")));
                    }
                    Ok(ctx)
                }),
            )
            .push(Phase::Before, open_entries(self.input.clone(), self.provider.clone()))
            .extend(Phase::Core, self.format.parse_tasks())
            .extend(Phase::After, self.format.parse_after_tasks())
            .push(
                Phase::After,
                Task::new("unzip", move |ctx: ParseContext<F::Book>| {
                    let Some(target) = ctx.options.str("unzip_path").map(PathBuf::from) else {
                        return Ok(ctx);
                    };
                    unzip::prepare_target(&target, ctx.options.bool("overwrite"))?;
                    unzip::extract_entries(ctx.entries()?, provider.as_deref(), &target)?;
                    Ok(ctx)
                }),
            )
            .push(
                Phase::After,
                Task::new("build-book", |mut ctx: ParseContext<F::Book>| {
                    let raw = mem::take(&mut ctx.raw);
                    ctx.book = Some(<F::Book as Book>::from_raw(raw)?);
                    Ok(ctx)
                }),
            )
    }

    /// The tasks `read_items()` runs with these options.
    pub fn read_pipeline(&self, supplied: Option<Map<String, Value>>) -> Pipeline<ReadContext<ItemOf<F>>> {
        let schema = self.read_schema();

        Pipeline::new()
            .push(
                Phase::Before,
                Task::new("validate-options", move |mut ctx: ReadContext<ItemOf<F>>| {
                    ctx.options = schema.validate(supplied.as_ref())?;
                    ctx.range = range_option(&ctx.options)?;
                    if let Some(label) = ctx.options.str("encoding")
                        && !is_known_encoding(label)
                    {
                        return Err(Error::invalid_option("encoding", "a known encoding label", label));
                    }
                    Ok(ctx)
                }),
            )
            .push(Phase::Before, open_entries(self.input.clone(), self.provider.clone()))
            .push(
                Phase::Core,
                Task::new("resolve-items", |ctx: ReadContext<ItemOf<F>>| {
                    let entries = ctx.entries()?;
                    let force = ctx.options.bool("force");
                    for item in &ctx.items {
                        let entry = entries.find(item.path(), false)?;
                        if !force && entry.size() != item.size() {
                            return Err(Error::InvalidArgument(format!(
                                "item `{}` is stale: parsed with {} bytes, entry now has {}",
                                item.path(),
                                item.size(),
                                entry.size()
                            )));
                        }
                    }
                    Ok(ctx)
                }),
            )
            .push(
                Phase::Core,
                Task::new("load-contents", |mut ctx: ReadContext<ItemOf<F>>| {
                    let range = ctx.range.clone();
                    let encoding = ctx.options.str("encoding").map(str::to_string);
                    let mut contents = Vec::with_capacity(ctx.items.len());
                    {
                        let entries = ctx.entries()?;
                        for item in &ctx.items {
                            let data = entries.find(item.path(), false)?.read(range.clone())?;
                            contents.push(match &encoding {
                                None => Content::Bytes(data),
                                Some(label) => {
                                    let text = decode_text(&data, label).ok_or_else(|| {
                                        Error::invalid_option("encoding", "a known encoding label", label)
                                    })?;
                                    Content::Text(text.into_owned())
                                }
                            });
                        }
                    }
                    ctx.contents = contents;
                    Ok(ctx)
                }),
            )
            .extend(Phase::Core, self.format.read_tasks())
            .extend(Phase::After, self.format.read_after_tasks())
    }

    fn progress(&mut self) -> Option<&mut dyn FnMut(Progress)> {
        self.progress.as_deref_mut().map(|f| f as &mut dyn FnMut(Progress))
    }

    /// Parse the container into a book.
    pub fn parse(&mut self, options: Option<&Map<String, Value>>) -> Result<F::Book> {
        tracing::debug!(input = %self.input.display(), format = self.format.name(), "parsing");
        let pipeline = self.parse_pipeline(options.cloned());
        let ctx = pipeline.run(ParseContext::default(), Action::Parse, self.progress())?;
        ctx.book
            .ok_or_else(|| Error::MissingElement("book built by the parse pipeline".into()))
    }

    pub fn read_item(&mut self, item: &ItemOf<F>, options: Option<&Map<String, Value>>) -> Result<Content> {
        self.read_items(std::slice::from_ref(item), options)?
            .pop()
            .ok_or_else(|| Error::NoSuchFile(item.path().to_string()))
    }

    /// Read `items` one at a time, returning contents in the same order.
    pub fn read_items(&mut self, items: &[ItemOf<F>], options: Option<&Map<String, Value>>) -> Result<Vec<Content>> {
        let pipeline = self.read_pipeline(options.cloned());
        let ctx = pipeline.run(ReadContext::new(items.to_vec()), Action::ReadItems, self.progress())?;
        Ok(ctx.contents)
    }

    /// Expand the container into `target`.
    pub fn unzip(&mut self, target: impl AsRef<Path>, overwrite: bool) -> Result<bool> {
        if !self.format.supports_unzip() {
            return Err(Error::NotImplemented(format!("unzip for {}", self.format.name())));
        }
        let target = target.as_ref().to_path_buf();
        let provider = self.provider.clone();

        let pipeline = Pipeline::new()
            .push(Phase::Before, open_entries(self.input.clone(), self.provider.clone()))
            .push(
                Phase::Core,
                Task::new("prepare-target", {
                    let target = target.clone();
                    move |ctx: UnzipContext| {
                        unzip::prepare_target(&target, overwrite)?;
                        Ok(ctx)
                    }
                }),
            )
            .push(
                Phase::Core,
                Task::new("extract-entries", move |ctx: UnzipContext| {
                    let entries = ctx
                        .entries
                        .as_ref()
                        .ok_or_else(|| Error::MissingElement("entry source".into()))?;
                    unzip::extract_entries(entries, provider.as_deref(), &target)?;
                    Ok(ctx)
                }),
            );
        pipeline.run(UnzipContext::default(), Action::Unzip, self.progress())?;
        Ok(true)
    }
}
