//! folio - inspect and expand comic containers

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as _;
use serde_json::{Map, Value};

use folio::crypto::{CipherProvider, CryptorConfig, Encoding, Mode};
use folio::formats::Comic;
use folio::{Book, Item, Parser};

#[derive(clap::Parser)]
#[command(name = "folio")]
#[command(version, about = "Inspect and expand comic containers", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio volume1.cbz                         List pages
    folio pages/ --unzip out/                 Copy an image directory
    folio locked.cbz --key 00..ff --iv 00..ff --unzip out/ --overwrite")]
struct Cli {
    /// Input archive or directory
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Expand the container into DIR while parsing
    #[arg(long, value_name = "DIR")]
    unzip: Option<PathBuf>,

    /// Replace DIR if it already exists
    #[arg(long, requires = "unzip")]
    overwrite: bool,

    /// AES key as hex (16, 24 or 32 bytes)
    #[arg(long, value_name = "HEX")]
    key: Option<String>,

    /// IV as hex (16 bytes)
    #[arg(long, value_name = "HEX", requires = "key")]
    iv: Option<String>,

    /// Cipher mode: ecb, cbc, cfb, ofb or ctr
    #[arg(long, default_value = "cbc", requires = "key")]
    mode: Mode,

    /// Decrypt in independent units of N bytes instead of whole entries
    #[arg(long, value_name = "N", requires = "key")]
    stream_unit: Option<usize>,

    /// Print per-task progress and debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), folio::Error> {
    let mut parser = Parser::new(&cli.input, Comic::new());

    if let Some(key) = &cli.key {
        let config = CryptorConfig::from_encoded(cli.mode, key, cli.iv.as_deref(), Encoding::Hex)?;
        let mut provider = CipherProvider::new(config);
        if let Some(unit) = cli.stream_unit {
            provider = provider.stream_mode(unit)?;
        }
        parser = parser.with_provider(provider);
    }

    if cli.verbose {
        parser.set_progress(|p| eprintln!("[{}] {}/{}", p.action, p.step, p.total));
    }

    let mut options = Map::new();
    if let Some(dir) = &cli.unzip {
        options.insert("unzip_path".into(), Value::String(dir.display().to_string()));
        options.insert("overwrite".into(), Value::Bool(cli.overwrite));
    }

    let book = parser.parse(Some(&options))?;

    println!("File: {}", cli.input.display());
    if let Some(title) = book.title() {
        println!("Title: {title}");
    }
    println!("Pages: {}", book.items().len());
    for item in book.items() {
        println!("  {:>4}  {:>10}  {}", item.index(), item.size(), item.path());
    }
    if let Some(dir) = &cli.unzip {
        println!("Expanded to {}", dir.display());
    }

    Ok(())
}
