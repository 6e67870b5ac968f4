//! Command-line interface for h5pbook.
//!
//! Provides commands for compiling books into H5P packages, validating
//! book definitions, inspecting the library cache, and showing the
//! resolved configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config;
use crate::core::{BookDefinition, CompileOptions, Orchestrator};
use crate::registry::LibraryCache;

/// h5pbook - Compile YAML books into H5P Interactive Book packages
#[derive(Parser, Debug)]
#[command(name = "h5pbook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a book into an .h5p package
    Compile {
        /// Book definition (YAML)
        book: PathBuf,

        /// Output package (defaults to the book path with .h5p)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Log every processed item
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check a book definition and its items without fetching anything
    Validate {
        /// Book definition (YAML)
        book: PathBuf,
    },

    /// Inspect the library cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// List cached libraries
    List,
}

impl Cli {
    /// Whether debug-level logging was requested
    pub fn verbose(&self) -> bool {
        matches!(self.command, Commands::Compile { verbose: true, .. })
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Compile {
                book,
                output,
                verbose,
            } => compile_book(&book, output, verbose).await,
            Commands::Validate { book } => validate_book(&book),
            Commands::Cache { command } => match command {
                CacheCommands::List => list_cache().await,
            },
            Commands::Config => show_config(),
        }
    }
}

/// Directory relative media references in a book resolve against
fn book_base_path(book_path: &Path) -> PathBuf {
    match book_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn default_output(book_path: &Path) -> PathBuf {
    book_path.with_extension("h5p")
}

async fn compile_book(
    book_path: &Path,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let book = BookDefinition::from_file(book_path)?;
    let cfg = config::config()?;

    let mut options = CompileOptions::from_config(cfg, book_base_path(book_path));
    options.verbose = verbose;

    eprintln!("Compiling: {}", book.title);

    let package = Orchestrator::default()
        .compile_package(&book, &options)
        .await
        .with_context(|| format!("Failed to compile {}", book_path.display()))?;

    let output = output.unwrap_or_else(|| default_output(book_path));
    tokio::fs::write(&output, &package.bytes)
        .await
        .with_context(|| format!("Failed to write package: {}", output.display()))?;

    eprintln!("\n[Package written to {}]", output.display());
    eprintln!("   Libraries: {}", package.manifest.preloaded_dependencies.len());
    eprintln!("   Media:     {}", package.media_count);
    eprintln!("   Size:      {} bytes", package.bytes.len());
    if package.remote_fetches > 0 {
        eprintln!("   Fetched:   {} bundle(s)", package.remote_fetches);
    }

    Ok(())
}

fn validate_book(book_path: &Path) -> Result<()> {
    let book = BookDefinition::from_file(book_path)?;
    let items = Orchestrator::default()
        .check(&book)
        .with_context(|| format!("{} is invalid", book_path.display()))?;

    println!(
        "{}: {} chapter(s), {} item(s), OK",
        book_path.display(),
        book.chapters.len(),
        items
    );
    Ok(())
}

async fn list_cache() -> Result<()> {
    let cache = LibraryCache::new(config::cache_dir()?);
    let entries = cache.entries().await?;

    if entries.is_empty() {
        println!("Cache is empty: {}", cache.root().display());
        return Ok(());
    }

    println!("{:<40} {:<10} {}", "LIBRARY", "VERSION", "ENTRY");
    println!("{}", "-".repeat(80));
    for entry in &entries {
        match &entry.id {
            Some(id) => println!(
                "{:<40} {:<10} {}",
                id.name,
                format!("{}.{}", id.major, id.minor),
                entry.dir_name
            ),
            None => println!("{:<40} {:<10} {}", entry.dir_name, "(legacy)", entry.dir_name),
        }
    }
    println!("\nTotal: {} entries in {}", entries.len(), cache.root().display());

    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("h5pbook configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:  {}", cfg.home.display());
    println!("  Cache: {}", cfg.cache_dir.display());
    println!();
    println!(
        "Registry: {}",
        cfg.registry_url.as_deref().unwrap_or("(none - cache only)")
    );
    println!("Max media size: {} bytes", cfg.max_media_bytes);
    println!();
    println!("Libraries:");
    println!("  Book:    {}", cfg.libraries.book);
    println!("  Chapter: {}", cfg.libraries.chapter);
    println!("  Text:    {}", cfg.libraries.text);
    println!("  Image:   {}", cfg.libraries.image);
    println!("  Audio:   {}", cfg.libraries.audio);
    println!("  Quiz:    {}", cfg.libraries.quiz);

    Ok(())
}
