//! Main orchestrator for book compilation.
//!
//! Drives one compile end to end: dispatches items to handlers in
//! declaration order, accumulates the content tree, resolves the
//! dependency closure and assembles the package.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, info_span, instrument, Instrument};

use crate::archive::ArchiveAssembler;
use crate::config::ResolvedConfig;
use crate::domain::{LibraryId, LibraryRequest, PackageManifest};
use crate::error::{CompileError, Result};
use crate::handlers::{ContentGenerator, ContentHandler, HandlerContext, Handlers};
use crate::registry::{ComponentSource, HttpComponentSource, LibraryDescriptor, SchemaRegistry};
use crate::tree::media::DEFAULT_MAX_MEDIA_BYTES;
use crate::tree::{apply_node_defaults, validate_nodes, ContentTreeBuilder, LibrarySet, MediaResolver};

use super::book::{BookDefinition, ContentItem};
use super::state::{CompileState, StateTracker};

/// Per-compile settings
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Library cache directory
    pub cache_dir: PathBuf,

    /// Directory relative media references resolve against
    pub base_path: PathBuf,

    /// Remote library registry, used when no source was injected
    pub registry_url: Option<String>,

    /// Versions for the book, chapter and built-in node libraries
    pub libraries: LibrarySet,

    pub max_media_bytes: u64,

    pub verbose: bool,

    /// Generative-content provider selection, passed through to handlers
    pub provider: Option<String>,
}

impl CompileOptions {
    pub fn new(cache_dir: impl Into<PathBuf>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            base_path: base_path.into(),
            registry_url: None,
            libraries: LibrarySet::default(),
            max_media_bytes: DEFAULT_MAX_MEDIA_BYTES,
            verbose: false,
            provider: None,
        }
    }

    /// Options from resolved configuration
    pub fn from_config(config: &ResolvedConfig, base_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_url: config.registry_url.clone(),
            libraries: config.libraries.clone(),
            max_media_bytes: config.max_media_bytes,
            ..Self::new(&config.cache_dir, base_path)
        }
    }
}

/// Result of a successful compile
#[derive(Debug, Clone)]
pub struct CompiledPackage {
    /// The `.h5p` archive bytes
    pub bytes: Vec<u8>,
    pub manifest: PackageManifest,
    pub media_count: usize,
    pub remote_fetches: usize,
}

/// Main book compiler
pub struct Orchestrator {
    handlers: Handlers,
    source: Option<Arc<dyn ComponentSource>>,
    generator: Option<Arc<dyn ContentGenerator>>,
    assembler: ArchiveAssembler,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(Handlers::builtin())
    }
}

impl Orchestrator {
    /// Create an orchestrator owning a fixed handler mapping
    pub fn new(handlers: Handlers) -> Self {
        Self {
            handlers,
            source: None,
            generator: None,
            assembler: ArchiveAssembler::new(),
        }
    }

    /// Use this source for cache misses instead of `registry_url`
    pub fn with_source(mut self, source: Arc<dyn ComponentSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Check a book without any I/O: top-level fields, then every item
    /// against its handler. Returns the number of items checked.
    pub fn check(&self, book: &BookDefinition) -> Result<usize> {
        book.validate()?;
        for (c, chapter) in book.chapters.iter().enumerate() {
            for (i, item) in chapter.content.iter().enumerate() {
                self.admit(c, i, item)?;
            }
        }
        Ok(book.item_count())
    }

    /// Compile a book into `.h5p` bytes
    pub async fn compile(&self, book: &BookDefinition, options: &CompileOptions) -> Result<Vec<u8>> {
        self.compile_package(book, options).await.map(|p| p.bytes)
    }

    /// Compile a book, keeping the manifest and fetch statistics
    #[instrument(skip_all, fields(book = %book.title))]
    pub async fn compile_package(
        &self,
        book: &BookDefinition,
        options: &CompileOptions,
    ) -> Result<CompiledPackage> {
        let start = Instant::now();
        let mut state = StateTracker::new();

        match self.run(book, options, &mut state).await {
            Ok(package) => {
                info!(
                    size = package.bytes.len(),
                    libraries = package.manifest.preloaded_dependencies.len(),
                    media = package.media_count,
                    remote_fetches = package.remote_fetches,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Compiled package"
                );
                Ok(package)
            }
            Err(e) => {
                let reached = state.current();
                state.fail();
                error!(state = %reached, error = %e, "Compile failed");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        book: &BookDefinition,
        options: &CompileOptions,
        state: &mut StateTracker,
    ) -> Result<CompiledPackage> {
        book.validate()?;
        info!(
            chapters = book.chapters.len(),
            items = book.item_count(),
            "Starting compile"
        );

        let mut registry = SchemaRegistry::new(&options.cache_dir, self.source_for(options));
        let resolver = MediaResolver::new(&options.base_path).with_max_bytes(options.max_media_bytes);
        let mut builder = ContentTreeBuilder::create_book(
            &book.title,
            &book.language,
            options.libraries.clone(),
            resolver,
        );
        state.advance(CompileState::BookCreated)?;

        // Handlers that processed at least one item, in first-use order
        let mut used: Vec<Arc<dyn ContentHandler>> = Vec::new();

        for (c, chapter_def) in book.chapters.iter().enumerate() {
            let chapter_index = builder.add_chapter(&chapter_def.title).index();

            for (i, item) in chapter_def.content.iter().enumerate() {
                state.advance(CompileState::Validating)?;
                let handler = self.admit(c, i, item)?;

                state.advance(CompileState::Processing)?;
                let chapter = builder
                    .chapter(chapter_index)
                    .ok_or_else(|| CompileError::assembly("chapter vanished during compile"))?;
                let mut ctx = HandlerContext {
                    chapter,
                    registry: &mut registry,
                    generator: self.generator.as_deref(),
                    options,
                };

                let span = info_span!("item", chapter = c, index = i, type_tag = %item.type_tag);
                handler
                    .process(&mut ctx, item)
                    .instrument(span)
                    .await
                    .map_err(|source| CompileError::Handler {
                        item: item_label(c, i, item),
                        source,
                    })?;

                if options.verbose {
                    info!(chapter = c, index = i, type_tag = %item.type_tag, "Processed item");
                } else {
                    debug!(chapter = c, index = i, type_tag = %item.type_tag, "Processed item");
                }

                if !used.iter().any(|h| h.declared_type() == handler.declared_type()) {
                    used.push(handler);
                }
            }
        }
        state.advance(CompileState::Accumulated)?;

        let root = registry.resolve(&options.libraries.book.to_request()).await?;
        let mut tree = builder.build(&root.schema);
        if let Some(issue) = builder.validate().first() {
            return Err(CompileError::Validation {
                item: "book".to_string(),
                path: issue.path.clone(),
                message: issue.message.clone(),
            });
        }

        let roots = self.closure_roots(&tree.referenced_libraries(), &options.libraries, &used)?;
        let closure = registry.closure_of_all(&roots).await?;
        ensure_covered(&tree.referenced_libraries(), &closure)?;

        apply_node_defaults(&mut tree, |id| {
            closure.iter().find(|d| d.id.matches(id)).map(|d| &d.schema)
        });
        let report = validate_nodes(&tree, |id| {
            closure.iter().find(|d| d.id.matches(id)).map(|d| &d.schema)
        });
        if let Some(issue) = report.first() {
            return Err(CompileError::Validation {
                item: "book".to_string(),
                path: issue.path.clone(),
                message: issue.message.clone(),
            });
        }
        state.advance(CompileState::ClosureResolved)?;

        let media = builder.media_assets();
        let bytes = self
            .assembler
            .assemble(&tree, &closure, media, &book.title, &book.language)?;
        let manifest = self
            .assembler
            .manifest_of(&tree, &closure, &book.title, &book.language);
        state.advance(CompileState::Assembled)?;

        Ok(CompiledPackage {
            bytes,
            manifest,
            media_count: media.len(),
            remote_fetches: registry.remote_fetches(),
        })
    }

    /// Look up the item's handler and let it validate the item
    fn admit(&self, chapter: usize, index: usize, item: &ContentItem) -> Result<Arc<dyn ContentHandler>> {
        let handler = self
            .handlers
            .get(&item.type_tag)
            .ok_or_else(|| CompileError::UnknownType {
                chapter,
                index,
                type_tag: item.type_tag.clone(),
            })?;

        handler
            .validate(item)
            .map_err(|rejection| CompileError::Validation {
                item: item_label(chapter, index, item),
                path: rejection.path,
                message: rejection.message,
            })?;

        Ok(handler)
    }

    /// Tree identities (pinned), then the root and chapter libraries, then
    /// the used handlers' requirements
    fn closure_roots(
        &self,
        referenced: &[LibraryId],
        libraries: &LibrarySet,
        used: &[Arc<dyn ContentHandler>],
    ) -> Result<Vec<LibraryRequest>> {
        let mut roots: Vec<LibraryRequest> = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |request: LibraryRequest| {
            if seen.insert(request.key()) {
                roots.push(request);
            }
        };

        push(libraries.book.to_request());
        push(libraries.chapter.to_request());
        for id in referenced {
            push(id.to_request());
        }
        for handler in used {
            for component in handler.required_components() {
                let request: LibraryRequest = component.parse().map_err(|e| {
                    CompileError::resolution(&component, format!("invalid requirement: {:#}", e))
                })?;
                push(request);
            }
        }

        debug!(roots = roots.len(), "Collected closure roots");
        Ok(roots)
    }

    fn source_for(&self, options: &CompileOptions) -> Option<Arc<dyn ComponentSource>> {
        if let Some(source) = &self.source {
            return Some(source.clone());
        }
        options.registry_url.as_ref().map(|url| {
            let source: Arc<dyn ComponentSource> = Arc::new(HttpComponentSource::new(url.clone()));
            source
        })
    }
}

/// Every identity the tree references must be in the closure
fn ensure_covered(referenced: &[LibraryId], closure: &[Arc<LibraryDescriptor>]) -> Result<()> {
    for id in referenced {
        if !closure.iter().any(|d| d.id.matches(id)) {
            return Err(CompileError::resolution(
                id,
                "referenced by the content tree but missing from the resolved closure",
            ));
        }
    }
    Ok(())
}

fn item_label(chapter: usize, index: usize, item: &ContentItem) -> String {
    format!("chapters[{}].content[{}] ({})", chapter, index, item.type_tag)
}
