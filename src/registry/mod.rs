//! Library resolution and dependency closures.
//!
//! The registry resolves library descriptors for one compile. Lookup
//! order for a request:
//!
//! 1. descriptors already resolved during this compile
//! 2. exact versioned cache entry
//! 3. case-insensitive or legacy (unversioned) cache entry, logged
//! 4. extraction from a bundle fetched earlier for a parent library
//! 5. remote fetch through the configured [`ComponentSource`]
//!
//! Successful extractions and fetches are persisted to the cache before
//! the descriptor is returned. Persistence lives entirely on disk: a new
//! registry is created per compile.

pub mod cache;
pub mod descriptor;
pub mod source;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::domain::{LibraryId, LibraryRequest};
use crate::error::{CompileError, Result};

pub use cache::{CacheEntry, CacheMatch, LibraryCache};
pub use descriptor::LibraryDescriptor;
pub use source::{Bundle, ComponentSource, HttpComponentSource};

pub struct SchemaRegistry {
    cache: LibraryCache,
    source: Option<Arc<dyn ComponentSource>>,

    /// Resolved descriptors by request key and by identity key
    resolved: HashMap<String, Arc<LibraryDescriptor>>,

    /// Bundles fetched during this compile, oldest first
    bundles: Vec<Bundle>,

    remote_fetches: usize,
}

impl SchemaRegistry {
    /// Create a registry over a cache directory and an optional remote source
    pub fn new(cache_dir: impl Into<PathBuf>, source: Option<Arc<dyn ComponentSource>>) -> Self {
        Self {
            cache: LibraryCache::new(cache_dir),
            source,
            resolved: HashMap::new(),
            bundles: Vec::new(),
            remote_fetches: 0,
        }
    }

    pub fn cache(&self) -> &LibraryCache {
        &self.cache
    }

    /// Number of remote fetches performed so far
    pub fn remote_fetches(&self) -> usize {
        self.remote_fetches
    }

    /// A descriptor already resolved during this compile
    pub fn descriptor(&self, id: &LibraryId) -> Option<Arc<LibraryDescriptor>> {
        self.resolved.get(&id.key()).cloned()
    }

    /// Resolve by name with an optional pinned `(major, minor)`
    pub async fn resolve_name(
        &mut self,
        name: &str,
        version: Option<(u32, u32)>,
    ) -> Result<Arc<LibraryDescriptor>> {
        let request = LibraryRequest {
            name: name.to_string(),
            version,
        };
        self.resolve(&request).await
    }

    /// Resolve a library descriptor.
    ///
    /// Fails with `DependencyResolution` when the library is in neither the
    /// cache, a fetched bundle, nor the remote source.
    #[instrument(skip(self), fields(library = %request))]
    pub async fn resolve(&mut self, request: &LibraryRequest) -> Result<Arc<LibraryDescriptor>> {
        if let Some(descriptor) = self.resolved.get(&request.key()) {
            return Ok(descriptor.clone());
        }

        let descriptor = match self.from_cache(request).await? {
            Some(descriptor) => descriptor,
            None => match self.from_bundles(request).await? {
                Some(descriptor) => descriptor,
                None => self.from_remote(request).await?,
            },
        };

        if !request.accepts(&descriptor.id) {
            return Err(CompileError::resolution(
                request,
                format!("resolved to {} instead", descriptor.id),
            ));
        }

        let descriptor = Arc::new(descriptor);
        self.resolved.insert(request.key(), descriptor.clone());
        self.resolved.insert(descriptor.id.key(), descriptor.clone());
        Ok(descriptor)
    }

    async fn from_cache(&self, request: &LibraryRequest) -> Result<Option<LibraryDescriptor>> {
        let found = self
            .cache
            .lookup(request)
            .await
            .map_err(|e| CompileError::resolution(request, format!("{:#}", e)))?;

        let Some((descriptor, matched)) = found else {
            return Ok(None);
        };

        match matched {
            CacheMatch::Exact => {
                debug!(resolved = %descriptor.id, "Resolved from cache");
            }
            CacheMatch::CaseMismatch | CacheMatch::Legacy => {
                warn!(
                    requested = %request,
                    resolved = %descriptor.id,
                    entry = %descriptor.directory.display(),
                    kind = ?matched,
                    "Using cache entry whose name does not match the request exactly"
                );
            }
        }
        Ok(Some(descriptor))
    }

    async fn from_bundles(&self, request: &LibraryRequest) -> Result<Option<LibraryDescriptor>> {
        for bundle in &self.bundles {
            let extracted = bundle
                .extract(request)
                .map_err(|e| CompileError::resolution(request, format!("{:#}", e)))?;

            if let Some(library) = extracted {
                debug!(library = %library.id, parent = %bundle.origin, "Extracting from parent bundle");
                return self.persist_and_load(request, &library.id, &library.files).await.map(Some);
            }
        }
        Ok(None)
    }

    async fn from_remote(&mut self, request: &LibraryRequest) -> Result<LibraryDescriptor> {
        let Some(source) = self.source.clone() else {
            return Err(CompileError::resolution(
                request,
                "not cached and no remote source configured",
            ));
        };

        info!(source = source.name(), "Fetching library from remote source");
        self.remote_fetches += 1;
        let bytes = source
            .fetch(request)
            .await
            .map_err(|e| CompileError::resolution(request, format!("{:#}", e)))?;

        let bundle = Bundle::new(request.to_string(), bytes);
        let extracted = bundle
            .extract(request)
            .map_err(|e| CompileError::resolution(request, format!("{:#}", e)))?;
        self.bundles.push(bundle);

        let library = extracted.ok_or_else(|| {
            CompileError::resolution(request, "fetched bundle does not contain the library")
        })?;
        self.persist_and_load(request, &library.id, &library.files).await
    }

    async fn persist_and_load(
        &self,
        request: &LibraryRequest,
        id: &LibraryId,
        files: &[(String, Vec<u8>)],
    ) -> Result<LibraryDescriptor> {
        let directory = self
            .cache
            .persist(id, files)
            .await
            .map_err(|e| CompileError::resolution(request, format!("{:#}", e)))?;

        LibraryDescriptor::load(&directory)
            .await
            .map_err(|e| CompileError::resolution(request, format!("{:#}", e)))
    }

    /// Dependency closure of a single root library
    pub async fn closure_of(&mut self, root_name: &str) -> Result<Vec<Arc<LibraryDescriptor>>> {
        let root: LibraryRequest = root_name
            .parse()
            .map_err(|e| CompileError::resolution(root_name, e))?;
        self.closure_of_all(&[root]).await
    }

    /// Dependency closure of several roots.
    ///
    /// Depth-first pre-order over declared dependencies; each distinct
    /// `name@major.minor` appears once even when edges form cycles.
    /// Pinned roots are walked first so an unpinned root whose name is
    /// already in the closure reuses that version.
    pub async fn closure_of_all(
        &mut self,
        roots: &[LibraryRequest],
    ) -> Result<Vec<Arc<LibraryDescriptor>>> {
        let mut ordered: Vec<&LibraryRequest> = roots.iter().filter(|r| r.version.is_some()).collect();
        ordered.extend(roots.iter().filter(|r| r.version.is_none()));

        let mut visited: HashSet<String> = HashSet::new();
        let mut closure: Vec<Arc<LibraryDescriptor>> = Vec::new();
        let mut stack: Vec<LibraryRequest> = ordered.into_iter().rev().cloned().collect();

        while let Some(request) = stack.pop() {
            if visited.contains(&request.key()) {
                continue;
            }
            if request.version.is_none() && closure.iter().any(|d| request.accepts(&d.id)) {
                continue;
            }

            let descriptor = self.resolve(&request).await?;
            visited.insert(request.key());
            if !visited.insert(descriptor.id.key()) {
                continue;
            }

            for dependency in descriptor.dependencies.iter().rev() {
                if !visited.contains(&dependency.key()) {
                    stack.push(dependency.to_request());
                }
            }
            closure.push(descriptor);
        }

        debug!(count = closure.len(), "Resolved dependency closure");
        Ok(closure)
    }
}
