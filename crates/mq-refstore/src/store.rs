//! Directory-backed reference store

use crate::cache::{DEFAULT_CAPACITY, ReferenceCache};
use crate::error::{StoreError, StoreResult};
use mq_score::{ReferenceDocument, ReferenceResolver, ScoringConfig, normalize_genre_key};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loads `{genre}.json` documents from a directory and caches them resolved.
///
/// When a genre file is missing and a fallback bundle is configured, the
/// genre is resolved out of the bundle (`{ "genres": { ... } }`) instead.
pub struct ReferenceStore {
    root: PathBuf,
    fallback_bundle: Option<PathBuf>,
    resolver: ReferenceResolver,
    cache: ReferenceCache,
}

impl ReferenceStore {
    /// Store over `root` with default resolver options
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fallback_bundle: None,
            resolver: ReferenceResolver::default(),
            cache: ReferenceCache::new(DEFAULT_CAPACITY),
        }
    }

    /// Resolve with the band tolerance default from `config`
    pub fn with_config(mut self, config: &ScoringConfig) -> Self {
        self.resolver = ReferenceResolver::from_config(config);
        self
    }

    /// Bound the number of cached genres
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.cache = ReferenceCache::new(capacity);
        self
    }

    /// Multi-genre bundle consulted when a genre file is missing
    pub fn with_fallback_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_bundle = Some(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    /// Path of the document for a genre
    ///
    /// Keys that could name a file outside the store directory are rejected.
    pub fn path_for(&self, genre: &str) -> StoreResult<PathBuf> {
        let key = normalize_genre_key(genre);
        let escapes = key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\', ':', '\0']);
        if escapes {
            return Err(StoreError::InvalidGenre {
                genre: genre.to_string(),
            });
        }
        Ok(self.root.join(format!("{}.json", key)))
    }

    /// Load, resolve and cache the reference for `genre`
    pub fn load(&self, genre: &str) -> StoreResult<Arc<ReferenceDocument>> {
        let key = normalize_genre_key(genre);

        let (path, bytes) = match read(&self.path_for(&key)?)? {
            Some(found) => found,
            None => self.read_fallback(&key)?,
        };

        let hash = ReferenceCache::content_hash(&bytes);
        if let Some(doc) = self.cache.get(&key, &hash) {
            return Ok(doc);
        }

        let payload: Value = serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let doc = self.resolver.resolve(&key, &payload)?;
        log::info!(
            "[RefStore] loaded {} (version {}) from {}",
            key,
            doc.version.as_deref().unwrap_or("unversioned"),
            path.display()
        );

        Ok(self.cache.insert(&key, hash, doc))
    }

    fn read_fallback(&self, key: &str) -> StoreResult<(PathBuf, Vec<u8>)> {
        let not_found = || StoreError::NotFound {
            genre: key.to_string(),
            dir: self.root.clone(),
        };
        let bundle = self.fallback_bundle.as_ref().ok_or_else(not_found)?;
        let found = read(bundle)?.ok_or_else(not_found)?;
        log::debug!("[RefStore] {} not on disk, using bundle {}", key, bundle.display());
        Ok(found)
    }

    /// Genres with a document in the store directory, sorted
    pub fn genres(&self) -> StoreResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut genres: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        genres.sort();
        Ok(genres)
    }

    /// Drop a cached genre; the next load re-reads it
    pub fn invalidate(&self, genre: &str) -> bool {
        self.cache.invalidate(&normalize_genre_key(genre))
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// File contents, `None` when the file does not exist
fn read(path: &Path) -> StoreResult<Option<(PathBuf, Vec<u8>)>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some((path.to_path_buf(), bytes))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
