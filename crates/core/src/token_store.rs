//! Durable slot for the current access token
//!
//! The HTTP client reads the token on every outgoing request, so [`TokenStore::load`]
//! must be cheap and must not block on I/O. Both implementations keep the current
//! value in an [`ArcSwapOption`] and only touch the disk on writes.

use crate::error::{CoreError, CoreResult};
use arc_swap::ArcSwapOption;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, PoisonError};

/// Well-known key the token is persisted under
pub const TOKEN_KEY: &str = "token";

/// Process-wide holder of the current bearer token
pub trait TokenStore: Send + Sync {
    /// Current token, if any
    fn load(&self) -> Option<String>;

    /// Replace the current token
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted
    fn save(&self, token: &str) -> CoreResult<()>;

    /// Remove the current token. Clearing an empty store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted copy cannot be removed
    fn clear(&self) -> CoreResult<()>;

    /// Whether a token is currently present
    fn is_present(&self) -> bool {
        self.load().is_some()
    }
}

/// Short, log-safe description of a token
pub fn token_fingerprint(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…({} chars)", token.chars().count())
}

/// In-memory token store, lost when the process exits
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: ArcSwapOption<String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: ArcSwapOption::new(Some(Arc::new(token.into()))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.slot.load_full().map(|token| token.as_ref().clone())
    }

    fn save(&self, token: &str) -> CoreResult<()> {
        self.slot.store(Some(Arc::new(token.to_string())));
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        self.slot.store(None);
        Ok(())
    }
}

/// Token store backed by a small JSON key-value document on disk
///
/// The token survives restarts under [`TOKEN_KEY`]. Other keys in the document are
/// preserved across writes.
pub struct FileTokenStore {
    path: PathBuf,
    cached: ArcSwapOption<String>,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Open (or lazily create) the store at `path`
    ///
    /// An unreadable or corrupt document is treated as holding no token. A
    /// corrupt one is replaced on the next write; an unreadable one makes writes fail.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let token = match read_document(&path) {
            Ok(document) => document
                .get(TOKEN_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(err) => {
                tracing::warn!(path = %path.display(), "Ignoring unreadable token file: {err}");
                None
            }
        };

        Self {
            path,
            cached: ArcSwapOption::new(token.map(Arc::new)),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, mutate: F) -> CoreResult<()>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut document = match read_document(&self.path) {
            Ok(document) => document,
            Err(err @ CoreError::CorruptTokenFile { .. }) => {
                tracing::warn!("Replacing token file: {err}");
                Map::new()
            }
            Err(err) => return Err(err),
        };
        mutate(&mut document);

        if document.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(CoreError::token_file(&self.path, err)),
            }
        } else {
            write_document(&self.path, &document)?;
        }

        let token = document
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .map(|token| Arc::new(token.to_string()));
        self.cached.store(token);
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        self.cached.load_full().map(|token| token.as_ref().clone())
    }

    fn save(&self, token: &str) -> CoreResult<()> {
        self.update(|document| {
            document.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        })?;
        tracing::debug!(path = %self.path.display(), token = %token_fingerprint(token), "Persisted token");
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        if self.cached.load().is_none() && !self.path.exists() {
            return Ok(());
        }
        self.update(|document| {
            document.remove(TOKEN_KEY);
        })?;
        tracing::debug!(path = %self.path.display(), "Cleared persisted token");
        Ok(())
    }
}

fn read_document(path: &Path) -> CoreResult<Map<String, Value>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
        Err(err) => return Err(CoreError::token_file(path, err)),
    };
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CoreError::corrupt_token_file(path, "expected a JSON object")),
        Err(err) => Err(CoreError::corrupt_token_file(path, err)),
    }
}

fn write_document(path: &Path, document: &Map<String, Value>) -> CoreResult<()> {
    let io_failure = |err: std::io::Error| CoreError::token_file(path, err);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_failure)?;
    }
    let encoded = serde_json::to_vec_pretty(document)
        .map_err(|err| CoreError::corrupt_token_file(path, err))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, encoded).map_err(io_failure)?;
    fs::rename(&tmp, path).map_err(io_failure)?;
    Ok(())
}
