// src/store.rs
//! Durable state documents behind a small `Persist<T>` trait.
//!
//! The review queue, the ledger and the daily quota each keep one JSON
//! document. Writes go to a sibling `*.tmp` file which is fsynced and then
//! renamed over the target, so a crash mid-write leaves the previous
//! document intact.

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt state document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode state document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Load/save one typed document.
pub trait Persist<T>: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<T>, StoreError>;
    fn save(&self, value: &T) -> Result<(), StoreError>;
}

impl<T, S> Persist<T> for Arc<S>
where
    S: Persist<T> + ?Sized,
{
    fn load(&self) -> Result<Option<T>, StoreError> {
        (**self).load()
    }
    fn save(&self, value: &T) -> Result<(), StoreError> {
        (**self).save(value)
    }
}

/// JSON file with atomic replace.
#[derive(Debug)]
pub struct JsonFile<T> {
    path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl<T> Persist<T> for JsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        write_atomic(&self.path, &bytes).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

/// In-process store holding the serialized document. Reads and writes can be
/// switched to fail so callers' error paths are testable.
#[derive(Debug)]
pub struct MemoryStore<T> {
    doc: Mutex<Option<String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    _doc: PhantomData<fn() -> T>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            doc: Mutex::new(None),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            _doc: PhantomData,
        }
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn raw(&self) -> Option<String> {
        self.doc.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Persist<T> for MemoryStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store read disabled".into()));
        }
        let g = self.doc.lock().unwrap_or_else(|p| p.into_inner());
        match g.as_deref() {
            None => Ok(None),
            Some(s) => serde_json::from_str(s).map(Some).map_err(StoreError::from),
        }
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store write disabled".into()));
        }
        let s = serde_json::to_string(value)?;
        *self.doc.lock().unwrap_or_else(|p| p.into_inner()) = Some(s);
        Ok(())
    }
}
