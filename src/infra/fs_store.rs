//! Durable filesystem cache store.
//!
//! Layout:
//!
//! ```text
//! <root>/<namespace>/<sha256(key)>.entry
//! ```
//!
//! Each entry file is one line of JSON metadata followed by the raw body.
//! Writes go to a uniquely named temporary file in the same directory and are
//! renamed into place, so readers never observe a partial entry.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheStore, CachedResponse, RequestKey, StoreError};

const ENTRY_EXTENSION: &str = "entry";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    /// Unix seconds.
    stored_at: i64,
}

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf, StoreError> {
        validate_namespace(namespace)?;
        Ok(self.root.join(namespace))
    }

    fn entry_path(dir: &Path, key: &RequestKey) -> PathBuf {
        dir.join(format!("{}.{ENTRY_EXTENSION}", key.digest()))
    }
}

fn validate_namespace(namespace: &str) -> Result<(), StoreError> {
    let valid = !namespace.is_empty()
        && !namespace.starts_with('.')
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidNamespace(namespace.to_string()))
    }
}

fn encode_entry(key: RequestKey, entry: CachedResponse) -> Result<Vec<u8>, StoreError> {
    let meta = EntryMeta {
        key,
        status: entry.status,
        headers: entry.headers,
        stored_at: OffsetDateTime::now_utc().unix_timestamp(),
    };
    let mut buf = serde_json::to_vec(&meta)?;
    buf.push(b'\n');
    buf.extend_from_slice(&entry.body);
    Ok(buf)
}

fn split_entry(path: &Path, bytes: &[u8]) -> Result<(EntryMeta, usize), StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.display().to_string(),
        reason,
    };
    let newline = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| corrupt("missing metadata line".to_string()))?;
    let meta: EntryMeta = serde_json::from_slice(&bytes[..newline])
        .map_err(|err| corrupt(format!("invalid metadata: {err}")))?;
    Ok((meta, newline + 1))
}

fn decode_entry(path: &Path, bytes: Vec<u8>) -> Result<(RequestKey, CachedResponse), StoreError> {
    let (meta, body_start) = split_entry(path, &bytes)?;
    let body = Bytes::from(bytes).slice(body_start..);
    Ok((
        meta.key,
        CachedResponse::new(meta.status, meta.headers, body),
    ))
}

#[async_trait]
impl CacheStore for FsStore {
    async fn open(&self, namespace: &str) -> Result<(), StoreError> {
        let dir = self.namespace_dir(namespace)?;
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn get(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, StoreError> {
        let dir = self.namespace_dir(namespace)?;
        let path = Self::entry_path(&dir, key);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let (stored_key, response) = decode_entry(&path, bytes)?;
        if &stored_key != key {
            warn!(
                target = "podcache::fs_store",
                path = %path.display(),
                expected = %key,
                found = %stored_key,
                "digest collision or foreign entry; treating as miss"
            );
            return Ok(None);
        }
        Ok(Some(response))
    }

    async fn put(
        &self,
        namespace: &str,
        key: RequestKey,
        entry: CachedResponse,
    ) -> Result<(), StoreError> {
        let dir = self.namespace_dir(namespace)?;
        fs::create_dir_all(&dir).await?;

        let path = Self::entry_path(&dir, &key);
        let temp = dir.join(format!(".{}.{}.tmp", key.digest(), Uuid::new_v4()));
        let encoded = encode_entry(key, entry)?;

        if let Err(err) = fs::write(&temp, &encoded).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&temp, &path).await {
            warn!(
                target = "podcache::fs_store",
                from = %temp.display(),
                to = %path.display(),
                error = %err,
                "failed to move entry into place"
            );
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }

        debug!(target = "podcache::fs_store", namespace, path = %path.display(), "entry stored");
        Ok(())
    }

    async fn delete(&self, namespace: &str) -> Result<bool, StoreError> {
        let dir = self.namespace_dir(namespace)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn namespaces(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut names = BTreeSet::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_namespace(name).is_ok() {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names)
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<RequestKey>, StoreError> {
        let dir = self.namespace_dir(namespace)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match split_entry(&path, &bytes) {
                Ok((meta, _)) => keys.push(meta.key),
                Err(err) => {
                    warn!(target = "podcache::fs_store", error = %err, "skipping corrupt entry");
                }
            }
        }
        Ok(keys)
    }
}
