//! Storage router: one interface, two backends. The variant is chosen once
//! at startup from configuration; upload logic never branches on it.
//!
//! References returned by `put` are opaque to callers — photo records carry
//! them back to the same backend and never interpret them.

use std::path::PathBuf;

use snapvault_types::Error;
use snapvault_types::error::Result;
use tokio::fs;
use tracing::{info, warn};

/// Backend selection, resolved from environment at startup.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    Remote {
        base_url: String,
        bucket: String,
        token: String,
    },
}

pub enum Storage {
    Local(LocalStore),
    Remote(RemoteStore),
}

/// Open handle to stored bytes, for streaming downloads.
pub enum FileStream {
    Local(fs::File),
    Remote(reqwest::Response),
}

impl Storage {
    pub async fn init(config: StorageConfig) -> anyhow::Result<Self> {
        match config {
            StorageConfig::Local { root } => Ok(Storage::Local(LocalStore::new(root).await?)),
            StorageConfig::Remote {
                base_url,
                bucket,
                token,
            } => Ok(Storage::Remote(RemoteStore::new(base_url, bucket, token)?)),
        }
    }

    /// Persist bytes under `key` and return the backend's opaque reference.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        match self {
            Storage::Local(s) => s.put(key, bytes).await,
            Storage::Remote(s) => s.put(key, bytes).await,
        }
    }

    /// Remove stored bytes. Missing files are tolerated so cleanup stays
    /// idempotent.
    pub async fn delete(&self, reference: &str) -> Result<()> {
        match self {
            Storage::Local(s) => s.delete(reference).await,
            Storage::Remote(s) => s.delete(reference).await,
        }
    }

    /// Open the stored bytes for streaming.
    pub async fn open(&self, reference: &str) -> Result<FileStream> {
        match self {
            Storage::Local(s) => Ok(FileStream::Local(s.open(reference).await?)),
            Storage::Remote(s) => Ok(FileStream::Remote(s.open(reference).await?)),
        }
    }

    /// Public URL for a stored reference.
    pub fn resolve_url(&self, reference: &str) -> String {
        match self {
            Storage::Local(s) => s.resolve_url(reference),
            Storage::Remote(s) => s.resolve_url(reference),
        }
    }
}

/// References are relative keys we minted ourselves; anything trying to
/// escape the root is corrupt or hostile.
fn check_reference(reference: &str) -> Result<()> {
    if reference.is_empty()
        || reference.starts_with('/')
        || reference.split('/').any(|seg| seg == "..")
    {
        return Err(Error::Internal(anyhow::anyhow!(
            "invalid storage reference: {reference}"
        )));
    }
    Ok(())
}

// -- Local filesystem backend --

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub async fn new(root: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&root).await?;
        info!("Local storage directory: {}", root.display());
        Ok(Self { root })
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        check_reference(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::StorageWrite(e.to_string()))?;
        }
        fs::write(&path, bytes)
            .await
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        Ok(key.to_string())
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        check_reference(reference)?;
        let path = self.root.join(reference);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file {} already gone", reference);
                Ok(())
            }
            Err(e) => Err(Error::Internal(e.into())),
        }
    }

    async fn open(&self, reference: &str) -> Result<fs::File> {
        check_reference(reference)?;
        let path = self.root.join(reference);
        fs::File::open(&path)
            .await
            .map_err(|e| Error::Internal(anyhow::anyhow!("open {}: {}", reference, e)))
    }

    fn resolve_url(&self, reference: &str) -> String {
        format!("/uploads/{reference}")
    }
}

// -- Remote object-store backend --

/// HTTP object store: PUT/GET/DELETE on `{base_url}/{bucket}/{key}` with a
/// bearer token. References are `{bucket}/{key}` so they stay valid if the
/// base URL moves.
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    token: String,
}

impl RemoteStore {
    pub fn new(base_url: String, bucket: String, token: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            token,
        })
    }

    fn object_url(&self, reference: &str) -> String {
        format!("{}/{}", self.base_url, reference)
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        check_reference(key)?;
        let reference = format!("{}/{}", self.bucket, key);
        let resp = self
            .client
            .put(self.object_url(&reference))
            .bearer_auth(&self.token)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::StorageWrite(format!(
                "object store returned {} for {}",
                resp.status(),
                reference
            )));
        }
        Ok(reference)
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        check_reference(reference)?;
        let resp = self
            .client
            .delete(self.object_url(reference))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Internal(e.into()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            warn!("Stored object {} already gone", reference);
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(Error::Internal(anyhow::anyhow!(
                "object store returned {} deleting {}",
                resp.status(),
                reference
            )));
        }
        Ok(())
    }

    async fn open(&self, reference: &str) -> Result<reqwest::Response> {
        check_reference(reference)?;
        let resp = self
            .client
            .get(self.object_url(reference))
            .bearer_auth(&self.token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Internal(anyhow::anyhow!("fetch {}: {}", reference, e)))?;
        Ok(resp)
    }

    fn resolve_url(&self, reference: &str) -> String {
        self.object_url(reference)
    }
}
