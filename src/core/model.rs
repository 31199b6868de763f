use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::DownloadError;

pub type ContextId = Uuid;

/// An ordered set of remote resources that is downloaded and installed as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Package {
    pub name: String,
    pub urls: Vec<String>,
}

impl Package {
    pub fn new(name: impl Into<String>, urls: Vec<String>) -> Self {
        Self { name: name.into(), urls }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Rejects packages the downloader cannot track: empty ones, and ones that
    /// list the same url twice (completions are matched back by url).
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.is_empty() {
            return Err(DownloadError::EmptyPackage { name: self.name.clone() });
        }
        let mut seen = HashSet::with_capacity(self.urls.len());
        for url in &self.urls {
            if !seen.insert(url.as_str()) {
                return Err(DownloadError::DuplicateIdentifier(url.clone()));
            }
        }
        Ok(())
    }
}

/// Per-package state while the package is in flight.
#[derive(Debug, Clone)]
pub struct DownloadContext {
    pub id: ContextId,
    pub package: Arc<Package>,
    pub downloaded: usize,
    pub local_paths: Vec<PathBuf>,
}

impl DownloadContext {
    pub fn new(package: Arc<Package>) -> Self {
        Self {
            id: Uuid::new_v4(),
            local_paths: Vec::with_capacity(package.len()),
            package,
            downloaded: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.downloaded >= self.package.len()
    }

    pub fn next_url(&self) -> Option<&str> {
        self.package.urls.get(self.downloaded).map(String::as_str)
    }
}

/// What a single-item transfer reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Succeeded { url: String, local_path: PathBuf },
    Failed { url: String, code: i32, message: String },
    Progress { url: String, downloaded: u64, total: Option<u64> },
}

impl TransferEvent {
    pub fn url(&self) -> &str {
        match self {
            TransferEvent::Succeeded { url, .. }
            | TransferEvent::Failed { url, .. }
            | TransferEvent::Progress { url, .. } => url,
        }
    }
}
