use std::path::{Path, PathBuf};
use url::Url;

use crate::core::error::codes;
use crate::plugins::registry::{SingleTransfer, TransferContext, TransferListener};

/// Copies `file://` urls (or plain absolute paths) from the local disk.
pub struct FileTransfer;

impl FileTransfer {
    pub fn new() -> Self { Self }

    fn source_path(url: &str) -> Option<PathBuf> {
        if url.starts_with("file://") {
            return Url::parse(url).ok()?.to_file_path().ok();
        }
        let p = Path::new(url);
        p.is_absolute().then(|| p.to_path_buf())
    }

    async fn copy(src: &Path, dest: &Path) -> std::io::Result<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(src, dest).await
    }
}

impl Default for FileTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleTransfer for FileTransfer {
    fn name(&self) -> &'static str { "file-transfer" }

    fn supports(&self, url: &str) -> bool {
        Self::source_path(url).is_some()
    }

    fn start(&self, url: &str, dest: &Path, _ctx: &TransferContext, listener: TransferListener) {
        let Some(src) = Self::source_path(url) else {
            listener.failed(url, codes::UNSUPPORTED, format!("not a local path: {}", url));
            return;
        };
        let url = url.to_string();
        let dest = dest.to_path_buf();

        tokio::spawn(async move {
            match Self::copy(&src, &dest).await {
                Ok(n) => {
                    listener.progress(&url, n, Some(n));
                    listener.succeeded(&url, dest);
                }
                Err(e) => listener.failed(&url, codes::IO, format!("copy {}: {}", src.display(), e)),
            }
        });
    }
}
