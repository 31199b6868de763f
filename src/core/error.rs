use std::path::PathBuf;

/// Local failure codes reported through `failure(package, code, message)`.
/// HTTP statuses are passed through as-is, so local codes stay negative.
pub mod codes {
    pub const IO: i32 = -1;
    pub const UNSUPPORTED: i32 = -2;
    pub const INSTALL_FAILED: i32 = -3;
    pub const NETWORK: i32 = -4;
}

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("package '{name}' has no urls")]
    EmptyPackage { name: String },

    #[error("url listed more than once in package: {0}")]
    DuplicateIdentifier(String),

    #[error("url already being downloaded by another package: {0}")]
    AlreadyInFlight(String),

    #[error("downloader is shut down")]
    Closed,
}

#[derive(thiserror::Error, Debug)]
pub enum InstallError {
    #[error("install io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write install manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("expected {expected} files, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}
