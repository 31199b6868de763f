use crate::core::error::InstallError;
use crate::core::model::Package;
use crate::core::planner::package_dir_name;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Installs a fully downloaded package. Called once per package, with the
/// local paths in the same order as the package urls.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    fn name(&self) -> &'static str;
    async fn install(&self, package: &Package, local_paths: &[PathBuf]) -> Result<PathBuf, InstallError>;
}

#[derive(Debug, Serialize)]
struct InstallManifest<'a> {
    name: &'a str,
    urls: &'a [String],
    files: Vec<String>,
}

/// Copies the downloaded files into `<root>/<package>/` and writes a
/// `manifest.json` next to them.
///
/// Everything is staged in `<root>/<package>.partial/` first and renamed into
/// place at the end, so the package directory either holds a complete install
/// or does not exist.
#[derive(Debug, Clone)]
pub struct DirectoryInstaller {
    root: PathBuf,
}

impl DirectoryInstaller {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn stage(&self, package: &Package, local_paths: &[PathBuf], staging: &Path) -> Result<(), InstallError> {
        // leftovers from an interrupted install
        if tokio::fs::metadata(staging).await.is_ok() {
            tokio::fs::remove_dir_all(staging).await.map_err(io_err(staging))?;
        }
        tokio::fs::create_dir_all(staging).await.map_err(io_err(staging))?;

        let mut files = Vec::with_capacity(local_paths.len());
        for (i, src) in local_paths.iter().enumerate() {
            let file_name = src
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("{:03}", i));
            tokio::fs::copy(src, staging.join(&file_name)).await.map_err(io_err(src))?;
            files.push(file_name);
        }

        let manifest = InstallManifest { name: &package.name, urls: &package.urls, files };
        let manifest_path = staging.join("manifest.json");
        let body = serde_json::to_vec_pretty(&manifest)?;
        tokio::fs::write(&manifest_path, body).await.map_err(io_err(&manifest_path))?;
        Ok(())
    }

    async fn swap_into_place(staging: &Path, dest_dir: &Path) -> Result<(), InstallError> {
        if tokio::fs::metadata(dest_dir).await.is_ok() {
            tokio::fs::remove_dir_all(dest_dir).await.map_err(io_err(dest_dir))?;
        }
        tokio::fs::rename(staging, dest_dir).await.map_err(io_err(dest_dir))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> InstallError + '_ {
    move |source| InstallError::Io { path: path.to_path_buf(), source }
}

#[async_trait]
impl PackageInstaller for DirectoryInstaller {
    fn name(&self) -> &'static str { "directory-installer" }

    async fn install(&self, package: &Package, local_paths: &[PathBuf]) -> Result<PathBuf, InstallError> {
        if local_paths.len() != package.len() {
            return Err(InstallError::CountMismatch { expected: package.len(), actual: local_paths.len() });
        }

        let dir_name = package_dir_name(package);
        let dest_dir = self.root.join(&dir_name);
        let staging = self.root.join(format!("{}.partial", dir_name));

        let staged = match self.stage(package, local_paths, &staging).await {
            Ok(()) => Self::swap_into_place(&staging, &dest_dir).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                tracing::debug!(dir = %staging.display(), "staging cleanup skipped: {}", cleanup);
            }
            return Err(e);
        }

        tracing::info!(package = %package.name, dir = %dest_dir.display(), "package installed");
        Ok(dest_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_files_in_order_and_writes_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let dl = tmp.path().join("dl");
        std::fs::create_dir_all(&dl).unwrap();
        let a = dl.join("000-a.png");
        let b = dl.join("001-b.png");
        std::fs::write(&a, b"aaa").unwrap();
        std::fs::write(&b, b"bb").unwrap();

        let pkg = Package::new("pack", vec!["u/a.png".to_string(), "u/b.png".to_string()]);
        let installer = DirectoryInstaller::new(tmp.path().join("installed"));
        let dir = installer.install(&pkg, &[a, b]).await.unwrap();

        assert_eq!(std::fs::read(dir.join("000-a.png")).unwrap(), b"aaa");
        assert_eq!(std::fs::read(dir.join("001-b.png")).unwrap(), b"bb");

        let manifest: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["name"], "pack");
        assert_eq!(manifest["files"], serde_json::json!(["000-a.png", "001-b.png"]));
    }

    #[tokio::test]
    async fn missing_source_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = Package::new("pack", vec!["u/a.png".to_string()]);
        let installer = DirectoryInstaller::new(tmp.path());
        let err = installer.install(&pkg, &[tmp.path().join("nope")]).await.unwrap_err();
        assert!(matches!(err, InstallError::Io { .. }));
    }

    #[tokio::test]
    async fn failed_copy_leaves_no_package_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("000-a.png");
        std::fs::write(&a, b"aaa").unwrap();
        let missing = tmp.path().join("001-missing.png");

        let pkg = Package::new("pack", vec!["u/a.png".to_string(), "u/missing.png".to_string()]);
        let root = tmp.path().join("installed");
        let err = DirectoryInstaller::new(&root).install(&pkg, &[a, missing]).await.unwrap_err();

        assert!(matches!(err, InstallError::Io { .. }));
        assert!(!root.join("pack").exists());
        assert!(!root.join("pack.partial").exists());
    }

    #[tokio::test]
    async fn reinstall_replaces_previous_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("installed");
        std::fs::create_dir_all(root.join("pack")).unwrap();
        std::fs::write(root.join("pack").join("stale.png"), b"old").unwrap();

        let a = tmp.path().join("000-a.png");
        std::fs::write(&a, b"aaa").unwrap();
        let pkg = Package::new("pack", vec!["u/a.png".to_string()]);
        let dir = DirectoryInstaller::new(&root).install(&pkg, &[a]).await.unwrap();

        assert_eq!(dir, root.join("pack"));
        assert!(!dir.join("stale.png").exists());
        assert!(dir.join("000-a.png").exists());
        assert!(dir.join("manifest.json").exists());
        assert!(!root.join("pack.partial").exists());
    }

    #[tokio::test]
    async fn rejects_path_count_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = Package::new("pack", vec!["a".to_string(), "b".to_string()]);
        let installer = DirectoryInstaller::new(tmp.path());
        let err = installer.install(&pkg, &[]).await.unwrap_err();
        assert!(matches!(err, InstallError::CountMismatch { expected: 2, actual: 0 }));
    }
}
