use crate::core::model::Package;
use anyhow::Context;
use std::path::Path;

/// Reads a package description such as
/// `{ "name": "party", "urls": ["https://.../a.png", "https://.../b.png"] }`.
pub async fn load_package(path: &Path) -> anyhow::Result<Package> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("read manifest {}", path.display()))?;
    let package: Package = serde_json::from_slice(&raw)
        .with_context(|| format!("parse manifest {}", path.display()))?;
    package.validate()?;
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_valid_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pack.json");
        std::fs::write(&path, r#"{"name":"party","urls":["https://x.test/a.png","https://x.test/b.png"]}"#).unwrap();

        let pkg = load_package(&path).await.unwrap();
        assert_eq!(pkg.name, "party");
        assert_eq!(pkg.urls.len(), 2);
    }

    #[tokio::test]
    async fn rejects_empty_url_list() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pack.json");
        std::fs::write(&path, r#"{"name":"party","urls":[]}"#).unwrap();

        let err = load_package(&path).await.unwrap_err();
        assert!(format!("{:#}", err).contains("no urls"));
    }

    #[tokio::test]
    async fn reports_missing_file() {
        let err = load_package(Path::new("/definitely/not/here.json")).await.unwrap_err();
        assert!(format!("{:#}", err).contains("read manifest"));
    }
}
