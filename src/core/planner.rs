use crate::core::model::Package;
use sanitize_filename::sanitize;
use std::path::{Path, PathBuf};
use url::Url;

/// Maps the i-th url of a package to the file it should be downloaded into.
pub trait PathPlanner: Send + Sync {
    fn local_path(&self, package: &Package, index: usize) -> PathBuf;
}

/// `<root>/<package>/<index>-<file name>`; the index prefix keeps files
/// unique and in download order even when urls share a file name.
#[derive(Debug, Clone)]
pub struct DirPlanner {
    root: PathBuf,
}

impl DirPlanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PathPlanner for DirPlanner {
    fn local_path(&self, package: &Package, index: usize) -> PathBuf {
        let file = package
            .urls
            .get(index)
            .map(|u| file_name_for(u))
            .unwrap_or_else(|| "item.bin".to_string());
        self.root
            .join(package_dir_name(package))
            .join(format!("{:03}-{}", index, file))
    }
}

pub fn package_dir_name(package: &Package) -> String {
    let name = sanitize(package.name.trim());
    if name.is_empty() {
        "package".to_string()
    } else {
        name
    }
}

fn file_name_for(raw: &str) -> String {
    let last = match Url::parse(raw) {
        Ok(u) => u
            .path_segments()
            .and_then(|s| s.last())
            .map(|s| s.to_string()),
        Err(_) => Path::new(raw)
            .file_name()
            .map(|s| s.to_string_lossy().to_string()),
    };
    last.map(|s| sanitize(s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "item.bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg() -> Package {
        Package::new(
            "Party Pack",
            vec![
                "https://cdn.example.com/emoji/smile.png".to_string(),
                "https://cdn.example.com/emoji/".to_string(),
                "/var/tmp/wink.gif".to_string(),
            ],
        )
    }

    #[test]
    fn uses_index_prefix_and_url_file_name() {
        let planner = DirPlanner::new("/downloads");
        assert_eq!(
            planner.local_path(&pkg(), 0),
            PathBuf::from("/downloads/Party Pack/000-smile.png")
        );
        assert_eq!(
            planner.local_path(&pkg(), 2),
            PathBuf::from("/downloads/Party Pack/002-wink.gif")
        );
    }

    #[test]
    fn falls_back_when_url_has_no_file_name() {
        let planner = DirPlanner::new("/downloads");
        assert_eq!(
            planner.local_path(&pkg(), 1),
            PathBuf::from("/downloads/Party Pack/001-item.bin")
        );
    }

    #[test]
    fn is_deterministic() {
        let planner = DirPlanner::new("out");
        assert_eq!(planner.local_path(&pkg(), 0), planner.local_path(&pkg(), 0));
    }

    #[test]
    fn blank_package_name_gets_a_default_dir() {
        let p = Package::new("  ", vec!["https://x.test/a.png".to_string()]);
        assert_eq!(package_dir_name(&p), "package");
    }
}
