use crate::core::error::DownloadError;
use crate::core::model::{ContextId, DownloadContext};
use std::collections::HashMap;

/// url -> in-flight package context.
///
/// Contexts are stored once and every url of the package points at the same
/// id, so evicting by any one url drops the whole package in one step.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    by_url: HashMap<String, ContextId>,
    contexts: HashMap<ContextId, DownloadContext>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every url of `ctx.package`. Nothing is inserted when any url
    /// is already owned by another context.
    pub fn register(&mut self, ctx: DownloadContext) -> Result<ContextId, DownloadError> {
        if let Some(url) = ctx.package.urls.iter().find(|u| self.by_url.contains_key(*u)) {
            return Err(DownloadError::AlreadyInFlight(url.clone()));
        }
        let id = ctx.id;
        for url in &ctx.package.urls {
            self.by_url.insert(url.clone(), id);
        }
        self.contexts.insert(id, ctx);
        Ok(id)
    }

    pub fn get_mut(&mut self, url: &str) -> Option<&mut DownloadContext> {
        let id = self.by_url.get(url)?;
        self.contexts.get_mut(id)
    }

    pub fn get(&self, url: &str) -> Option<&DownloadContext> {
        let id = self.by_url.get(url)?;
        self.contexts.get(id)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    /// Removes the context owning `url` together with all of its urls.
    pub fn evict(&mut self, url: &str) -> Option<DownloadContext> {
        let id = *self.by_url.get(url)?;
        let ctx = self.contexts.remove(&id)?;
        for u in &ctx.package.urls {
            self.by_url.remove(u);
        }
        Some(ctx)
    }

    /// Number of packages in flight.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Package;
    use std::sync::Arc;

    fn ctx(name: &str, urls: &[&str]) -> DownloadContext {
        let pkg = Package::new(name, urls.iter().map(|s| s.to_string()).collect());
        DownloadContext::new(Arc::new(pkg))
    }

    #[test]
    fn all_urls_resolve_to_the_same_context() {
        let mut reg = ContextRegistry::new();
        let id = reg.register(ctx("p", &["a", "b", "c"])).unwrap();
        for u in ["a", "b", "c"] {
            assert_eq!(reg.get(u).map(|c| c.id), Some(id));
        }
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn evict_removes_every_url_of_the_package() {
        let mut reg = ContextRegistry::new();
        reg.register(ctx("p", &["a", "b"])).unwrap();
        reg.register(ctx("q", &["x"])).unwrap();

        let evicted = reg.evict("b").expect("context");
        assert_eq!(evicted.package.name, "p");
        assert!(!reg.contains("a"));
        assert!(!reg.contains("b"));
        assert!(reg.contains("x"));
        assert!(reg.evict("a").is_none());
    }

    #[test]
    fn overlapping_registration_leaves_registry_untouched() {
        let mut reg = ContextRegistry::new();
        reg.register(ctx("p", &["a", "b"])).unwrap();

        let err = reg.register(ctx("q", &["z", "b"])).unwrap_err();
        assert!(matches!(err, DownloadError::AlreadyInFlight(ref u) if u == "b"));
        assert!(!reg.contains("z"));
        assert_eq!(reg.len(), 1);
    }
}
