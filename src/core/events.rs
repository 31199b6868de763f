use crate::core::model::Package;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Receives package-level notifications from the downloader.
///
/// Callbacks run on the downloader task after the registry has been updated.
/// Returned errors (and panics) are logged and otherwise ignored.
pub trait PackageObserver: Send + Sync {
    /// One url of `package` finished downloading.
    fn on_progress(&self, package: &Package, url: &str) -> anyhow::Result<()>;

    /// Byte-level progress of the url currently being transferred.
    fn on_item_progress(&self, _package: &Package, _url: &str, _downloaded: u64, _total: Option<u64>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_success(&self, package: &Package) -> anyhow::Result<()>;

    fn on_failure(&self, package: &Package, code: i32, message: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageEvent {
    Progress { package: Arc<Package>, url: String },
    ItemProgress { package: Arc<Package>, url: String, downloaded: u64, total: Option<u64> },
    Succeeded { package: Arc<Package> },
    Failed { package: Arc<Package>, code: i32, message: String },
}

impl PackageEvent {
    pub fn package(&self) -> &Package {
        match self {
            PackageEvent::Progress { package, .. }
            | PackageEvent::ItemProgress { package, .. }
            | PackageEvent::Succeeded { package }
            | PackageEvent::Failed { package, .. } => package,
        }
    }
}

/// Re-publishes observer callbacks on a broadcast channel.
#[derive(Clone)]
pub struct ChannelObserver {
    event_tx: broadcast::Sender<PackageEvent>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self { event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PackageEvent> {
        self.event_tx.subscribe()
    }

    fn publish(&self, evt: PackageEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(evt);
    }
}

impl PackageObserver for ChannelObserver {
    fn on_progress(&self, package: &Package, url: &str) -> anyhow::Result<()> {
        self.publish(PackageEvent::Progress { package: Arc::new(package.clone()), url: url.to_string() });
        Ok(())
    }

    fn on_item_progress(&self, package: &Package, url: &str, downloaded: u64, total: Option<u64>) -> anyhow::Result<()> {
        self.publish(PackageEvent::ItemProgress {
            package: Arc::new(package.clone()),
            url: url.to_string(),
            downloaded,
            total,
        });
        Ok(())
    }

    fn on_success(&self, package: &Package) -> anyhow::Result<()> {
        self.publish(PackageEvent::Succeeded { package: Arc::new(package.clone()) });
        Ok(())
    }

    fn on_failure(&self, package: &Package, code: i32, message: &str) -> anyhow::Result<()> {
        self.publish(PackageEvent::Failed {
            package: Arc::new(package.clone()),
            code,
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_callbacks_in_order() {
        let obs = ChannelObserver::new(16);
        let mut rx = obs.subscribe();
        let pkg = Package::new("p", vec!["a".to_string()]);

        obs.on_progress(&pkg, "a").unwrap();
        obs.on_failure(&pkg, 404, "not found").unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, PackageEvent::Progress { ref url, .. } if url == "a"));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.package().name, "p");
        assert!(matches!(second, PackageEvent::Failed { code: 404, .. }));
    }

    #[test]
    fn publishing_without_subscribers_is_ok() {
        let obs = ChannelObserver::new(1);
        let pkg = Package::new("p", vec!["a".to_string()]);
        assert!(obs.on_success(&pkg).is_ok());
    }
}
