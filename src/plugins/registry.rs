use crate::core::error::codes;
use crate::core::model::TransferEvent;
use clap::{ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct TransferContext {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub headers: Vec<(String, String)>,
}

impl Default for TransferContext {
    fn default() -> Self {
        Self {
            user_agent: "emojipack/0.1".to_string(),
            timeout_secs: 60,
            retries: 2,
            retry_backoff_ms: 400,
            headers: vec![],
        }
    }
}

/// Where a transfer reports back to. Cloning is cheap; a listener whose
/// downloader is gone drops events silently.
#[derive(Debug, Clone)]
pub struct TransferListener {
    tx: mpsc::UnboundedSender<TransferEvent>,
}

impl TransferListener {
    pub fn new(tx: mpsc::UnboundedSender<TransferEvent>) -> Self {
        Self { tx }
    }

    pub fn succeeded(&self, url: &str, local_path: PathBuf) {
        self.send(TransferEvent::Succeeded { url: url.to_string(), local_path });
    }

    pub fn failed(&self, url: &str, code: i32, message: impl Into<String>) {
        self.send(TransferEvent::Failed { url: url.to_string(), code, message: message.into() });
    }

    pub fn progress(&self, url: &str, downloaded: u64, total: Option<u64>) {
        self.send(TransferEvent::Progress { url: url.to_string(), downloaded, total });
    }

    fn send(&self, evt: TransferEvent) {
        if self.tx.send(evt).is_err() {
            tracing::debug!("transfer listener closed, event dropped");
        }
    }
}

/// A single-item download. `start` must not block: it hands the work off and
/// later reports exactly one of `succeeded`/`failed` (plus any number of
/// `progress` calls) on `listener`.
pub trait SingleTransfer: Send + Sync {
    fn name(&self) -> &'static str;
    fn supports(&self, url: &str) -> bool;
    fn start(&self, url: &str, dest: &Path, ctx: &TransferContext, listener: TransferListener);
}

#[derive(Debug, Clone, Default)]
pub struct DownloadCliConfig {
    pub transfer_ctx: TransferContext,
}

pub trait CliPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn augment_download_command(&self, cmd: Command) -> Command;
    fn apply_download_matches(&self, matches: &ArgMatches, cfg: &mut DownloadCliConfig) -> anyhow::Result<()>;
}

pub struct PluginRegistry {
    transfers: Vec<Arc<dyn SingleTransfer>>,
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self { transfers: vec![], cli_plugins: vec![] }
    }

    pub fn with_defaults() -> Self {
        let mut reg = Self::empty();

        reg.push_transfer(Arc::new(crate::plugins::file::transfer::FileTransfer::new()));
        reg.push_transfer(Arc::new(crate::plugins::http::transfer::HttpTransfer::new()));

        reg.cli_plugins.push(Box::new(crate::plugins::http::cli::HttpCliPlugin::new()));
        reg
    }

    pub fn push_transfer(&mut self, transfer: Arc<dyn SingleTransfer>) {
        self.transfers.push(transfer);
    }

    pub fn augment_download_command(&self, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .fold(cmd, |c, p| p.augment_download_command(c))
    }

    pub fn apply_download_matches(&self, matches: &ArgMatches, cfg: &mut DownloadCliConfig) -> anyhow::Result<()> {
        for p in &self.cli_plugins {
            tracing::debug!(plugin = p.name(), "applying download options");
            p.apply_download_matches(matches, cfg)?;
        }
        Ok(())
    }

    pub fn transfer_for(&self, url: &str) -> Option<Arc<dyn SingleTransfer>> {
        self.transfers.iter().find(|t| t.supports(url)).cloned()
    }
}

/// The registry itself acts as the downloader's transfer: each url goes to
/// the first backend that claims it.
impl SingleTransfer for PluginRegistry {
    fn name(&self) -> &'static str { "plugin-registry" }

    fn supports(&self, url: &str) -> bool {
        self.transfers.iter().any(|t| t.supports(url))
    }

    fn start(&self, url: &str, dest: &Path, ctx: &TransferContext, listener: TransferListener) {
        match self.transfer_for(url) {
            Some(t) => {
                tracing::debug!(url, transfer = t.name(), "transfer selected");
                t.start(url, dest, ctx, listener);
            }
            None => listener.failed(url, codes::UNSUPPORTED, format!("no transfer for url: {}", url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static str);

    impl SingleTransfer for Named {
        fn name(&self) -> &'static str { self.0 }
        fn supports(&self, url: &str) -> bool { url.starts_with(self.1) }
        fn start(&self, url: &str, dest: &Path, _ctx: &TransferContext, listener: TransferListener) {
            listener.succeeded(url, dest.to_path_buf());
        }
    }

    #[test]
    fn picks_first_supporting_transfer() {
        let mut reg = PluginRegistry::empty();
        reg.push_transfer(Arc::new(Named("one", "https://")));
        reg.push_transfer(Arc::new(Named("two", "http")));
        assert_eq!(reg.transfer_for("https://a").map(|t| t.name()), Some("one"));
        assert_eq!(reg.transfer_for("http://a").map(|t| t.name()), Some("two"));
        assert!(reg.transfer_for("ftp://a").is_none());
    }

    #[test]
    fn unsupported_url_fails_immediately() {
        let reg = PluginRegistry::empty();
        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.start("gopher://x", Path::new("/tmp/x"), &TransferContext::default(), TransferListener::new(tx));
        match rx.try_recv().unwrap() {
            TransferEvent::Failed { url, code, .. } => {
                assert_eq!(url, "gopher://x");
                assert_eq!(code, codes::UNSUPPORTED);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn routes_to_backend() {
        let mut reg = PluginRegistry::empty();
        reg.push_transfer(Arc::new(Named("one", "mem:")));
        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.start("mem:a", Path::new("/tmp/a"), &TransferContext::default(), TransferListener::new(tx));
        assert_eq!(
            rx.try_recv().unwrap(),
            TransferEvent::Succeeded { url: "mem:a".to_string(), local_path: PathBuf::from("/tmp/a") }
        );
    }
}
