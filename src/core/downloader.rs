use crate::core::error::{codes, DownloadError};
use crate::core::events::PackageObserver;
use crate::core::installer::PackageInstaller;
use crate::core::model::{DownloadContext, Package, TransferEvent};
use crate::core::planner::PathPlanner;
use crate::core::registry::ContextRegistry;
use crate::plugins::registry::{SingleTransfer, TransferContext, TransferListener};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// External pieces the downloader drives.
#[derive(Clone)]
pub struct Collaborators {
    pub transfer: Arc<dyn SingleTransfer>,
    pub planner: Arc<dyn PathPlanner>,
    pub installer: Arc<dyn PackageInstaller>,
    pub transfer_ctx: TransferContext,
}

enum Command {
    Start { package: Package, reply: oneshot::Sender<Result<(), DownloadError>> },
    SetObserver(Option<Arc<dyn PackageObserver>>),
    IsTracked { url: String, reply: oneshot::Sender<bool> },
    InFlight { reply: oneshot::Sender<usize> },
}

/// Downloads packages one url at a time and installs them once every url is
/// on disk.
///
/// All state lives in a single worker task. Handles only send it commands,
/// and transfers report back on a second channel, so the context registry is
/// never touched concurrently no matter how many tasks submit packages.
#[derive(Clone)]
pub struct SequentialPackageDownloader {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl SequentialPackageDownloader {
    /// Starts the worker on the current tokio runtime. It stops once every
    /// handle is dropped and no package is left in flight.
    pub fn spawn(collab: Collaborators) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            registry: ContextRegistry::new(),
            observer: None,
            listener: TransferListener::new(event_tx),
            collab,
        };
        tokio::spawn(worker.run(cmd_rx, event_rx));

        Self { cmd_tx }
    }

    /// Registers `package` and issues the transfer of its first url.
    ///
    /// Fails without side effects when the package is empty, lists a url
    /// twice, or shares a url with a package that is still in flight.
    pub async fn start_download(&self, package: Package) -> Result<(), DownloadError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { package, reply })?;
        rx.await.map_err(|_| DownloadError::Closed)?
    }

    pub fn set_observer(&self, observer: Option<Arc<dyn PackageObserver>>) -> Result<(), DownloadError> {
        self.send(Command::SetObserver(observer))
    }

    /// Whether `url` currently belongs to an in-flight package.
    pub async fn is_tracked(&self, url: &str) -> Result<bool, DownloadError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::IsTracked { url: url.to_string(), reply })?;
        rx.await.map_err(|_| DownloadError::Closed)
    }

    /// Number of packages in flight.
    pub async fn in_flight(&self) -> Result<usize, DownloadError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::InFlight { reply })?;
        rx.await.map_err(|_| DownloadError::Closed)
    }

    fn send(&self, cmd: Command) -> Result<(), DownloadError> {
        self.cmd_tx.send(cmd).map_err(|_| DownloadError::Closed)
    }
}

struct Worker {
    registry: ContextRegistry,
    observer: Option<Arc<dyn PackageObserver>>,
    listener: TransferListener,
    collab: Collaborators,
}

impl Worker {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut event_rx: mpsc::UnboundedReceiver<TransferEvent>,
    ) {
        let mut accepting = true;
        loop {
            if !accepting && self.registry.is_empty() {
                break;
            }
            // events first: a command sent after an event must see its effects
            tokio::select! {
                biased;
                Some(evt) = event_rx.recv() => self.on_transfer_event(evt).await,
                cmd = cmd_rx.recv(), if accepting => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => accepting = false,
                },
                else => break,
            }
        }
        tracing::debug!("package downloader stopped");
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { package, reply } => {
                let r = self.start(package);
                if let Err(e) = &r {
                    tracing::warn!("package rejected: {}", e);
                }
                let _ = reply.send(r);
            }
            Command::SetObserver(observer) => self.observer = observer,
            Command::IsTracked { url, reply } => {
                let _ = reply.send(self.registry.contains(&url));
            }
            Command::InFlight { reply } => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    fn start(&mut self, package: Package) -> Result<(), DownloadError> {
        package.validate()?;
        let package = Arc::new(package);
        self.registry.register(DownloadContext::new(package.clone()))?;
        tracing::info!(package = %package.name, items = package.len(), "package download started");
        self.issue(&package, 0);
        Ok(())
    }

    fn issue(&self, package: &Package, index: usize) {
        let url = &package.urls[index];
        let dest = self.collab.planner.local_path(package, index);
        tracing::debug!(package = %package.name, index, url = %url, dest = %dest.display(), "issuing transfer");
        self.collab
            .transfer
            .start(url, &dest, &self.collab.transfer_ctx, self.listener.clone());
    }

    async fn on_transfer_event(&mut self, evt: TransferEvent) {
        // only the url currently being transferred may advance its package
        let current = self
            .registry
            .get(evt.url())
            .map(|ctx| ctx.next_url() == Some(evt.url()))
            .unwrap_or(false);
        if !current {
            tracing::warn!(url = evt.url(), "ignoring event for url that is not in flight");
            return;
        }

        match evt {
            TransferEvent::Succeeded { url, local_path } => self.on_item_succeeded(url, local_path).await,
            TransferEvent::Failed { url, code, message } => self.on_item_failed(url, code, message),
            TransferEvent::Progress { url, downloaded, total } => {
                if let Some(ctx) = self.registry.get(&url) {
                    let package = ctx.package.clone();
                    self.notify("item_progress", |o| o.on_item_progress(&package, &url, downloaded, total));
                }
            }
        }
    }

    async fn on_item_succeeded(&mut self, url: String, local_path: PathBuf) {
        let (package, next, finished) = match self.registry.get_mut(&url) {
            Some(ctx) => {
                ctx.local_paths.push(local_path);
                ctx.downloaded += 1;
                let finished = ctx.is_complete().then(|| ctx.local_paths.clone());
                (ctx.package.clone(), ctx.downloaded, finished)
            }
            None => return,
        };

        let Some(local_paths) = finished else {
            tracing::debug!(package = %package.name, done = next, total = package.len(), "item downloaded");
            self.notify("progress", |o| o.on_progress(&package, &url));
            self.issue(&package, next);
            return;
        };

        let installed = self.collab.installer.install(&package, &local_paths).await;

        // drop every url of the package before anyone hears about it
        self.registry.evict(&url);

        self.notify("progress", |o| o.on_progress(&package, &url));
        match installed {
            Ok(dir) => {
                tracing::info!(package = %package.name, dir = %dir.display(), "package download succeeded");
                self.notify("success", |o| o.on_success(&package));
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(package = %package.name, installer = self.collab.installer.name(), "install failed: {}", message);
                self.notify("failure", |o| o.on_failure(&package, codes::INSTALL_FAILED, &message));
            }
        }
    }

    fn on_item_failed(&mut self, url: String, code: i32, message: String) {
        let Some(ctx) = self.registry.evict(&url) else {
            return;
        };
        let package = ctx.package;
        tracing::warn!(package = %package.name, url = %url, code, "package download failed: {}", message);
        self.notify("failure", |o| o.on_failure(&package, code, &message));
    }

    /// Runs one observer callback. Errors and panics stop here.
    fn notify<F>(&self, callback: &'static str, f: F)
    where
        F: FnOnce(&dyn PackageObserver) -> anyhow::Result<()>,
    {
        let Some(observer) = self.observer.as_deref() else {
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| f(observer))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(callback, "observer callback failed: {:#}", e),
            Err(_) => tracing::warn!(callback, "observer callback panicked"),
        }
    }
}
