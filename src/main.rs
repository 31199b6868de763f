mod core;
mod i18n;
mod logging;
mod plugins;

use clap::{Arg, ArgAction, ArgMatches, Command};
use crate::core::downloader::{Collaborators, SequentialPackageDownloader};
use crate::core::error::codes;
use crate::core::events::{ChannelObserver, PackageEvent, PackageObserver};
use crate::core::installer::DirectoryInstaller;
use crate::core::model::Package;
use crate::core::planner::DirPlanner;
use i18n::{Locale, Messages};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use plugins::registry::{DownloadCliConfig, PluginRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

fn build_cli(registry: &PluginRegistry) -> Command {
    let download = Command::new("download")
        .about("Download a package of files one by one and install it")
        .arg(
            Arg::new("urls")
                .help("Package urls, downloaded in the given order")
                .action(ArgAction::Append)
                .num_args(1..)
                .required_unless_present("manifest")
                .conflicts_with("manifest"),
        )
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .help("JSON package manifest: {\"name\": ..., \"urls\": [...]}")
                .num_args(1),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .help("Package name (ignored with --manifest)")
                .default_value("package")
                .num_args(1),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Directory for downloaded items")
                .default_value("./downloads")
                .num_args(1),
        )
        .arg(
            Arg::new("install_dir")
                .long("install-dir")
                .help("Directory packages are installed into")
                .default_value("./packages")
                .num_args(1),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .help("Output language (en, zh)")
                .default_value("en")
                .num_args(1),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging (RUST_LOG overrides)")
                .action(ArgAction::SetTrue),
        );

    let download = registry.augment_download_command(download);

    Command::new("emojipack")
        .about("Sequential package downloader")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(download)
}

async fn package_from_matches(m: &ArgMatches) -> anyhow::Result<Package> {
    if let Some(path) = m.get_one::<String>("manifest") {
        return crate::core::manifest::load_package(Path::new(path)).await;
    }
    let urls: Vec<String> = m
        .get_many::<String>("urls")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let name = m
        .get_one::<String>("name")
        .cloned()
        .unwrap_or_else(|| "package".to_string());
    Ok(Package::new(name, urls))
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Installed,
    Failed { code: i32, message: String },
}

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

/// Draws package and item progress until the package reaches a terminal event.
async fn render_progress(
    rx: &mut broadcast::Receiver<PackageEvent>,
    package: &Package,
    msgs: &Messages,
) -> Outcome {
    let mp = MultiProgress::new();
    let overall = mp.add(ProgressBar::new(package.len() as u64));
    overall.set_style(style("{prefix} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}", ProgressStyle::default_bar));
    overall.set_prefix(format!("[{}]", package.name));

    let item = mp.add(ProgressBar::new(0));
    item.set_style(style(
        "  {bytes}/{total_bytes} ({bytes_per_sec}) {wide_msg}",
        ProgressStyle::default_bar,
    ));

    loop {
        let evt = match rx.recv().await {
            Ok(e) => e,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => {
                return Outcome::Failed { code: codes::IO, message: "downloader stopped".to_string() };
            }
        };
        if evt.package() != package {
            continue;
        }

        match evt {
            PackageEvent::ItemProgress { url, downloaded, total, .. } => {
                if let Some(t) = total {
                    item.set_length(t);
                }
                item.set_position(downloaded);
                item.set_message(url);
            }
            PackageEvent::Progress { url, .. } => {
                overall.inc(1);
                overall.set_message(format!("{} {}", msgs.item_done, url));
                item.reset();
            }
            PackageEvent::Succeeded { .. } => {
                item.finish_and_clear();
                overall.finish_with_message(msgs.package_done);
                return Outcome::Installed;
            }
            PackageEvent::Failed { code, message, .. } => {
                item.finish_and_clear();
                overall.abandon_with_message(format!("{} {}: {}", msgs.error_prefix, code, message));
                return Outcome::Failed { code, message };
            }
        }
    }
}

async fn run_download(registry: PluginRegistry, m: &ArgMatches) -> anyhow::Result<()> {
    logging::init(m.get_flag("verbose"));

    let locale = m
        .get_one::<String>("locale")
        .map(|s| Locale::parse(s))
        .unwrap_or_default();
    let msgs = i18n::get_messages(locale);

    let out_dir: PathBuf = m.get_one::<String>("out_dir").map(PathBuf::from).unwrap_or_else(|| "./downloads".into());
    let install_dir: PathBuf = m.get_one::<String>("install_dir").map(PathBuf::from).unwrap_or_else(|| "./packages".into());

    let mut cfg = DownloadCliConfig::default();
    registry.apply_download_matches(m, &mut cfg)?;

    let package = package_from_matches(m).await?;

    let observer = Arc::new(ChannelObserver::new(256));
    let mut rx = observer.subscribe();

    let downloader = SequentialPackageDownloader::spawn(Collaborators {
        transfer: Arc::new(registry),
        planner: Arc::new(DirPlanner::new(out_dir)),
        installer: Arc::new(DirectoryInstaller::new(install_dir.clone())),
        transfer_ctx: cfg.transfer_ctx,
    });
    let shared: Arc<dyn PackageObserver> = observer;
    downloader.set_observer(Some(shared))?;
    downloader.start_download(package.clone()).await?;
    println!("{}: {} ({} {})", msgs.package_started, package.name, package.len(), msgs.items_label);

    let outcome = render_progress(&mut rx, &package, msgs).await;

    println!();
    println!("{}:", msgs.summary_header);
    match outcome {
        Outcome::Installed => {
            println!("- {} -> {}", package.name, install_dir.display());
            Ok(())
        }
        Outcome::Failed { code, message } => {
            anyhow::bail!("{}: {} (code={}) {}", msgs.package_failed, package.name, code, message)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let registry = PluginRegistry::with_defaults();
    let app = build_cli(&registry);
    let matches = app.get_matches();

    match matches.subcommand() {
        Some(("download", m)) => run_download(registry, m).await,
        _ => Ok(()),
    }
}
