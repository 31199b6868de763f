use crate::plugins::registry::{CliPlugin, DownloadCliConfig};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

pub struct HttpCliPlugin;

impl HttpCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (k, v) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("invalid header format: {}", raw))?;
    let k = k.trim();
    if k.is_empty() {
        anyhow::bail!("empty header name: {}", raw);
    }
    Ok((k.to_string(), v.trim().to_string()))
}

impl CliPlugin for HttpCliPlugin {
    fn name(&self) -> &'static str {
        "http"
    }

    fn augment_download_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("http_header")
                .long("header")
                .value_name("NAME: VALUE")
                .help_heading("Fetching emoji over HTTP")
                .help("Header sent with every emoji request (repeatable), e.g. 'Authorization: Bearer t'")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("http_user_agent")
                .long("user-agent")
                .value_name("UA")
                .help_heading("Fetching emoji over HTTP")
                .help("User-Agent presented to emoji hosts")
                .default_value("emojipack/0.1"),
        )
        .arg(
            Arg::new("http_timeout_secs")
                .long("timeout-secs")
                .value_name("SECS")
                .help_heading("Fetching emoji over HTTP")
                .help("Give up on a single emoji file after this many seconds")
                .value_parser(value_parser!(u64).range(1..))
                .default_value("60"),
        )
        .arg(
            Arg::new("http_retries")
                .long("retries")
                .value_name("N")
                .help_heading("Fetching emoji over HTTP")
                .help("Extra attempts per emoji file after a dropped connection, 408, 429 or 5xx")
                .value_parser(value_parser!(u32))
                .default_value("2"),
        )
        .arg(
            Arg::new("http_retry_backoff_ms")
                .long("retry-backoff-ms")
                .value_name("MS")
                .help_heading("Fetching emoji over HTTP")
                .help("Delay before the first retry; doubles on each further attempt")
                .value_parser(value_parser!(u64))
                .default_value("400"),
        )
    }

    fn apply_download_matches(&self, matches: &ArgMatches, cfg: &mut DownloadCliConfig) -> anyhow::Result<()> {
        let ctx = &mut cfg.transfer_ctx;
        if let Some(ua) = matches.get_one::<String>("http_user_agent") {
            ctx.user_agent = ua.clone();
        }
        if let Some(&secs) = matches.get_one::<u64>("http_timeout_secs") {
            ctx.timeout_secs = secs;
        }
        if let Some(&n) = matches.get_one::<u32>("http_retries") {
            ctx.retries = n;
        }
        if let Some(&ms) = matches.get_one::<u64>("http_retry_backoff_ms") {
            ctx.retry_backoff_ms = ms;
        }
        if let Some(values) = matches.get_many::<String>("http_header") {
            for h in values {
                ctx.headers.push(parse_header(h)?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(args: &[&str]) -> ArgMatches {
        let cmd = HttpCliPlugin::new().augment_download_command(Command::new("download"));
        cmd.try_get_matches_from(std::iter::once("download").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn applies_defaults() {
        let mut cfg = DownloadCliConfig::default();
        HttpCliPlugin::new().apply_download_matches(&matches(&[]), &mut cfg).unwrap();
        assert_eq!(cfg.transfer_ctx.user_agent, "emojipack/0.1");
        assert_eq!(cfg.transfer_ctx.timeout_secs, 60);
        assert_eq!(cfg.transfer_ctx.retries, 2);
        assert!(cfg.transfer_ctx.headers.is_empty());
    }

    #[test]
    fn collects_headers_and_overrides() {
        let mut cfg = DownloadCliConfig::default();
        let m = matches(&[
            "--header", "Authorization: Bearer t",
            "--header", "X-Trace:1",
            "--retries", "5",
        ]);
        HttpCliPlugin::new().apply_download_matches(&m, &mut cfg).unwrap();
        assert_eq!(
            cfg.transfer_ctx.headers,
            vec![
                ("Authorization".to_string(), "Bearer t".to_string()),
                ("X-Trace".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(cfg.transfer_ctx.retries, 5);
    }

    #[test]
    fn rejects_non_numeric_and_zero_timeouts() {
        let cmd = HttpCliPlugin::new().augment_download_command(Command::new("download"));
        assert!(cmd.clone().try_get_matches_from(["download", "--timeout-secs", "soon"]).is_err());
        assert!(cmd.try_get_matches_from(["download", "--timeout-secs", "0"]).is_err());
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }
}
