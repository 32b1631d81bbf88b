use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use url::Url;

const DEFAULT_HOST: &str = "https://gitorious.org";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_FEED_TIMEOUT_SECS: u64 = 90;
const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 40;
const DEFAULT_IRC_SERVER: &str = "irc.libera.chat";
const DEFAULT_IRC_PORT: u16 = 6667;
const DEFAULT_LINE_RATE_MS: u64 = 1000;

/// Flags shared by every subcommand that talks to the hosting site.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Project name on the hosting site (e.g. `maliit`)
    pub project: String,
    /// Base URL of the hosting site (env MRQ_HOST)
    #[arg(long)]
    pub host: Option<String>,
    /// Timeout for the activity feed request, in seconds (env MRQ_FEED_TIMEOUT_SECS)
    #[arg(long)]
    pub feed_timeout: Option<u64>,
    /// Timeout for project and merge-request page requests, in seconds (env MRQ_PAGE_TIMEOUT_SECS)
    #[arg(long)]
    pub page_timeout: Option<u64>,
}

/// Flags for the chat side of `monitor`.
#[derive(Args, Debug, Clone, Default)]
pub struct IrcArgs {
    /// Poll interval in seconds (env MRQ_POLL_INTERVAL_SECS)
    #[arg(long)]
    pub poll_interval: Option<u64>,
    /// IRC server host (env MRQ_IRC_SERVER)
    #[arg(long)]
    pub irc_server: Option<String>,
    /// IRC server port (env MRQ_IRC_PORT)
    #[arg(long)]
    pub irc_port: Option<u16>,
    /// Channel to join, defaults to `#<project>` (env MRQ_IRC_CHANNEL)
    #[arg(long)]
    pub irc_channel: Option<String>,
    /// Bot nickname, defaults to `<project>-gitorious` (env MRQ_IRC_NICK)
    #[arg(long)]
    pub irc_nick: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteConfig {
    pub host: String,
    pub project: String,
    pub feed_timeout: Duration,
    pub page_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrcConfig {
    pub server: String,
    pub port: u16,
    pub channel: String,
    pub nickname: String,
    pub line_rate: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    pub site: SiteConfig,
    pub poll_interval: Duration,
    pub irc: IrcConfig,
}

impl SiteConfig {
    pub fn from_args(args: &ProjectArgs) -> Result<Self> {
        let host = args.host.clone()
            .or_else(|| env::var("MRQ_HOST").ok())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host = normalize_host(&host)?;

        let project = args.project.trim().to_string();
        if project.is_empty() { bail!("project name must not be empty"); }
        if project.contains('/') { bail!("project name must not contain '/': {}", project); }

        let feed_timeout = args.feed_timeout.or_else(|| env_parse("MRQ_FEED_TIMEOUT_SECS")).unwrap_or(DEFAULT_FEED_TIMEOUT_SECS);
        let page_timeout = args.page_timeout.or_else(|| env_parse("MRQ_PAGE_TIMEOUT_SECS")).unwrap_or(DEFAULT_PAGE_TIMEOUT_SECS);

        Ok(SiteConfig {
            host,
            project,
            feed_timeout: Duration::from_secs(feed_timeout.max(1)),
            page_timeout: Duration::from_secs(page_timeout.max(1)),
        })
    }
}

impl MonitorConfig {
    pub fn from_args(project: &ProjectArgs, irc: &IrcArgs) -> Result<Self> {
        let site = SiteConfig::from_args(project)?;

        let interval = irc.poll_interval.or_else(|| env_parse("MRQ_POLL_INTERVAL_SECS")).unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if interval == 0 { bail!("poll interval must be greater than zero"); }

        let server = irc.irc_server.clone().or_else(|| env::var("MRQ_IRC_SERVER").ok()).unwrap_or_else(|| DEFAULT_IRC_SERVER.to_string());
        let port = irc.irc_port.or_else(|| env_parse("MRQ_IRC_PORT")).unwrap_or(DEFAULT_IRC_PORT);
        let mut channel = irc.irc_channel.clone().or_else(|| env::var("MRQ_IRC_CHANNEL").ok()).unwrap_or_else(|| format!("#{}", site.project));
        if !channel.starts_with('#') && !channel.starts_with('&') { channel.insert(0, '#'); }
        let nickname = irc.irc_nick.clone().or_else(|| env::var("MRQ_IRC_NICK").ok()).unwrap_or_else(|| format!("{}-gitorious", site.project));

        Ok(MonitorConfig {
            site,
            poll_interval: Duration::from_secs(interval),
            irc: IrcConfig { server, port, channel, nickname, line_rate: Duration::from_millis(DEFAULT_LINE_RATE_MS) },
        })
    }
}

fn normalize_host(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).with_context(|| format!("Invalid host URL: {}", raw))?;
    if parsed.cannot_be_a_base() { bail!("Invalid host URL: {}", raw); }
    Ok(trimmed.to_string())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// URL templates for the hosting site.
pub mod urls {
    pub fn feed_url(host: &str, project: &str) -> String { format!("{host}/{project}.atom") }
    pub fn project_url(host: &str, project: &str) -> String { format!("{host}/{project}") }
    pub fn merge_requests_url(host: &str, project: &str, repository: &str) -> String {
        format!("{host}/{project}/{repository}/merge_requests")
    }
    pub fn merge_request_url(host: &str, project: &str, repository: &str, id: &str) -> String {
        format!("{host}/{project}/{repository}/merge_requests/{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(project: &str, host: &str) -> ProjectArgs {
        ProjectArgs { project: project.into(), host: Some(host.into()), feed_timeout: Some(5), page_timeout: Some(7) }
    }

    #[test]
    fn site_config_strips_trailing_slash() {
        let cfg = SiteConfig::from_args(&args("maliit", "http://localhost:8080/")).unwrap();
        assert_eq!(cfg.host, "http://localhost:8080");
        assert_eq!(cfg.feed_timeout, Duration::from_secs(5));
        assert_eq!(cfg.page_timeout, Duration::from_secs(7));
    }

    #[test]
    fn rejects_bad_host_and_project() {
        assert!(SiteConfig::from_args(&args("maliit", "not a url")).is_err());
        assert!(SiteConfig::from_args(&args("", "http://h")).is_err());
        assert!(SiteConfig::from_args(&args("a/b", "http://h")).is_err());
    }

    #[test]
    fn monitor_defaults_derive_from_project() {
        let irc = IrcArgs { poll_interval: Some(15), irc_channel: Some("maliit-test".into()), irc_nick: Some("bot".into()), irc_server: Some("localhost".into()), irc_port: Some(6668) };
        let cfg = MonitorConfig::from_args(&args("maliit", "http://h"), &irc).unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(15));
        assert_eq!(cfg.irc.channel, "#maliit-test");
        assert_eq!(cfg.irc.nickname, "bot");
        assert_eq!(cfg.irc.port, 6668);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let irc = IrcArgs { poll_interval: Some(0), ..Default::default() };
        assert!(MonitorConfig::from_args(&args("maliit", "http://h"), &irc).is_err());
    }

    #[test]
    fn url_templates() {
        assert_eq!(urls::feed_url("http://h", "p"), "http://h/p.atom");
        assert_eq!(urls::project_url("http://h", "p"), "http://h/p");
        assert_eq!(urls::merge_requests_url("http://h", "p", "r"), "http://h/p/r/merge_requests");
        assert_eq!(urls::merge_request_url("http://h", "p", "r", "3"), "http://h/p/r/merge_requests/3");
    }
}
