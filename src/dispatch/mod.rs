//! Chat commands answered from the cached project snapshot.

use chrono::Utc;

use crate::aggregate::SnapshotReader;
use crate::telemetry::{self};
use crate::telemetry::ops::dispatch::Phase as DispatchPhase;

pub const NO_DATA: &str = "no data available";
pub const NO_OPEN: &str = "no open merge requests";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Command { List, Status, Help, Ping }

struct CommandSpec {
    name: &'static str,
    command: Command,
    hidden: bool,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "list", command: Command::List, hidden: false },
    CommandSpec { name: "status", command: Command::Status, hidden: false },
    CommandSpec { name: "help", command: Command::Help, hidden: false },
    CommandSpec { name: "commands", command: Command::Help, hidden: false },
    CommandSpec { name: "ping", command: Command::Ping, hidden: true },
];

/// The part of a channel message that follows the bot's name, when the
/// message is addressed to it as `nick: ...`, `nick, ...` or `nick ...`.
pub fn strip_address<'a>(nick: &str, text: &'a str) -> Option<&'a str> {
    let text = text.trim_start();
    let head = text.get(..nick.len())?;
    if !head.eq_ignore_ascii_case(nick) { return None; }
    let rest = &text[nick.len()..];
    match rest.chars().next() {
        None => Some(""),
        Some(':') | Some(',') => Some(rest[1..].trim()),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

/// Answers addressed messages. Holds only the read half of the snapshot
/// cache, so a running refresh never delays a reply.
#[derive(Clone)]
pub struct CommandDispatcher {
    snapshots: SnapshotReader,
}

impl CommandDispatcher {
    pub fn new(snapshots: SnapshotReader) -> Self {
        Self { snapshots }
    }

    /// Reply for `user`, one prefixed line per response line. `None` for an
    /// empty message.
    pub fn handle(&self, user: &str, text: &str) -> Option<String> {
        let log = telemetry::dispatch();
        let token = text.split_whitespace().next()?;
        let _s = log.span_kv(&DispatchPhase::Command, [("user", user.to_string()), ("command", token.to_string())]).entered();

        let lines = match COMMANDS.iter().find(|c| c.name.eq_ignore_ascii_case(token)) {
            Some(spec) => {
                log.debug(format!("💬 {user} asked for {}", spec.name));
                self.run(spec.command)
            }
            None => {
                log.info_kv(&format!("❓ Unknown command from {user}: {token}"), [("user", user.to_string()), ("token", token.to_string())]);
                vec![format!("unknown command: {token}")]
            }
        };
        Some(lines.iter().map(|l| format!("{user}: {l}")).collect::<Vec<_>>().join("\n"))
    }

    fn run(&self, command: Command) -> Vec<String> {
        match command {
            Command::List => self.list(),
            Command::Status => vec![self.status()],
            Command::Help => vec![help_line()],
            Command::Ping => vec!["pong".to_string()],
        }
    }

    /// Lines for `list`, in repository then row order.
    pub fn list(&self) -> Vec<String> {
        match self.snapshots.latest() {
            None => vec![NO_DATA.to_string()],
            Some(s) if s.records.is_empty() => vec![NO_OPEN.to_string()],
            Some(s) => s.records.iter().map(|r| r.list_line()).collect(),
        }
    }

    fn status(&self) -> String {
        let Some(s) = self.snapshots.latest() else { return NO_DATA.to_string() };
        let age = (Utc::now() - s.refreshed_at).num_seconds().max(0);
        let mut line = format!(
            "{} open merge request(s) in {} repositor(ies), refreshed {}s ago",
            s.records.len(), s.repositories.len(), age,
        );
        if s.is_partial() {
            line.push_str(&format!(" ({} failed: {})", s.failed_repositories.len(), s.failed_repositories.join(", ")));
        }
        line
    }
}

fn help_line() -> String {
    let names: Vec<&str> = COMMANDS.iter().filter(|c| !c.hidden).map(|c| c.name).collect();
    format!("available commands: {}", names.join(", "))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::aggregate::snapshot::SnapshotPublisher;
    use crate::aggregate::{snapshot_cache, ProjectSnapshot};
    use crate::scrape::MergeRequestRecord;

    fn record(repo: &str, id: &str, status: &str, summary: &str) -> MergeRequestRecord {
        MergeRequestRecord {
            id: id.into(),
            status: status.into(),
            summary: summary.into(),
            target_branch: "master".into(),
            creator: "mikhas".into(),
            created_at: Utc.with_ymd_and_hms(2011, 12, 17, 15, 35, 14).unwrap(),
            repository: repo.into(),
        }
    }

    fn publish(publisher: &SnapshotPublisher, records: Vec<MergeRequestRecord>, failed: Vec<&str>) {
        publisher.publish(ProjectSnapshot {
            records,
            repositories: vec!["alpha".into(), "beta".into()],
            failed_repositories: failed.into_iter().map(String::from).collect(),
            refreshed_at: Utc::now(),
        });
    }

    #[test]
    fn list_walks_through_snapshot_states() {
        let (publisher, reader) = snapshot_cache();
        let d = CommandDispatcher::new(reader);

        assert_eq!(d.handle("alice", "list").unwrap(), "alice: no data available");

        publish(&publisher, vec![], vec![]);
        assert_eq!(d.handle("alice", "list").unwrap(), "alice: no open merge requests");

        publish(&publisher, vec![
            record("alpha", "1", "New", "Fix a"),
            record("alpha", "2", "Open", "Fix b"),
            record("beta", "127", "New", "Allow X"),
        ], vec![]);
        assert_eq!(
            d.handle("alice", "LIST please").unwrap(),
            "alice: alpha/1: - New - Fix a\nalice: alpha/2: - Open - Fix b\nalice: beta/127: - New - Allow X",
        );
    }

    #[test]
    fn help_hides_hidden_commands() {
        let (_publisher, reader) = snapshot_cache();
        let d = CommandDispatcher::new(reader);
        let help = d.handle("bob", "help").unwrap();
        assert_eq!(help, "bob: available commands: list, status, help, commands");
        assert_eq!(d.handle("bob", "Commands").unwrap(), help);
        assert_eq!(d.handle("bob", "ping").unwrap(), "bob: pong");
    }

    #[test]
    fn unknown_and_empty_messages() {
        let (_publisher, reader) = snapshot_cache();
        let d = CommandDispatcher::new(reader);
        assert_eq!(d.handle("bob", "deploy now").unwrap(), "bob: unknown command: deploy");
        assert_eq!(d.handle("bob", "   "), None);
    }

    #[test]
    fn status_reports_partial_snapshot() {
        let (publisher, reader) = snapshot_cache();
        let d = CommandDispatcher::new(reader);
        assert_eq!(d.handle("bob", "status").unwrap(), "bob: no data available");

        publish(&publisher, vec![record("alpha", "1", "New", "Fix a")], vec!["beta"]);
        let status = d.handle("bob", "status").unwrap();
        assert!(status.starts_with("bob: 1 open merge request(s) in 2 repositor(ies)"), "{status}");
        assert!(status.ends_with("(1 failed: beta)"), "{status}");
    }

    #[test]
    fn addressing_forms() {
        assert_eq!(strip_address("bot", "bot: list"), Some("list"));
        assert_eq!(strip_address("bot", "BOT, list"), Some("list"));
        assert_eq!(strip_address("bot", "bot list"), Some("list"));
        assert_eq!(strip_address("bot", "bot:"), Some(""));
        assert_eq!(strip_address("bot", "bottle list"), None);
        assert_eq!(strip_address("bot", "hey bot: list"), None);
        assert_eq!(strip_address("bot", "bö"), None);
    }
}
