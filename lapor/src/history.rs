//! Persistent turn log.
//!
//! Append-only and write-and-forget: the core never reads the log back, and a
//! failing log must never fail the turn that produced it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::dialogue::{Role, Session};

/// Write-and-forget conversation log.
#[async_trait]
pub trait TurnLog: Send + Sync {
    /// Record that a session started.
    async fn session_started(&self, session: &Session);

    /// Record one turn.
    async fn turn(&self, session_id: &str, role: Role, content: &str);

    /// Record that the dialogue reached a successful outcome.
    async fn completed(&self, session_id: &str, outcome_id: &str);
}

/// Log sink that drops everything.
#[derive(Default)]
pub struct NoopTurnLog;

#[async_trait]
impl TurnLog for NoopTurnLog {
    async fn session_started(&self, _session: &Session) {}
    async fn turn(&self, _session_id: &str, _role: Role, _content: &str) {}
    async fn completed(&self, _session_id: &str, _outcome_id: &str) {}
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum LogRecord<'a> {
    SessionStarted {
        session_id: &'a str,
        user_id: &'a str,
        locale: &'a str,
        timestamp: String,
    },
    Turn {
        session_id: &'a str,
        role: Role,
        content: &'a str,
        timestamp: String,
    },
    Completed {
        session_id: &'a str,
        outcome_id: &'a str,
        timestamp: String,
    },
}

/// JSONL file log, one file per session under a base directory.
pub struct FileTurnLog {
    dir: PathBuf,
}

impl FileTurnLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("failed to create turn log directory: {}", e);
        }
        Self { dir }
    }

    fn append(&self, session_id: &str, record: &LogRecord<'_>) {
        let path = self.dir.join(format!("{}.jsonl", session_id));
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("failed to serialize turn log record: {}", e);
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = result {
            tracing::warn!("failed to append turn log for {}: {}", session_id, e);
        }
    }
}

#[async_trait]
impl TurnLog for FileTurnLog {
    async fn session_started(&self, session: &Session) {
        self.append(
            &session.id,
            &LogRecord::SessionStarted {
                session_id: &session.id,
                user_id: &session.user_id,
                locale: session.locale.as_str(),
                timestamp: Utc::now().to_rfc3339(),
            },
        );
    }

    async fn turn(&self, session_id: &str, role: Role, content: &str) {
        self.append(
            session_id,
            &LogRecord::Turn {
                session_id,
                role,
                content,
                timestamp: Utc::now().to_rfc3339(),
            },
        );
    }

    async fn completed(&self, session_id: &str, outcome_id: &str) {
        self.append(
            session_id,
            &LogRecord::Completed {
                session_id,
                outcome_id,
                timestamp: Utc::now().to_rfc3339(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::{InMemorySessionStore, SessionStore};
    use crate::locale::Locale;

    #[tokio::test]
    async fn file_log_appends_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileTurnLog::new(dir.path());
        let store = InMemorySessionStore::new();
        let session = store.create("user@example.com", Locale::Id);

        log.session_started(&session).await;
        log.turn(&session.id, Role::User, "buatkan report").await;
        log.turn(&session.id, Role::Assistant, "Untuk merchant mana?").await;
        log.completed(&session.id, "42").await;

        let content =
            std::fs::read_to_string(dir.path().join(format!("{}.jsonl", session.id))).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("session_started"));
        assert!(lines[1].contains("buatkan report"));
        assert!(lines[3].contains("\"outcome_id\":\"42\""));
    }

    #[tokio::test]
    async fn file_log_swallows_write_failures() {
        // A directory that cannot exist: appends must not panic or error out.
        let log = FileTurnLog::new("/proc/nonexistent/turnlog");
        log.turn("s1", Role::User, "hello").await;
    }
}
