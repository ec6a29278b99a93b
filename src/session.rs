// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted search sessions.
//!
//! Each session is one JSON document under `.mantic/sessions/`, written
//! in full after every recorded event. Concurrent writers are tolerated
//! with last-writer-wins semantics; there is no locking.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{SessionNotFoundError, StateDirUnwritableError};
use crate::util::{atomic_write_bytes, now_ms, short_id, STATE_DIR};

const SESSIONS_DIR: &str = "sessions";
const RECENT_VIEW_WINDOW_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub id: String,
    pub name: String,
    pub created_ms: u64,
    pub last_active_ms: u64,
    pub query_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// "active" or "ended"
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileActivity {
    pub view_count: u64,
    pub last_viewed_ms: u64,
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blast_radius: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRecord {
    pub query: String,
    pub timestamp_ms: u64,
    pub files_returned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub meta: SessionMeta,
    #[serde(default)]
    pub files: BTreeMap<String, FileActivity>,
    #[serde(default)]
    pub history: Vec<QueryRecord>,
    #[serde(default)]
    pub insights: Vec<String>,
}

/// A viewed file reported into a session.
#[derive(Debug, Clone)]
pub struct ViewedFile {
    pub path: String,
    pub relevance_score: f64,
    pub blast_radius: Option<String>,
}

/// Additive scoring boost derived from session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostCandidate {
    pub path: String,
    pub boost_factor: f64,
    pub reason: String,
}

/// Directory-backed session store rooted at the scan directory.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(STATE_DIR).join(SESSIONS_DIR),
        }
    }

    pub fn start(&self, name: Option<&str>, intent: Option<&str>) -> Result<Session> {
        let now = now_ms();
        let id = format!("session-{}-{}", now, short_id(6));
        let session = Session {
            meta: SessionMeta {
                id: id.clone(),
                name: name.unwrap_or(&id).to_string(),
                created_ms: now,
                last_active_ms: now,
                query_count: 0,
                intent: intent.map(str::to_string),
                status: "active".to_string(),
            },
            files: BTreeMap::new(),
            history: Vec::new(),
            insights: Vec::new(),
        };
        self.save(&session)?;
        Ok(session)
    }

    /// Load by id, or fall back to the most recently active session with
    /// a matching name and active status.
    pub fn load(&self, id_or_name: &str) -> Option<Session> {
        if let Some(session) = self.load_by_id(id_or_name) {
            return Some(session);
        }
        self.list()
            .ok()?
            .into_iter()
            .find(|s| s.meta.name == id_or_name && s.meta.status == "active")
    }

    pub fn load_required(&self, id_or_name: &str) -> Result<Session> {
        self.load(id_or_name).ok_or_else(|| {
            SessionNotFoundError {
                id_or_name: id_or_name.to_string(),
            }
            .into()
        })
    }

    fn load_by_id(&self, id: &str) -> Option<Session> {
        let path = self.dir.join(format!("{id}.json"));
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(err) => {
                eprintln!("mantic: ignoring corrupt session {id}: {err}");
                None
            }
        }
    }

    pub fn record_query(&self, session: &mut Session, query: &str, files_returned: usize) -> Result<()> {
        let now = now_ms();
        session.history.push(QueryRecord {
            query: query.to_string(),
            timestamp_ms: now,
            files_returned,
        });
        session.meta.query_count += 1;
        session.meta.last_active_ms = now;
        self.save(session)
    }

    /// Merge file views. View counts only ever increase; the relevance
    /// score keeps its first-seen value.
    pub fn record_file_views(&self, session: &mut Session, views: &[ViewedFile]) -> Result<()> {
        let now = now_ms();
        for view in views {
            let activity = session.files.entry(view.path.clone()).or_default();
            if activity.view_count == 0 {
                activity.relevance_score = view.relevance_score;
            }
            activity.view_count += 1;
            activity.last_viewed_ms = now;
            if activity.blast_radius.is_none() {
                activity.blast_radius = view.blast_radius.clone();
            }
        }
        session.meta.last_active_ms = now;
        self.save(session)
    }

    pub fn add_insight(&self, session: &mut Session, text: &str) -> Result<()> {
        session.insights.push(text.to_string());
        session.meta.last_active_ms = now_ms();
        self.save(session)
    }

    pub fn end(&self, session: &mut Session) -> Result<()> {
        session.meta.status = "ended".to_string();
        session.meta.last_active_ms = now_ms();
        self.save(session)
    }

    pub fn list(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(sessions),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            if let Ok(session) = serde_json::from_str::<Session>(&content) {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| {
            b.meta
                .last_active_ms
                .cmp(&a.meta.last_active_ms)
                .then_with(|| a.meta.id.cmp(&b.meta.id))
        });
        Ok(sessions)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.dir.join(format!("{id}.json"));
        std::fs::remove_file(&path).with_context(|| format!("delete session {id}"))
    }

    fn save(&self, session: &Session) -> Result<()> {
        let path = self.dir.join(format!("{}.json", session.meta.id));
        let content = serde_json::to_string_pretty(session).context("serialize session")?;
        if atomic_write_bytes(&path, content.as_bytes()).is_err() {
            return Err(StateDirUnwritableError {
                dir: self.dir.display().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Boost factors for previously viewed files:
/// `min(50, 10 * views)` plus 20 when viewed within the last 5 minutes.
pub fn boost_candidates(session: &Session) -> Vec<BoostCandidate> {
    let now = now_ms();
    session
        .files
        .iter()
        .filter(|(_, activity)| activity.view_count > 0)
        .map(|(path, activity)| {
            let base = (10.0 * activity.view_count as f64).min(50.0);
            let recent = now.saturating_sub(activity.last_viewed_ms) <= RECENT_VIEW_WINDOW_MS;
            let boost_factor = base + if recent { 20.0 } else { 0.0 };
            let reason = format!(
                "viewed {}x{}",
                activity.view_count,
                if recent { ", recently" } else { "" }
            );
            BoostCandidate {
                path: path.clone(),
                boost_factor,
                reason,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SessionStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = SessionStore::new(dir.path());
        (dir, store)
    }

    fn view(path: &str) -> ViewedFile {
        ViewedFile {
            path: path.to_string(),
            relevance_score: 42.0,
            blast_radius: None,
        }
    }

    #[test]
    fn start_creates_persisted_active_session() {
        let (_dir, store) = store();
        let session = store.start(Some("fix-auth"), Some("auth work")).expect("start");
        assert!(session.meta.id.starts_with("session-"));
        assert_eq!(session.meta.status, "active");

        let loaded = store.load(&session.meta.id).expect("load by id");
        assert_eq!(loaded, session);
        let by_name = store.load("fix-auth").expect("load by name");
        assert_eq!(by_name.meta.id, session.meta.id);
    }

    #[test]
    fn view_counts_are_monotonic() {
        let (_dir, store) = store();
        let mut session = store.start(Some("s"), None).expect("start");

        store
            .record_file_views(&mut session, &[view("src/a.ts")])
            .expect("first view");
        let first = session.files["src/a.ts"].view_count;
        store
            .record_file_views(&mut session, &[view("src/a.ts"), view("src/b.ts")])
            .expect("second view");
        let second = session.files["src/a.ts"].view_count;
        assert!(second > first);
        assert_eq!(session.files["src/b.ts"].view_count, 1);
    }

    #[test]
    fn first_seen_relevance_is_kept() {
        let (_dir, store) = store();
        let mut session = store.start(Some("s"), None).expect("start");
        store
            .record_file_views(&mut session, &[view("src/a.ts")])
            .expect("view");
        let mut later = view("src/a.ts");
        later.relevance_score = 7.0;
        store
            .record_file_views(&mut session, &[later])
            .expect("view again");
        assert_eq!(session.files["src/a.ts"].relevance_score, 42.0);
    }

    #[test]
    fn boosts_follow_view_count_and_recency() {
        let (_dir, store) = store();
        let mut session = store.start(Some("s"), None).expect("start");
        for _ in 0..3 {
            store
                .record_file_views(&mut session, &[view("src/a.ts")])
                .expect("view");
        }

        let boosts = boost_candidates(&session);
        assert_eq!(boosts.len(), 1);
        // 3 views = 30, plus 20 for recency.
        assert_eq!(boosts[0].boost_factor, 50.0);

        for _ in 0..10 {
            store
                .record_file_views(&mut session, &[view("src/a.ts")])
                .expect("view");
        }
        let capped = boost_candidates(&session);
        assert_eq!(capped[0].boost_factor, 70.0);
    }

    #[test]
    fn end_flips_status_and_persists() {
        let (_dir, store) = store();
        let mut session = store.start(Some("s"), None).expect("start");
        store.end(&mut session).expect("end");
        let reloaded = store.load(&session.meta.id).expect("reload");
        assert_eq!(reloaded.meta.status, "ended");
        // Ended sessions are no longer reachable by name.
        assert!(store.load("s").is_none());
    }

    #[test]
    fn list_orders_by_last_active_desc() {
        let (_dir, store) = store();
        let first = store.start(Some("one"), None).expect("start one");
        std::thread::sleep(std::time::Duration::from_millis(15));
        let mut second = store.start(Some("two"), None).expect("start two");
        store
            .record_query(&mut second, "query", 3)
            .expect("record query");

        let listed = store.list().expect("list");
        assert_eq!(listed[0].meta.id, second.meta.id);
        assert!(listed.iter().any(|s| s.meta.id == first.meta.id));
    }

    #[test]
    fn unwritable_state_dir_is_a_typed_fatal_error() {
        let dir = TempDir::new().expect("tempdir");
        // A plain file where the state directory should go makes every
        // session write fail.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "not a directory\n").expect("write blocker");

        let store = SessionStore::new(&blocked);
        let err = store.start(Some("doomed"), None).expect_err("start fails");
        assert!(
            err.downcast_ref::<crate::errors::StateDirUnwritableError>()
                .is_some(),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn delete_removes_document() {
        let (_dir, store) = store();
        let session = store.start(Some("gone"), None).expect("start");
        store.delete(&session.meta.id).expect("delete");
        assert!(store.load(&session.meta.id).is_none());
    }

    #[test]
    fn session_round_trips_through_json() {
        let (_dir, store) = store();
        let mut session = store.start(Some("rt"), Some("intent")).expect("start");
        store
            .record_query(&mut session, "login bug", 5)
            .expect("record");
        store
            .record_file_views(&mut session, &[view("src/a.ts")])
            .expect("views");
        store
            .add_insight(&mut session, "auth flow lives in src/auth")
            .expect("insight");

        let reloaded = store.load(&session.meta.id).expect("reload");
        assert_eq!(reloaded, session);
    }
}
