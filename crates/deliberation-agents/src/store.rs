//! File-backed session store.
//!
//! One pretty-printed JSON record per session under a directory. Every write
//! goes to a temp file in the same directory and is renamed over the target,
//! so a crash mid-write leaves the previous record intact.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use deliberation::{
    FinalCommit, NegotiationSession, PersistenceError, PersistenceGateway, Round, SessionRecord,
};
use tokio::sync::Mutex;

pub struct JsonFileStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles across sessions.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(backend)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::Backend(format!(
                "invalid session id for file store: {:?}",
                id
            )));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    fn load(&self, id: &str) -> Result<NegotiationSession, PersistenceError> {
        let path = self.path_for(id)?;
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(id.to_string()))
            }
            Err(e) => return Err(backend(e)),
        };
        Ok(SessionRecord::from_json(&json)?.session)
    }

    fn save(&self, session: &NegotiationSession) -> Result<(), PersistenceError> {
        let path = self.path_for(&session.id)?;
        let json = SessionRecord::new(session).to_json()?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(backend)?;
        tmp.write_all(json.as_bytes()).map_err(backend)?;
        tmp.as_file().sync_all().map_err(backend)?;
        tmp.persist(&path).map_err(|e| backend(e.error))?;
        Ok(())
    }
}

fn backend(e: std::io::Error) -> PersistenceError {
    PersistenceError::Backend(e.to_string())
}

#[async_trait]
impl PersistenceGateway for JsonFileStore {
    async fn create_session(&self, session: NegotiationSession) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        if self.path_for(&session.id)?.exists() {
            return Err(PersistenceError::AlreadyExists(session.id));
        }
        self.save(&session)
    }

    async fn read_session(&self, id: &str) -> Result<NegotiationSession, PersistenceError> {
        self.load(id)
    }

    async fn append_round(&self, id: &str, round: Round) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut session = self.load(id)?;
        let (expected, found) = (session.next_round(), round.round);
        session
            .push_round(round)
            .map_err(|_| PersistenceError::RoundConflict { expected, found })?;
        self.save(&session)
    }

    async fn commit_final(&self, id: &str, commit: FinalCommit) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut session = self.load(id)?;
        commit.apply(&mut session);
        self.save(&session)
    }

    async fn list_sessions(&self) -> Result<Vec<String>, PersistenceError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(backend)? {
            let path = entry.map_err(backend)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deliberation::{AgentRole, BudgetLevel, UrgencyLevel};

    fn round(n: u32, agent: AgentRole, shift: i32) -> Round {
        Round {
            round: n,
            agent,
            message: format!("message {n}"),
            sentiment_shift: shift,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_append_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .create_session(NegotiationSession::new("g-1", "Cold showers in block B"))
            .await
            .unwrap();
        store
            .append_round("g-1", round(1, AgentRole::Sentinel, 5))
            .await
            .unwrap();
        store
            .append_round("g-1", round(2, AgentRole::Governor, -2))
            .await
            .unwrap();

        let session = store.read_session("g-1").await.unwrap();
        assert_eq!(session.round_log.len(), 2);
        assert_eq!(session.sentinel_score, 5);
        assert_eq!(session.governor_score, -2);
        assert!(dir.path().join("g-1.json").exists());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .create_session(NegotiationSession::new("g-1", "text"))
            .await
            .unwrap();
        let err = store
            .create_session(NegotiationSession::new("g-1", "other"))
            .await
            .unwrap_err();
        assert_eq!(err, PersistenceError::AlreadyExists("g-1".into()));
    }

    #[tokio::test]
    async fn test_out_of_order_append_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .create_session(NegotiationSession::new("g-1", "text"))
            .await
            .unwrap();
        let before = std::fs::read_to_string(dir.path().join("g-1.json")).unwrap();

        let err = store
            .append_round("g-1", round(3, AgentRole::Sentinel, 1))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PersistenceError::RoundConflict {
                expected: 1,
                found: 3
            }
        );
        let after = std::fs::read_to_string(dir.path().join("g-1.json")).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_commit_final_persists_triad() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .create_session(NegotiationSession::new("g-1", "text"))
            .await
            .unwrap();
        store
            .commit_final(
                "g-1",
                FinalCommit {
                    budget_level: BudgetLevel::Restricted,
                    urgency_level: UrgencyLevel::Critical,
                    final_consensus: "Temporary lamps tonight".into(),
                },
            )
            .await
            .unwrap();

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        let session = reopened.read_session("g-1").await.unwrap();
        assert_eq!(session.budget_level, BudgetLevel::Restricted);
        assert_eq!(session.urgency_level, UrgencyLevel::Critical);
        assert_eq!(
            session.final_consensus.as_deref(),
            Some("Temporary lamps tonight")
        );
    }

    #[tokio::test]
    async fn test_missing_and_invalid_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.read_session("absent").await.unwrap_err(),
            PersistenceError::NotFound(_)
        ));
        assert!(matches!(
            store.read_session("../etc/passwd").await.unwrap_err(),
            PersistenceError::Backend(_)
        ));
    }

    #[tokio::test]
    async fn test_corrupted_record_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("g-1.json"), "{ not json").unwrap();
        assert!(matches!(
            store.read_session("g-1").await.unwrap_err(),
            PersistenceError::DeserializeFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_sessions_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        for id in ["beta", "alpha"] {
            store
                .create_session(NegotiationSession::new(id, "text"))
                .await
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        assert_eq!(store.list_sessions().await.unwrap(), vec!["alpha", "beta"]);
    }
}
