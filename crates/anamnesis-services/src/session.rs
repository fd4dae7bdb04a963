// ABOUTME: Work-session lifecycle and project-decision recording.
// ABOUTME: Grounded verbatim on original_source/anamnesis/services/session_manager.py.

use std::sync::Mutex;

use anamnesis_core::error::AnamnesisError;
use anamnesis_core::ids::generate_id;
use anamnesis_storage::entities::{ProjectDecision, WorkSession};
use anamnesis_storage::sync::SyncStorage;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub name: String,
    pub feature: String,
    pub files: Vec<String>,
    pub tasks: Vec<String>,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub decision_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionInfo {
    pub decision_id: String,
    pub decision: String,
    pub context: String,
    pub rationale: String,
    pub session_id: Option<String>,
    pub related_files: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Manages work-session lifecycle (start/end/update) and records project decisions
/// against the active or a named session. The single active session id is tracked
/// in-process; it does not survive a process restart (matches the Python original,
/// which keeps `_active_session_id` as plain instance state).
pub struct SessionManager<'a> {
    backend: &'a SyncStorage,
    active_session_id: Mutex<Option<String>>,
}

impl<'a> SessionManager<'a> {
    pub fn new(backend: &'a SyncStorage) -> Self {
        Self { backend, active_session_id: Mutex::new(None) }
    }

    pub fn active_session_id(&self) -> Option<String> {
        self.active_session_id.lock().unwrap().clone()
    }

    pub fn start_session(&self, name: &str, feature: &str, files: Vec<String>, tasks: Vec<String>, notes: &str) -> Result<SessionInfo, AnamnesisError> {
        let session_id = generate_id("session");
        let mut session = WorkSession::new(session_id.clone(), name.to_string(), feature.to_string());
        session.files = files;
        session.tasks = tasks;
        session.notes = notes.to_string();

        self.backend.save_session(&session)?;
        *self.active_session_id.lock().unwrap() = Some(session_id.clone());

        Ok(to_session_info(&session, 0))
    }

    pub fn end_session(&self, session_id: Option<&str>) -> Result<bool, AnamnesisError> {
        let target_id = match session_id.map(str::to_string).or_else(|| self.active_session_id()) {
            Some(id) => id,
            None => return Ok(false),
        };

        let mut session = match self.backend.get_session(&target_id)? {
            Some(s) => s,
            None => return Ok(false),
        };
        session.ended_at = Some(Utc::now());
        session.updated_at = session.ended_at.unwrap();
        self.backend.save_session(&session)?;

        let mut active = self.active_session_id.lock().unwrap();
        if active.as_deref() == Some(target_id.as_str()) {
            *active = None;
        }
        Ok(true)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>, AnamnesisError> {
        let session = match self.backend.get_session(session_id)? {
            Some(s) => s,
            None => return Ok(None),
        };
        let decision_count = self.backend.get_decisions_by_session(session_id)?.len();
        Ok(Some(to_session_info(&session, decision_count)))
    }

    pub fn get_active_sessions(&self) -> Result<Vec<SessionInfo>, AnamnesisError> {
        let sessions = self.backend.get_active_sessions()?;
        sessions
            .into_iter()
            .map(|s| {
                let decision_count = self.backend.get_decisions_by_session(&s.id)?.len();
                Ok(to_session_info(&s, decision_count))
            })
            .collect()
    }

    pub fn get_recent_sessions(&self, limit: i64) -> Result<Vec<SessionInfo>, AnamnesisError> {
        let sessions = self.backend.get_recent_sessions(limit)?;
        sessions
            .into_iter()
            .map(|s| {
                let decision_count = self.backend.get_decisions_by_session(&s.id)?.len();
                Ok(to_session_info(&s, decision_count))
            })
            .collect()
    }

    pub fn update_session(&self, session_id: Option<&str>, files: Option<Vec<String>>, tasks: Option<Vec<String>>, notes: Option<String>) -> Result<Option<SessionInfo>, AnamnesisError> {
        let target_id = match session_id.map(str::to_string).or_else(|| self.active_session_id()) {
            Some(id) => id,
            None => return Ok(None),
        };

        let mut session = match self.backend.get_session(&target_id)? {
            Some(s) => s,
            None => return Ok(None),
        };
        if let Some(files) = files {
            session.files = files;
        }
        if let Some(tasks) = tasks {
            session.tasks = tasks;
        }
        if let Some(notes) = notes {
            session.notes = notes;
        }
        session.updated_at = Utc::now();
        self.backend.save_session(&session)?;

        self.get_session(&target_id)
    }

    pub fn add_file_to_session(&self, file_path: &str, session_id: Option<&str>) -> Result<bool, AnamnesisError> {
        let target_id = match session_id.map(str::to_string).or_else(|| self.active_session_id()) {
            Some(id) => id,
            None => return Ok(false),
        };
        let mut session = match self.backend.get_session(&target_id)? {
            Some(s) => s,
            None => return Ok(false),
        };
        if !session.files.iter().any(|f| f == file_path) {
            session.files.push(file_path.to_string());
            session.updated_at = Utc::now();
            self.backend.save_session(&session)?;
        }
        Ok(true)
    }

    pub fn add_task_to_session(&self, task: &str, session_id: Option<&str>) -> Result<bool, AnamnesisError> {
        let target_id = match session_id.map(str::to_string).or_else(|| self.active_session_id()) {
            Some(id) => id,
            None => return Ok(false),
        };
        let mut session = match self.backend.get_session(&target_id)? {
            Some(s) => s,
            None => return Ok(false),
        };
        if !session.tasks.iter().any(|t| t == task) {
            session.tasks.push(task.to_string());
            session.updated_at = Utc::now();
            self.backend.save_session(&session)?;
        }
        Ok(true)
    }

    pub fn record_decision(
        &self,
        decision: &str,
        context: &str,
        rationale: &str,
        session_id: Option<&str>,
        related_files: Vec<String>,
        tags: Vec<String>,
    ) -> Result<DecisionInfo, AnamnesisError> {
        let decision_id = generate_id("decision");
        let target_session = session_id.map(str::to_string).or_else(|| self.active_session_id());

        let mut record = ProjectDecision::new(decision_id.clone(), decision.to_string(), target_session.clone());
        record.context = context.to_string();
        record.rationale = rationale.to_string();
        record.related_files = related_files;
        record.tags = tags;

        self.backend.save_decision(&record)?;
        Ok(to_decision_info(&record))
    }

    pub fn get_decision(&self, decision_id: &str) -> Result<Option<DecisionInfo>, AnamnesisError> {
        Ok(self.backend.get_decision(decision_id)?.map(|d| to_decision_info(&d)))
    }

    pub fn get_decisions_by_session(&self, session_id: &str) -> Result<Vec<DecisionInfo>, AnamnesisError> {
        Ok(self.backend.get_decisions_by_session(session_id)?.iter().map(to_decision_info).collect())
    }

    pub fn get_recent_decisions(&self, limit: i64) -> Result<Vec<DecisionInfo>, AnamnesisError> {
        Ok(self.backend.get_recent_decisions(limit)?.iter().map(to_decision_info).collect())
    }
}

fn to_session_info(session: &WorkSession, decision_count: usize) -> SessionInfo {
    SessionInfo {
        session_id: session.id.clone(),
        name: session.name.clone(),
        feature: session.feature.clone(),
        files: session.files.clone(),
        tasks: session.tasks.clone(),
        is_active: session.is_active(),
        started_at: session.started_at,
        updated_at: session.updated_at,
        ended_at: session.ended_at,
        decision_count,
    }
}

fn to_decision_info(decision: &ProjectDecision) -> DecisionInfo {
    DecisionInfo {
        decision_id: decision.id.clone(),
        decision: decision.decision.clone(),
        context: decision.context.clone(),
        rationale: decision.rationale.clone(),
        session_id: decision.session_id.clone(),
        related_files: decision.related_files.clone(),
        tags: decision.tags.clone(),
        created_at: decision.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_session_becomes_the_active_session() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        let manager = SessionManager::new(&storage);
        let session = manager.start_session("Add auth", "authentication", vec![], vec![], "").unwrap();
        assert!(session.is_active);
        assert_eq!(manager.active_session_id(), Some(session.session_id));
    }

    #[test]
    fn end_session_clears_active_id_and_marks_inactive() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        let manager = SessionManager::new(&storage);
        let session = manager.start_session("x", "y", vec![], vec![], "").unwrap();
        assert!(manager.end_session(Some(&session.session_id)).unwrap());
        assert_eq!(manager.active_session_id(), None);
        let fetched = manager.get_session(&session.session_id).unwrap().unwrap();
        assert!(!fetched.is_active);
    }

    #[test]
    fn record_decision_links_to_active_session_by_default() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        let manager = SessionManager::new(&storage);
        let session = manager.start_session("x", "y", vec![], vec![], "").unwrap();
        let decision = manager.record_decision("Use JWT", "auth flow", "stateless", None, vec![], vec![]).unwrap();
        assert_eq!(decision.session_id.as_deref(), Some(session.session_id.as_str()));
    }

    #[test]
    fn add_file_to_session_is_idempotent() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        let manager = SessionManager::new(&storage);
        let session = manager.start_session("x", "y", vec![], vec![], "").unwrap();
        manager.add_file_to_session("src/a.rs", Some(&session.session_id)).unwrap();
        manager.add_file_to_session("src/a.rs", Some(&session.session_id)).unwrap();
        let fetched = manager.get_session(&session.session_id).unwrap().unwrap();
        assert_eq!(fetched.files, vec!["src/a.rs".to_string()]);
    }

    #[test]
    fn decision_count_reflects_recorded_decisions() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        let manager = SessionManager::new(&storage);
        let session = manager.start_session("x", "y", vec![], vec![], "").unwrap();
        manager.record_decision("d1", "", "", Some(&session.session_id), vec![], vec![]).unwrap();
        manager.record_decision("d2", "", "", Some(&session.session_id), vec![], vec![]).unwrap();
        let fetched = manager.get_session(&session.session_id).unwrap().unwrap();
        assert_eq!(fetched.decision_count, 2);
    }

    #[test]
    fn ending_with_no_active_session_returns_false() {
        let storage = SyncStorage::connect_in_memory().unwrap();
        let manager = SessionManager::new(&storage);
        assert!(!manager.end_session(None).unwrap());
    }
}
