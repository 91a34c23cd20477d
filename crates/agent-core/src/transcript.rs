//! Transcript Storage
//!
//! Snapshots of a finished run (turns plus how the run ended), written after
//! the loop terminates. The loop itself never persists anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Turn};
use crate::reasoning::{RunOutcome, TerminationReason};

/// Unique transcript identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptId(String);

impl TranscriptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a user-supplied id; only UUIDs name transcript files
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(|id| Self(id.to_string()))
            .map_err(|_| AgentError::Transcript(format!("'{s}' is not a transcript id")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TranscriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recorded agent run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transcript {
    pub id: TranscriptId,

    /// Backend name
    pub provider: String,

    /// Model identifier
    pub model: String,

    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// How the run ended; `None` if it failed before the loop started
    pub termination_reason: Option<TerminationReason>,

    /// Iterations used
    pub iterations: usize,

    /// Final answer, when one was delivered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    /// Error text for fatal terminations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub turns: Vec<Turn>,
}

impl Transcript {
    /// Record a run from its conversation and result
    pub fn record(
        provider: impl Into<String>,
        model: impl Into<String>,
        started_at: DateTime<Utc>,
        conversation: &Conversation,
        outcome: &Result<RunOutcome>,
    ) -> Self {
        let (termination_reason, iterations, answer, error) = match outcome {
            Ok(run) => (run.reason(), run.state.iteration_count, run.answer.clone(), None),
            Err(e) => {
                let iterations = match e {
                    AgentError::Provider { iteration, .. } => *iteration,
                    AgentError::BudgetExceeded { max_iterations } => *max_iterations,
                    _ => 0,
                };
                (e.termination_reason(), iterations, None, Some(e.to_string()))
            }
        };

        Self {
            id: TranscriptId::new(),
            provider: provider.into(),
            model: model.into(),
            created_at: started_at,
            finished_at: Utc::now(),
            termination_reason,
            iterations,
            answer,
            error,
            turns: conversation.snapshot().to_vec(),
        }
    }
}

/// Transcript store trait for persistence
pub trait TranscriptStore: Send + Sync {
    /// Save a transcript
    fn save(&self, transcript: &Transcript) -> Result<()>;

    /// Load a transcript by ID
    fn load(&self, id: &TranscriptId) -> Result<Option<Transcript>>;

    /// Most recent transcripts first
    fn list(&self, limit: usize) -> Result<Vec<Transcript>>;
}

/// In-memory transcript store (for testing)
#[derive(Default)]
pub struct MemoryTranscriptStore {
    transcripts: RwLock<HashMap<TranscriptId, Transcript>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AgentError {
    AgentError::Transcript("transcript store lock poisoned".into())
}

fn newest_first(mut transcripts: Vec<Transcript>, limit: usize) -> Vec<Transcript> {
    transcripts.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
    transcripts.truncate(limit);
    transcripts
}

impl TranscriptStore for MemoryTranscriptStore {
    fn save(&self, transcript: &Transcript) -> Result<()> {
        let mut transcripts = self.transcripts.write().map_err(poisoned)?;
        transcripts.insert(transcript.id.clone(), transcript.clone());
        Ok(())
    }

    fn load(&self, id: &TranscriptId) -> Result<Option<Transcript>> {
        let transcripts = self.transcripts.read().map_err(poisoned)?;
        Ok(transcripts.get(id).cloned())
    }

    fn list(&self, limit: usize) -> Result<Vec<Transcript>> {
        let transcripts = self.transcripts.read().map_err(poisoned)?;
        Ok(newest_first(transcripts.values().cloned().collect(), limit))
    }
}

/// One pretty-printed `<id>.json` file per transcript
pub struct FileTranscriptStore {
    dir: PathBuf,
}

impl FileTranscriptStore {
    /// Use `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, id: &TranscriptId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read(path: &Path) -> Result<Transcript> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl TranscriptStore for FileTranscriptStore {
    fn save(&self, transcript: &Transcript) -> Result<()> {
        let path = self.path_for(&transcript.id);
        let json = serde_json::to_vec_pretty(transcript)?;
        std::fs::write(&path, json)?;
        tracing::info!(path = %path.display(), "Wrote transcript");
        Ok(())
    }

    fn load(&self, id: &TranscriptId) -> Result<Option<Transcript>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    fn list(&self, limit: usize) -> Result<Vec<Transcript>> {
        let mut transcripts = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::read(&path) {
                    Ok(t) => transcripts.push(t),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable transcript"),
                }
            }
        }
        Ok(newest_first(transcripts, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::message::ContentBlock;
    use crate::reasoning::LoopState;

    fn finished_run() -> (Conversation, Result<RunOutcome>) {
        let mut conv = Conversation::with_user_prompt("What is 2+2?");
        conv.append(Turn::assistant(vec![ContentBlock::text("4")]));
        let mut state = LoopState::new(3);
        state.iteration_count = 1;
        state.terminated = true;
        state.termination_reason = Some(TerminationReason::FinalTextDelivered);
        (conv, Ok(RunOutcome { state, answer: Some("4".into()) }))
    }

    #[test]
    fn record_successful_run() {
        let (conv, outcome) = finished_run();
        let t = Transcript::record("anthropic", "claude", Utc::now(), &conv, &outcome);
        assert_eq!(t.termination_reason, Some(TerminationReason::FinalTextDelivered));
        assert_eq!(t.iterations, 1);
        assert_eq!(t.answer.as_deref(), Some("4"));
        assert_eq!(t.turns.len(), 2);
    }

    #[test]
    fn record_failed_run_keeps_partial_history() {
        let conv = Conversation::with_user_prompt("hello");
        let outcome: Result<RunOutcome> = Err(AgentError::Provider {
            iteration: 2,
            source: NetworkError::timeout("120s"),
        });
        let t = Transcript::record("openai", "gpt", Utc::now(), &conv, &outcome);
        assert_eq!(t.termination_reason, Some(TerminationReason::ProviderError));
        assert_eq!(t.iterations, 2);
        assert!(t.error.unwrap().contains("timeout"));
        assert_eq!(t.turns.len(), 1);
    }

    #[test]
    fn transcript_id_rejects_paths() {
        assert!(TranscriptId::parse("../secrets").is_err());
        assert!(TranscriptId::parse("").is_err());
        let id = TranscriptId::new();
        assert_eq!(TranscriptId::parse(&format!(" {id} ")).unwrap(), id);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTranscriptStore::new();
        let (conv, outcome) = finished_run();
        let t = Transcript::record("anthropic", "claude", Utc::now(), &conv, &outcome);
        let id = t.id.clone();

        store.save(&t).unwrap();

        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded.unwrap().id, id);
        assert_eq!(store.list(10).unwrap().len(), 1);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTranscriptStore::new(dir.path().join("runs")).unwrap();
        let (conv, outcome) = finished_run();
        let t = Transcript::record("gemini", "gemini-2.0-flash-001", Utc::now(), &conv, &outcome);

        store.save(&t).unwrap();
        assert!(store.path_for(&t.id).exists());

        let loaded = store.load(&t.id).unwrap().unwrap();
        assert_eq!(loaded.turns, t.turns);
        assert_eq!(loaded.termination_reason, t.termination_reason);
        assert!(store.load(&TranscriptId::new()).unwrap().is_none());

        let by_text = TranscriptId::parse(&t.id.as_str().to_uppercase()).unwrap();
        assert_eq!(store.load(&by_text).unwrap().unwrap().id, t.id);
        assert_eq!(store.list(5).unwrap().len(), 1);
    }
}
