//! Browsing runs recorded with `--transcript-dir`

use agent_core::{AgentError, Result, Transcript, TranscriptId, TranscriptStore};

/// What to read back from the transcript store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryQuery {
    /// Summaries of the N most recent runs
    List(usize),

    /// One full transcript as JSON
    Show(String),
}

pub fn render(store: &dyn TranscriptStore, query: &HistoryQuery) -> Result<String> {
    match query {
        HistoryQuery::List(limit) => {
            let transcripts = store.list(*limit)?;
            if transcripts.is_empty() {
                return Ok("No transcripts recorded.".into());
            }
            Ok(transcripts.iter().map(summary_line).collect::<Vec<_>>().join("\n"))
        }
        HistoryQuery::Show(id) => {
            let id = TranscriptId::parse(id)?;
            let transcript = store
                .load(&id)?
                .ok_or_else(|| AgentError::Transcript(format!("no transcript with id '{id}'")))?;
            Ok(serde_json::to_string_pretty(&transcript)?)
        }
    }
}

fn summary_line(t: &Transcript) -> String {
    let outcome = t
        .termination_reason
        .map_or_else(|| "not-started".to_string(), |reason| reason.to_string());
    format!(
        "{}  {}  {}/{}  {}  iterations={}",
        t.id,
        t.finished_at.format("%Y-%m-%d %H:%M:%S"),
        t.provider,
        t.model,
        outcome,
        t.iterations,
    )
}
