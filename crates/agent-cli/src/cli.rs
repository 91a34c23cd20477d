//! Command-line arguments

use std::path::PathBuf;

use agent_tools::svckit::DEFAULT_OLLAMA_URL;
use clap::{Parser, ValueEnum};

use crate::history::HistoryQuery;

/// Backend that drives the agent loop
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    Anthropic,
    #[value(name = "openai")]
    OpenAi,
    Ollama,
    Gemini,
}

impl ProviderKind {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::OpenAi => "gpt-4o-mini",
            Self::Ollama => "llama3.1",
            Self::Gemini => "gemini-2.0-flash-001",
        }
    }
}

/// Tool-calling agent: answers a prompt with an LLM that can call local tools
#[derive(Debug, Parser)]
#[command(name = "tool-agent", version, about)]
pub struct Cli {
    /// The user's request
    #[arg(short, long, required_unless_present_any = ["list_transcripts", "show_transcript"])]
    pub prompt: Option<String>,

    /// LLM backend
    #[arg(long, value_enum, default_value_t = ProviderKind::Anthropic)]
    pub provider: ProviderKind,

    /// Model identifier (defaults per provider)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum number of agent loops
    #[arg(short, long, default_value_t = 7, value_parser = parse_compute)]
    pub compute: usize,

    /// Maximum tokens per response
    #[arg(long, default_value_t = 2048)]
    pub max_tokens: u32,

    #[arg(long)]
    pub temperature: Option<f32>,

    /// DuckDB database file; enables the SQL exploration tools
    #[arg(short, long)]
    pub db: Option<PathBuf>,

    /// Ollama server for the delegation tool (and the ollama provider)
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_base_url: String,

    /// Do not offer the Ollama delegation tool
    #[arg(long)]
    pub no_delegate: bool,

    /// Override the system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Write a JSON transcript of the run into this directory
    #[arg(long)]
    pub transcript_dir: Option<PathBuf>,

    /// List the N most recent transcripts in --transcript-dir and exit
    #[arg(long, value_name = "N", requires = "transcript_dir", conflicts_with_all = ["prompt", "show_transcript"])]
    pub list_transcripts: Option<usize>,

    /// Print one transcript from --transcript-dir and exit
    #[arg(long, value_name = "ID", requires = "transcript_dir", conflicts_with = "prompt")]
    pub show_transcript: Option<String>,
}

fn parse_compute(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Cli {
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn delegate(&self) -> bool {
        !self.no_delegate
    }

    /// Set when the invocation reads past runs instead of starting one
    pub fn history_query(&self) -> Option<HistoryQuery> {
        if let Some(limit) = self.list_transcripts {
            return Some(HistoryQuery::List(limit));
        }
        self.show_transcript.clone().map(HistoryQuery::Show)
    }

    /// System prompt for the enabled tool sets
    pub fn resolved_system_prompt(&self) -> Option<String> {
        if let Some(prompt) = &self.system_prompt {
            return Some(prompt.clone());
        }
        let mut parts = Vec::new();
        if self.db.is_some() {
            parts.push(agent_tools::DUCKDB_PROMPT);
        }
        if self.delegate() {
            parts.push(agent_tools::DELEGATOR_PROMPT);
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tool-agent").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&["-p", "hello"]);
        assert_eq!(cli.provider, ProviderKind::Anthropic);
        assert_eq!(cli.model(), "claude-3-haiku-20240307");
        assert_eq!(cli.compute, 7);
        assert_eq!(cli.max_tokens, 2048);
        assert!(cli.delegate());
        assert!(cli.db.is_none());
    }

    #[test]
    fn provider_names() {
        assert_eq!(parse(&["-p", "x", "--provider", "openai"]).provider, ProviderKind::OpenAi);
        let gemini = parse(&["-p", "x", "--provider", "gemini"]);
        assert_eq!(gemini.model(), "gemini-2.0-flash-001");
        let ollama = parse(&["-p", "x", "--provider", "ollama", "-m", "qwen2.5"]);
        assert_eq!(ollama.model(), "qwen2.5");
    }

    #[test]
    fn compute_must_be_positive() {
        let err = Cli::try_parse_from(["tool-agent", "-p", "x", "-c", "0"]).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
        assert_eq!(parse(&["-p", "x", "-c", "3"]).compute, 3);
    }

    #[test]
    fn prompt_is_required() {
        assert!(Cli::try_parse_from(["tool-agent"]).is_err());
    }

    #[test]
    fn history_flags_replace_the_prompt() {
        let list = parse(&["--transcript-dir", "runs", "--list-transcripts", "5"]);
        assert!(list.prompt.is_none());
        assert_eq!(list.history_query(), Some(HistoryQuery::List(5)));

        let show = parse(&["--transcript-dir", "runs", "--show-transcript", "abc"]);
        assert_eq!(show.history_query(), Some(HistoryQuery::Show("abc".into())));

        assert_eq!(parse(&["-p", "x"]).history_query(), None);
    }

    #[test]
    fn history_flags_need_a_transcript_dir() {
        assert!(Cli::try_parse_from(["tool-agent", "--list-transcripts", "5"]).is_err());
        assert!(Cli::try_parse_from(["tool-agent", "-p", "x", "--transcript-dir", "runs", "--list-transcripts", "5"]).is_err());
    }

    #[test]
    fn system_prompt_follows_enabled_tools() {
        let both = parse(&["-p", "x", "-d", "data.db"]).resolved_system_prompt().unwrap();
        assert!(both.contains("DuckDB"));
        assert!(both.contains("run_ollama_generate"));

        let none = parse(&["-p", "x", "--no-delegate"]);
        assert!(none.resolved_system_prompt().is_none());

        let custom = parse(&["-p", "x", "--system-prompt", "Be brief."]);
        assert_eq!(custom.resolved_system_prompt().as_deref(), Some("Be brief."));
    }
}
