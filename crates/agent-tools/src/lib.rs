//! # agent-tools
//!
//! Tools for the agent loop.
//!
//! ## Tool sets
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Delegation                                              │
//! │    run_ollama_generate ──▶ local Ollama /api/generate    │
//! ├──────────────────────────────────────────────────────────┤
//! │  DuckDB exploration (SqlRunner: duckdb CLI or mock)      │
//! │    list_tables ─▶ describe_table ─▶ sample_table         │
//! │        ─▶ run_test_sql_query ─▶ run_final_sql_query      │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod sql;
pub mod svckit;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use error::{Result, ToolsError};
pub use sql::{DuckDbCli, MockSqlRunner, SqlRunner};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        DescribeTableTool, ListTablesTool, OllamaGenerateTool, SampleTableTool, SqlQueryTool,
    };
}

/// Register `run_ollama_generate` against the Ollama server at `base_url`
pub fn register_delegator_tools(registry: &mut ToolRegistry, base_url: &str) -> agent_core::Result<()> {
    registry.register_tool(svckit::OllamaGenerateTool::new(base_url)?)
}

/// Register the five DuckDB tools over one runner
pub fn register_duckdb_tools(registry: &mut ToolRegistry, runner: Arc<dyn SqlRunner>) -> agent_core::Result<()> {
    registry.register_tool(svckit::ListTablesTool::new(runner.clone()))?;
    registry.register_tool(svckit::DescribeTableTool::new(runner.clone()))?;
    registry.register_tool(svckit::SampleTableTool::new(runner.clone()))?;
    registry.register_tool(svckit::SqlQueryTool::test(runner.clone()))?;
    registry.register_tool(svckit::SqlQueryTool::final_query(runner))?;
    Ok(())
}

/// System prompt for the delegating assistant
pub const DELEGATOR_PROMPT: &str = r#"You are an assistant that answers user requests directly or by delegating sub-tasks to a local Ollama model.

## When to Delegate

Use `run_ollama_generate` when:
- The user asks for a local model or names one (e.g. "llama3", "mistral", "codellama")
- The data should stay on the user's machine
- A fine-tuned local model is better suited to the task

Answer directly when you can do so well without a tool.

## Using `run_ollama_generate`

- `model_name` (required): exact model name available in the local Ollama instance. Ask the user if it is unclear.
- `prompt` (required): a focused prompt for the sub-task.
- `system_prompt` (optional): guidance for the local model.
- `context_window` (optional): only when the user asks for a specific size.

## After Delegating

- Do not just echo the tool output. Quote or summarize it, then add your own analysis.
- If the tool returns an error, explain it to the user and do not retry with identical parameters.
- Say which model you are about to use before calling the tool."#;

/// System prompt for the DuckDB query agent
pub const DUCKDB_PROMPT: &str = r#"You are an expert at writing precise DuckDB SQL queries that answer exactly what the user asks.

## Workflow

1. `list_tables` to see what is available
2. `describe_table` to learn the columns of relevant tables
3. `sample_table` to see real data patterns (3-5 rows)
4. `run_test_sql_query` to validate a query; if it errors or misses the request, fix it or try another approach
5. `run_final_sql_query` once you are confident the query is right

## Rules

- Every tool call takes a `reasoning` parameter: say why you are calling it.
- Specify every parameter for each tool call.
- Be thorough but efficient with tool usage.
- After the final query, answer the user with the results and a short explanation of the query."#;
