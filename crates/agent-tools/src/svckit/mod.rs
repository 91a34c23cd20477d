//! Service Kit - Agent Tools
//!
//! Tools that implement `agent_core::Tool`.

mod ollama_generate;
mod query;
mod schema;

pub use ollama_generate::{DEFAULT_OLLAMA_URL, OllamaGenerateTool};
pub use query::SqlQueryTool;
pub use schema::{DescribeTableTool, ListTablesTool, SampleTableTool};
