//! Query tools: `run_test_sql_query` and `run_final_sql_query`

use std::sync::Arc;

use agent_core::{ParamType, ParameterSpec, Result as CoreResult, Tool, ToolArgs, ToolHandler, ToolSpec};
use async_trait::async_trait;

use crate::error::ToolsError;
use crate::sql::SqlRunner;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    /// Results only go back to the agent
    Test,
    /// Results are the answer the user sees
    Final,
}

/// Runs a SQL query against the database
pub struct SqlQueryTool {
    runner: Arc<dyn SqlRunner>,
    stage: Stage,
}

impl SqlQueryTool {
    /// `run_test_sql_query`
    pub fn test(runner: Arc<dyn SqlRunner>) -> Self {
        Self {
            runner,
            stage: Stage::Test,
        }
    }

    /// `run_final_sql_query`
    pub fn final_query(runner: Arc<dyn SqlRunner>) -> Self {
        Self {
            runner,
            stage: Stage::Final,
        }
    }
}

#[async_trait]
impl ToolHandler for SqlQueryTool {
    async fn invoke(&self, args: ToolArgs<'_>) -> CoreResult<String> {
        let sql = args.str("sql_query")?.trim();
        if sql.is_empty() {
            return Err(ToolsError::InvalidArgument("sql_query is empty".into()).into());
        }
        match self.stage {
            Stage::Test => tracing::info!(reasoning = args.reasoning(), query = sql, "Test query"),
            Stage::Final => tracing::info!(reasoning = args.reasoning(), query = sql, "Final query"),
        }
        Ok(self.runner.execute(sql).await?)
    }
}

impl Tool for SqlQueryTool {
    fn spec(&self) -> ToolSpec {
        match self.stage {
            Stage::Test => ToolSpec::new(
                "run_test_sql_query",
                "Tests a SQL query and returns results (only visible to agent)",
            )
            .param(ParameterSpec::required(
                "reasoning",
                ParamType::String,
                "Why we're testing this specific query",
            ))
            .param(ParameterSpec::required("sql_query", ParamType::String, "The SQL query to test")),
            Stage::Final => ToolSpec::new(
                "run_final_sql_query",
                "Runs the final validated SQL query and shows results to user",
            )
            .param(ParameterSpec::required(
                "reasoning",
                ParamType::String,
                "Final explanation of how query satisfies user request",
            ))
            .param(ParameterSpec::required(
                "sql_query",
                ParamType::String,
                "The validated SQL query to run",
            )),
        }
    }
}
