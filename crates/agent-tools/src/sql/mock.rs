//! Mock SQL Runner
//!
//! For tests and demos. Answers commands from a fixed table of responses and
//! records everything it was asked to run.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::SqlRunner;
use crate::error::{Result, ToolsError};

/// Mock runner with canned outputs
#[derive(Default)]
pub struct MockSqlRunner {
    responses: HashMap<String, String>,
    executed: Mutex<Vec<String>>,
}

impl MockSqlRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `output`
    pub fn with_response(mut self, command: impl Into<String>, output: impl Into<String>) -> Self {
        self.responses.insert(command.into(), output.into());
        self
    }

    /// Commands executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SqlRunner for MockSqlRunner {
    async fn execute(&self, command: &str) -> Result<String> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(command.to_string());
        }
        self.responses
            .get(command)
            .cloned()
            .ok_or_else(|| ToolsError::QueryFailed {
                status: "exit status: 1".into(),
                stderr: format!("Catalog Error: no canned response for {command:?}"),
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
