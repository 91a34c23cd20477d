//! Tool Dispatcher
//!
//! Turns a [`ToolCallRequest`] into a [`ToolCallResult`]. Every failure a
//! single call can hit (unknown tool, undecodable or invalid arguments,
//! handler error or panic) becomes an error-flagged result here; nothing
//! escapes to the agent loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::error::AgentError;
use crate::message::{ToolCallRequest, ToolCallResult};
use crate::tool::{ToolArgs, ToolRegistry};

/// Executes tool calls against a registry
#[derive(Clone, Debug)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one call
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolCallResult {
        if let Some(bad) = &call.malformed_arguments {
            let err = AgentError::MalformedToolArguments {
                tool: call.tool_name.clone(),
                reason: bad.reason.clone(),
            };
            tracing::warn!(tool = %call.tool_name, id = %call.id, raw = %bad.raw, "Malformed tool arguments");
            return ToolCallResult::error(&call.id, err.to_string());
        }

        let entry = match self.registry.resolve(&call.tool_name) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(tool = %call.tool_name, id = %call.id, "Unknown tool requested");
                return ToolCallResult::error(&call.id, err.to_string());
            }
        };

        if let Err(err) = entry.spec.validate(&call.arguments) {
            tracing::warn!(tool = %call.tool_name, error = %err, "Tool arguments rejected");
            return ToolCallResult::error(&call.id, err.to_string());
        }

        tracing::debug!(
            tool = %call.tool_name,
            id = %call.id,
            arguments = %serde_json::Value::Object(call.arguments.clone()),
            "Executing tool"
        );

        let invocation = entry.handler.invoke(ToolArgs::new(&call.arguments));
        match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(output)) => ToolCallResult::success(&call.id, output),
            Ok(Err(err)) => {
                tracing::warn!(tool = %call.tool_name, error = %err, "Tool failed");
                ToolCallResult::error(&call.id, format!("Error executing {}: {err}", call.tool_name))
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".into());
                tracing::warn!(tool = %call.tool_name, %detail, "Tool panicked");
                ToolCallResult::error(
                    &call.id,
                    format!("Error executing {} internally: {detail}", call.tool_name),
                )
            }
        }
    }

    /// Execute calls one after another, results in request order
    pub async fn execute_all<'a, I>(&self, calls: I) -> Vec<ToolCallResult>
    where
        I: IntoIterator<Item = &'a ToolCallRequest>,
    {
        let mut results = Vec::new();
        for call in calls {
            results.push(self.execute(call).await);
        }
        results
    }
}
