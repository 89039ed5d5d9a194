use anyhow::Context;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::estimator::MealEstimator;
use crate::error::{AssistantError, Result};
use crate::llm::ToolDefinition;

/// Tools the model is allowed to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    GenerateLogEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateLogEntryArgs {
    pub meal_id: String,
    pub notes: String,
}

/// A tool call whose name resolved and whose arguments matched the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    GenerateLogEntry(GenerateLogEntryArgs),
}

impl Tool {
    pub const ALL: [Tool; 1] = [Tool::GenerateLogEntry];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::GenerateLogEntry => "generate_log_entry",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| AssistantError::UnregisteredTool(name.to_string()))
    }

    pub fn definition(&self) -> ToolDefinition {
        match self {
            Tool::GenerateLogEntry => ToolDefinition {
                name: self.name().into(),
                description: "Based on the description of a meal that has been eaten, generate \
                              nutrition estimates for that meal and save to the database"
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "meal_id": {
                            "type": "string",
                            "description": "Plaintext 2-3 word description of the meal based on time of day and what was eaten"
                        },
                        "notes": {
                            "type": "string",
                            "description": "Notes about the meal, such as what was eaten, where it was eaten, and who it was eaten with"
                        }
                    },
                    "required": ["meal_id", "notes"],
                    "additionalProperties": false
                }),
            },
        }
    }

    pub fn parse_arguments(&self, raw: &str) -> Result<ToolInvocation> {
        let invalid = |reason: String| AssistantError::ToolArguments {
            tool: self.name().to_string(),
            reason,
        };
        match self {
            Tool::GenerateLogEntry => {
                let args: GenerateLogEntryArgs =
                    serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
                if args.meal_id.trim().is_empty() {
                    return Err(invalid("meal_id is empty".into()));
                }
                Ok(ToolInvocation::GenerateLogEntry(args))
            }
        }
    }
}

/// Definitions of every registered tool, in declaration order.
pub fn catalog() -> Vec<ToolDefinition> {
    Tool::ALL.iter().map(Tool::definition).collect()
}

/// Binds each tool to its handler.
pub struct ToolRegistry {
    estimator: MealEstimator,
}

impl ToolRegistry {
    pub fn new(estimator: MealEstimator) -> Self {
        Self { estimator }
    }

    /// Runs the invocation and returns its result serialized as JSON text.
    pub async fn execute(&self, invocation: ToolInvocation) -> Result<String> {
        match invocation {
            ToolInvocation::GenerateLogEntry(args) => {
                debug!(meal_id = %args.meal_id, "generate_log_entry called");
                let entry = self
                    .estimator
                    .estimate(&args.meal_id, Some(&args.notes), None)
                    .await?;
                let content = serde_json::to_string_pretty(&entry).context("serialize log entry")?;
                Ok(content)
            }
        }
    }
}
