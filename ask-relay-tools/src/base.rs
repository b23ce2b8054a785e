//! Base trait for tools

use async_trait::async_trait;
use serde_json::Value;

/// Trait for tools the agent backend can invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// Get the tool parameters schema (JSON Schema format)
    fn parameters(&self) -> Value;

    /// Execute the tool with arguments
    async fn execute(&self, args: Value) -> Result<String>;

    /// Check top-level shape and required fields against the schema
    fn validate_params(&self, params: &Value) -> Vec<String> {
        let Some(params_obj) = params.as_object() else {
            return vec!["Parameters must be an object".to_string()];
        };

        let schema = self.parameters();
        schema
            .get("required")
            .and_then(|r| r.as_array())
            .into_iter()
            .flatten()
            .filter_map(|field| field.as_str())
            .filter(|field| !params_obj.contains_key(*field))
            .map(|field| format!("Missing required field: {}", field))
            .collect()
    }

    /// Convert tool to OpenAI function schema format
    fn to_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }
}

/// Tool errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("User declined: {0}")]
    Declined(String),

    #[error(transparent)]
    Relay(#[from] ask_relay_core::Error),
}

pub type Result<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text back"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value) -> Result<String> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_validate_params() {
        let tool = EchoTool;
        assert!(tool.validate_params(&json!({"text": "hi"})).is_empty());
        assert_eq!(
            tool.validate_params(&json!({})),
            vec!["Missing required field: text".to_string()]
        );
        assert_eq!(
            tool.validate_params(&json!("nope")),
            vec!["Parameters must be an object".to_string()]
        );
    }

    #[test]
    fn test_to_schema() {
        let schema = EchoTool.to_schema();
        assert_eq!(schema["function"]["name"], "echo");
        assert_eq!(schema["function"]["parameters"]["required"][0], "text");
    }

    #[tokio::test]
    async fn test_execute() {
        assert_eq!(EchoTool.execute(json!({"text": "hi"})).await.unwrap(), "hi");
    }
}
