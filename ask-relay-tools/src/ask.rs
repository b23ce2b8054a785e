//! AskUserQuestion tool
//!
//! The tool parks the agent's call until a human answers: it registers a
//! pending request, hands the questions to the prompt callback, and waits
//! for the matching permission response.

use async_trait::async_trait;
use ask_relay_core::bus::{PermissionResponse, UpstreamBus};
use ask_relay_core::config::QuestionsConfig;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::answer::render_answers;
use crate::base::{Result, Tool, ToolError};
use crate::permission::PermissionReason;
use crate::question::{AskUserQuestionInput, Question};

/// Tool name the agent backend invokes
pub const ASK_USER_QUESTION: &str = "AskUserQuestion";

/// Questions waiting for a human
#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuestion {
    /// Id the permission response must carry
    pub request_id: String,
    pub questions: Vec<Question>,
}

/// Callback that shows a pending question to the user
type PromptCallback =
    Arc<dyn Fn(PendingQuestion) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Open requests and their responders
#[derive(Clone, Default)]
pub struct PendingQuestions {
    waiting: Arc<Mutex<HashMap<String, oneshot::Sender<PermissionResponse>>>>,
    outbound: Option<UpstreamBus>,
}

impl PendingQuestions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also publish every resolved response on the bus's outbound queue
    pub fn with_bus(bus: UpstreamBus) -> Self {
        Self {
            waiting: Arc::default(),
            outbound: Some(bus),
        }
    }

    fn register(&self, request_id: &str) -> oneshot::Receiver<PermissionResponse> {
        let (tx, rx) = oneshot::channel();
        self.waiting.lock().insert(request_id.to_string(), tx);
        rx
    }

    /// Deliver a response to the request it names.
    ///
    /// Forwarding to the outbound bus is best effort; the waiting caller
    /// gets the answer even when the bus is gone.
    pub fn resolve(&self, response: PermissionResponse) -> ask_relay_core::Result<()> {
        let tx = self
            .waiting
            .lock()
            .remove(&response.request_id)
            .ok_or_else(|| ask_relay_core::Error::NotFound(response.request_id.clone()))?;

        if let Some(bus) = &self.outbound {
            if let Err(e) = bus.publish_outbound(response.clone()) {
                warn!(request_id = %response.request_id, "Could not forward response: {}", e);
            }
        }
        if tx.send(response).is_err() {
            warn!("Question was resolved after its caller went away");
        }
        Ok(())
    }

    /// Drop a request without answering. Returns whether it existed.
    pub fn cancel(&self, request_id: &str) -> bool {
        self.waiting.lock().remove(request_id).is_some()
    }

    /// Ids still waiting
    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.waiting.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.waiting.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.lock().is_empty()
    }
}

/// Removes a request from the registry when its caller stops waiting
struct PendingGuard<'a> {
    pending: &'a PendingQuestions,
    request_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.pending.cancel(&self.request_id) {
            debug!(request_id = %self.request_id, "Dropped unanswered question");
        }
    }
}

/// Tool that relays structured questions to the user
pub struct AskUserQuestionTool {
    pending: PendingQuestions,
    limits: QuestionsConfig,
    prompt: Option<PromptCallback>,
}

impl AskUserQuestionTool {
    /// Create the tool
    pub fn new(pending: PendingQuestions, limits: QuestionsConfig) -> Self {
        Self {
            pending,
            limits,
            prompt: None,
        }
    }

    /// Set the callback that presents questions to the user
    pub fn set_prompt_callback<F, Fut>(&mut self, callback: F)
    where
        F: Fn(PendingQuestion) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.prompt = Some(Arc::new(move |pending| Box::pin(callback(pending))));
    }

    /// Registry of open requests
    pub fn pending(&self) -> &PendingQuestions {
        &self.pending
    }
}

#[async_trait]
impl Tool for AskUserQuestionTool {
    fn name(&self) -> &str {
        ASK_USER_QUESTION
    }

    fn description(&self) -> &str {
        "Ask the user one or more multiple-choice questions and wait for the answers."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "questions": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": self.limits.max_questions,
                    "items": {
                        "type": "object",
                        "properties": {
                            "question": {"type": "string"},
                            "header": {"type": "string", "description": "Short label"},
                            "options": {
                                "type": "array",
                                "minItems": 2,
                                "maxItems": self.limits.max_options,
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "label": {"type": "string"},
                                        "description": {"type": "string"}
                                    },
                                    "required": ["label"]
                                }
                            },
                            "multiSelect": {"type": "boolean"}
                        },
                        "required": ["question", "options"]
                    }
                }
            },
            "required": ["questions"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let errors = self.validate_params(&args);
        if !errors.is_empty() {
            return Err(ToolError::InvalidParams(errors.join("; ")));
        }
        let input = AskUserQuestionInput::parse(&args, &self.limits)?;

        let prompt = self.prompt.clone().ok_or_else(|| {
            ToolError::ExecutionFailed("No prompt handler is attached".to_string())
        })?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let response_rx = self.pending.register(&request_id);
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id: request_id.clone(),
        };
        info!(request_id = %request_id, count = input.questions.len(), "Asking user");

        prompt(PendingQuestion {
            request_id: request_id.clone(),
            questions: input.questions.clone(),
        })
        .await;

        let response = response_rx.await.map_err(|_| {
            ToolError::ExecutionFailed(format!("Question {} was dismissed", request_id))
        })?;
        debug!(request_id = %request_id, allow = response.allow, "Question answered");

        if !response.allow {
            return Err(ToolError::Declined(
                response
                    .reason
                    .unwrap_or_else(|| "no reason given".to_string()),
            ));
        }

        let answers = response
            .reason
            .map(|raw| PermissionReason::parse(&raw).into_answers(&input.questions))
            .unwrap_or_default();
        if answers.is_empty() {
            return Ok("User did not select an answer".to_string());
        }
        Ok(render_answers(&input.questions, &answers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{AnswerSheet, Selection};
    use crate::permission::answer_response;

    fn auth_args() -> Value {
        json!({
            "questions": [{
                "question": "Which auth method?",
                "header": "Auth method",
                "options": [{"label": "OAuth 2.0"}, {"label": "JWT"}, {"label": "API Key"}]
            }]
        })
    }

    fn tool_answering(pending: &PendingQuestions, pick: Option<usize>) -> AskUserQuestionTool {
        let mut tool = AskUserQuestionTool::new(pending.clone(), QuestionsConfig::default());
        let responder = pending.clone();
        tool.set_prompt_callback(move |question: PendingQuestion| {
            let responder = responder.clone();
            async move {
                let response = match pick {
                    Some(index) => {
                        let mut sheet = AnswerSheet::new(question.questions.len());
                        sheet
                            .select(&question.questions, 0, Selection::Option(index))
                            .unwrap();
                        answer_response(&question.request_id, &question.questions, &sheet, "Other")
                    }
                    None => PermissionResponse::deny(&question.request_id).with_reason("later"),
                };
                responder.resolve(response).unwrap();
            }
        });
        tool
    }

    #[tokio::test]
    async fn test_answered_question() {
        let pending = PendingQuestions::new();
        let tool = tool_answering(&pending, Some(1));

        let result = tool.execute(auth_args()).await.unwrap();
        assert_eq!(result, "Auth method: JWT");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_declined_question() {
        let pending = PendingQuestions::new();
        let tool = tool_answering(&pending, None);

        let err = tool.execute(auth_args()).await.unwrap_err();
        assert!(matches!(err, ToolError::Declined(reason) if reason == "later"));
    }

    #[tokio::test]
    async fn test_plain_text_reason() {
        let pending = PendingQuestions::new();
        let mut tool = AskUserQuestionTool::new(pending.clone(), QuestionsConfig::default());
        let responder = pending.clone();
        tool.set_prompt_callback(move |question: PendingQuestion| {
            let responder = responder.clone();
            async move {
                responder
                    .resolve(
                        PermissionResponse::allow(question.request_id).with_reason("Use SAML"),
                    )
                    .unwrap();
            }
        });

        let result = tool.execute(auth_args()).await.unwrap();
        assert_eq!(result, "Auth method: Use SAML");
    }

    #[tokio::test]
    async fn test_dismissed_question() {
        let pending = PendingQuestions::new();
        let mut tool = AskUserQuestionTool::new(pending.clone(), QuestionsConfig::default());
        let canceller = pending.clone();
        tool.set_prompt_callback(move |question: PendingQuestion| {
            let canceller = canceller.clone();
            async move {
                assert!(canceller.cancel(&question.request_id));
            }
        });

        let err = tool.execute(auth_args()).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn test_invalid_input_registers_nothing() {
        let pending = PendingQuestions::new();
        let tool = tool_answering(&pending, Some(0));

        let err = tool.execute(json!({"questions": []})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_unknown_and_bus_publish() {
        let bus = UpstreamBus::new();
        let mut outbound = bus.take_outbound_receiver().await.unwrap();
        let pending = PendingQuestions::with_bus(bus);

        assert!(pending.resolve(PermissionResponse::allow("missing")).is_err());

        let rx = pending.register("req-1");
        assert_eq!(pending.pending_ids(), vec!["req-1".to_string()]);
        pending.resolve(PermissionResponse::allow("req-1")).unwrap();

        assert_eq!(rx.await.unwrap().request_id, "req-1");
        assert_eq!(outbound.try_recv().unwrap().request_id, "req-1");
    }

    #[tokio::test]
    async fn test_answer_survives_closed_bus() {
        let bus = UpstreamBus::new();
        drop(bus.take_outbound_receiver().await);
        let pending = PendingQuestions::with_bus(bus);

        let rx = pending.register("req-1");
        pending.resolve(PermissionResponse::allow("req-1")).unwrap();

        assert!(rx.await.unwrap().allow);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_execute_clears_request() {
        let pending = PendingQuestions::new();
        let mut tool = AskUserQuestionTool::new(pending.clone(), QuestionsConfig::default());
        let seen = pending.clone();
        tool.set_prompt_callback(move |question: PendingQuestion| {
            let seen = seen.clone();
            async move {
                assert_eq!(seen.pending_ids(), vec![question.request_id]);
            }
        });

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            tool.execute(auth_args()),
        )
        .await;

        assert!(result.is_err());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_schema_uses_limits() {
        let tool = AskUserQuestionTool::new(
            PendingQuestions::new(),
            QuestionsConfig {
                max_questions: 2,
                ..QuestionsConfig::default()
            },
        );
        let schema = tool.to_schema();
        assert_eq!(schema["function"]["name"], ASK_USER_QUESTION);
        assert_eq!(
            schema["function"]["parameters"]["properties"]["questions"]["maxItems"],
            2
        );
    }
}
