//! AskUserQuestion input model

use ask_relay_core::config::QuestionsConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::base::{Result, ToolError};

/// One selectable option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Text shown to the user and sent back as the answer
    pub label: String,
    /// Optional explanation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl QuestionOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
        }
    }
}

/// A structured question from the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Full question text; also the key of the answer map
    pub question: String,
    /// Short label such as "Auth method"
    #[serde(default)]
    pub header: String,
    pub options: Vec<QuestionOption>,
    /// Whether several options may be picked
    #[serde(default, alias = "multi_select")]
    pub multi_select: bool,
}

impl Question {
    /// Create a single-select question
    pub fn new<I, S>(header: impl Into<String>, question: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            question: question.into(),
            header: header.into(),
            options: labels.into_iter().map(QuestionOption::new).collect(),
            multi_select: false,
        }
    }

    /// Allow several options
    pub fn multi(mut self) -> Self {
        self.multi_select = true;
        self
    }

    /// Header if present, else the question text
    pub fn title(&self) -> &str {
        if self.header.trim().is_empty() {
            &self.question
        } else {
            &self.header
        }
    }
}

/// Arguments of an AskUserQuestion invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskUserQuestionInput {
    pub questions: Vec<Question>,
}

impl AskUserQuestionInput {
    /// Decode and validate tool arguments
    pub fn parse(args: &Value, limits: &QuestionsConfig) -> Result<Self> {
        let input: Self = serde_json::from_value(args.clone())
            .map_err(|e| ToolError::InvalidParams(e.to_string()))?;
        input.validate(limits)?;
        Ok(input)
    }

    /// Check counts and required text, reporting every problem at once
    pub fn validate(&self, limits: &QuestionsConfig) -> Result<()> {
        let mut errors = Vec::new();

        if self.questions.is_empty() {
            errors.push("at least one question is required".to_string());
        }
        if self.questions.len() > limits.max_questions {
            errors.push(format!(
                "at most {} questions are allowed, got {}",
                limits.max_questions,
                self.questions.len()
            ));
        }

        for (i, question) in self.questions.iter().enumerate() {
            if question.question.trim().is_empty() {
                errors.push(format!("questions[{}].question must not be empty", i));
            }
            let count = question.options.len();
            if count < 2 || count > limits.max_options {
                errors.push(format!(
                    "questions[{}] needs 2..={} options, got {}",
                    i, limits.max_options, count
                ));
            }
            if question.options.iter().any(|o| o.label.trim().is_empty()) {
                errors.push(format!("questions[{}] has an option without a label", i));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ToolError::InvalidParams(errors.join("; ")))
        }
    }
}
