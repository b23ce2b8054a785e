//! Tools for ask-relay
//!
//! This crate provides the `Tool` trait, the AskUserQuestion model, answer
//! formatting, and the permission-response payloads that carry answers
//! back to the agent backend.

pub mod answer;
pub mod ask;
pub mod base;
pub mod permission;
pub mod question;

pub use answer::{answer_map, format_summary, render_answers, AnswerSheet, Selection};
pub use ask::{AskUserQuestionTool, PendingQuestion, PendingQuestions, ASK_USER_QUESTION};
pub use base::{Tool, ToolError};
pub use permission::{answer_response, PermissionReason};
pub use question::{AskUserQuestionInput, Question, QuestionOption};
