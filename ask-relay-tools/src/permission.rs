//! Permission-response payloads
//!
//! The `reason` of a permission response is either plain text or a JSON
//! object mapping question text to the comma-joined labels picked for it.

use ask_relay_core::bus::PermissionResponse;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::answer::{answer_map, AnswerSheet};
use crate::question::Question;

/// Decoded `reason` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionReason {
    /// Free-form text
    Text(String),
    /// Question text to joined labels
    Answers(BTreeMap<String, String>),
}

impl PermissionReason {
    /// Decode a raw reason. Anything that is not a JSON object of strings
    /// is kept verbatim as text.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<BTreeMap<String, String>>(raw.trim()) {
            Ok(answers) => PermissionReason::Answers(answers),
            Err(e) => {
                debug!("Reason is not an answer map ({}), keeping as text", e);
                PermissionReason::Text(raw.to_string())
            }
        }
    }

    /// Encode for the wire
    pub fn encode(&self) -> String {
        match self {
            PermissionReason::Text(text) => text.clone(),
            PermissionReason::Answers(answers) => Value::Object(
                answers
                    .iter()
                    .map(|(q, a)| (q.clone(), Value::String(a.clone())))
                    .collect(),
            )
            .to_string(),
        }
    }

    /// Answers keyed by question text. Plain text becomes the single
    /// free-text answer to the first question.
    pub fn into_answers(self, questions: &[Question]) -> BTreeMap<String, String> {
        match self {
            PermissionReason::Answers(answers) => answers,
            PermissionReason::Text(text) => questions
                .first()
                .filter(|_| !text.trim().is_empty())
                .map(|q| (q.question.clone(), text.trim().to_string()))
                .into_iter()
                .collect(),
        }
    }
}

/// Build the approving response that carries the user's answers
pub fn answer_response(
    request_id: impl Into<String>,
    questions: &[Question],
    answers: &AnswerSheet,
    other_label: &str,
) -> PermissionResponse {
    let reason = PermissionReason::Answers(answer_map(questions, answers, other_label));
    PermissionResponse::allow(request_id).with_reason(reason.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::Selection;

    fn questions() -> Vec<Question> {
        vec![
            Question::new("Auth method", "Which auth method?", ["OAuth 2.0", "JWT", "API Key"]),
            Question::new("Features", "Which features?", ["Dark mode", "Push notifications"])
                .multi(),
        ]
    }

    #[test]
    fn test_parse_answer_map() {
        let reason = PermissionReason::parse(r#"{"Which auth method?":"JWT"}"#);
        match reason {
            PermissionReason::Answers(map) => assert_eq!(map["Which auth method?"], "JWT"),
            other => panic!("unexpected reason: {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_json_falls_back_to_text() {
        let raw = r#"{"Which auth method?": "JWT""#;
        assert_eq!(
            PermissionReason::parse(raw),
            PermissionReason::Text(raw.to_string())
        );

        let answers = PermissionReason::parse(raw).into_answers(&questions());
        assert_eq!(answers.len(), 1);
        assert_eq!(answers["Which auth method?"], raw);
    }

    #[test]
    fn test_non_string_values_are_text() {
        let reason = PermissionReason::parse(r#"{"a": 1}"#);
        assert!(matches!(reason, PermissionReason::Text(_)));
    }

    #[test]
    fn test_blank_text_has_no_answers() {
        assert!(PermissionReason::Text("  ".to_string())
            .into_answers(&questions())
            .is_empty());
    }

    #[test]
    fn test_answer_response_round_trip() {
        let questions = questions();
        let mut sheet = AnswerSheet::new(questions.len());
        sheet.select(&questions, 0, Selection::Option(1)).unwrap();
        sheet.select(&questions, 1, Selection::Option(0)).unwrap();
        sheet.select(&questions, 1, Selection::Option(1)).unwrap();

        let response = answer_response("req-9", &questions, &sheet, "Other");
        assert!(response.allow);

        let decoded = PermissionReason::parse(response.reason.as_deref().unwrap());
        let answers = decoded.into_answers(&questions);
        assert_eq!(answers["Which auth method?"], "JWT");
        assert_eq!(answers["Which features?"], "Dark mode, Push notifications");
    }
}
