//! User selections and their text renderings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::base::{Result, ToolError};
use crate::question::Question;

/// Separator between labels of a multi-select answer
pub const LABEL_SEPARATOR: &str = ", ";

/// One pick for a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selection {
    /// Index into the question's options
    Option(usize),
    /// Free-text answer in place of the listed options
    Other(String),
}

/// Selections for every question of one AskUserQuestion call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSheet {
    selections: Vec<Vec<Selection>>,
}

impl AnswerSheet {
    /// Empty sheet for `question_count` questions
    pub fn new(question_count: usize) -> Self {
        Self {
            selections: vec![Vec::new(); question_count],
        }
    }

    /// Record a pick.
    ///
    /// Single-select questions keep only the latest pick. In multi-select
    /// questions picking a listed option again removes it, and a new
    /// free-text answer replaces the previous one.
    pub fn select(
        &mut self,
        questions: &[Question],
        index: usize,
        selection: Selection,
    ) -> Result<()> {
        let question = questions.get(index).ok_or_else(|| {
            ToolError::InvalidParams(format!("no question at index {}", index))
        })?;
        if let Selection::Option(option) = selection {
            if option >= question.options.len() {
                return Err(ToolError::InvalidParams(format!(
                    "question {} has no option {}",
                    index, option
                )));
            }
        }
        if self.selections.len() < questions.len() {
            self.selections.resize(questions.len(), Vec::new());
        }

        let picks = &mut self.selections[index];
        if !question.multi_select {
            *picks = vec![selection];
            return Ok(());
        }

        match selection {
            Selection::Option(_) => {
                if let Some(pos) = picks.iter().position(|s| *s == selection) {
                    picks.remove(pos);
                } else {
                    picks.push(selection);
                }
            }
            Selection::Other(_) => {
                picks.retain(|s| !matches!(s, Selection::Other(_)));
                picks.push(selection);
            }
        }
        Ok(())
    }

    /// Drop every pick of one question
    pub fn clear(&mut self, index: usize) {
        if let Some(picks) = self.selections.get_mut(index) {
            picks.clear();
        }
    }

    /// Picks of one question
    pub fn selections(&self, index: usize) -> &[Selection] {
        self.selections.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether nothing was picked at all
    pub fn is_empty(&self) -> bool {
        self.selections.iter().all(Vec::is_empty)
    }

    /// Labels picked for a question: listed options in option order, then
    /// the free-text answer (or `other_label` when it is blank)
    pub fn labels(&self, questions: &[Question], index: usize, other_label: &str) -> Vec<String> {
        let Some(question) = questions.get(index) else {
            return Vec::new();
        };
        let picks = self.selections(index);

        let mut labels: Vec<String> = question
            .options
            .iter()
            .enumerate()
            .filter(|(i, _)| picks.contains(&Selection::Option(*i)))
            .map(|(_, option)| option.label.clone())
            .collect();

        labels.extend(picks.iter().filter_map(|pick| match pick {
            Selection::Other(text) if text.trim().is_empty() => Some(other_label.to_string()),
            Selection::Other(text) => Some(text.trim().to_string()),
            Selection::Option(_) => None,
        }));
        labels
    }
}

/// Human readable summary, one `"<title>: <labels>"` line per answered
/// question. Empty when nothing was picked.
pub fn format_summary(
    questions: &[Question],
    answers: &AnswerSheet,
    other_label: &str,
) -> String {
    (0..questions.len())
        .filter_map(|i| {
            let labels = answers.labels(questions, i, other_label);
            (!labels.is_empty()).then(|| {
                format!("{}: {}", questions[i].title(), labels.join(LABEL_SEPARATOR))
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Question text mapped to its comma-joined labels, for answered questions
pub fn answer_map(
    questions: &[Question],
    answers: &AnswerSheet,
    other_label: &str,
) -> BTreeMap<String, String> {
    (0..questions.len())
        .filter_map(|i| {
            let labels = answers.labels(questions, i, other_label);
            (!labels.is_empty())
                .then(|| (questions[i].question.clone(), labels.join(LABEL_SEPARATOR)))
        })
        .collect()
}

/// Render an answer map back into summary lines, in question order
pub fn render_answers(questions: &[Question], answers: &BTreeMap<String, String>) -> String {
    questions
        .iter()
        .filter_map(|q| {
            answers
                .get(&q.question)
                .map(|answer| format!("{}: {}", q.title(), answer))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_question() -> Question {
        Question::new("Auth method", "Which auth method?", ["OAuth 2.0", "JWT", "API Key"])
    }

    fn features_question() -> Question {
        Question::new(
            "Features",
            "Which features?",
            ["Dark mode", "Offline sync", "Push notifications"],
        )
        .multi()
    }

    #[test]
    fn test_single_select_summary() {
        let questions = vec![auth_question()];
        let mut sheet = AnswerSheet::new(1);
        sheet.select(&questions, 0, Selection::Option(1)).unwrap();

        assert_eq!(format_summary(&questions, &sheet, "Other"), "Auth method: JWT");
    }

    #[test]
    fn test_multi_select_summary() {
        let questions = vec![features_question()];
        let mut sheet = AnswerSheet::new(1);
        sheet.select(&questions, 0, Selection::Option(2)).unwrap();
        sheet.select(&questions, 0, Selection::Option(0)).unwrap();

        assert_eq!(
            format_summary(&questions, &sheet, "Other"),
            "Features: Dark mode, Push notifications"
        );
    }

    #[test]
    fn test_no_selection_is_empty() {
        let questions = vec![auth_question(), features_question()];
        let sheet = AnswerSheet::new(2);

        assert!(sheet.is_empty());
        assert_eq!(format_summary(&questions, &sheet, "Other"), "");
        assert!(answer_map(&questions, &sheet, "Other").is_empty());
    }

    #[test]
    fn test_single_select_keeps_last_pick() {
        let questions = vec![auth_question()];
        let mut sheet = AnswerSheet::new(1);
        sheet.select(&questions, 0, Selection::Option(0)).unwrap();
        sheet
            .select(&questions, 0, Selection::Other("SAML".to_string()))
            .unwrap();

        assert_eq!(sheet.selections(0), &[Selection::Other("SAML".to_string())]);
    }

    #[test]
    fn test_multi_select_toggles() {
        let questions = vec![features_question()];
        let mut sheet = AnswerSheet::new(1);
        sheet.select(&questions, 0, Selection::Option(1)).unwrap();
        sheet.select(&questions, 0, Selection::Option(1)).unwrap();

        assert!(sheet.is_empty());
    }

    #[test]
    fn test_other_text_and_blank_fallback() {
        let questions = vec![features_question(), auth_question()];
        let mut sheet = AnswerSheet::new(2);
        sheet.select(&questions, 0, Selection::Option(0)).unwrap();
        sheet
            .select(&questions, 0, Selection::Other("  Widgets ".to_string()))
            .unwrap();
        sheet
            .select(&questions, 1, Selection::Other(String::new()))
            .unwrap();

        let map = answer_map(&questions, &sheet, "Other");
        assert_eq!(map["Which features?"], "Dark mode, Widgets");
        assert_eq!(map["Which auth method?"], "Other");
        assert_eq!(
            render_answers(&questions, &map),
            "Features: Dark mode, Widgets\nAuth method: Other"
        );
    }

    #[test]
    fn test_out_of_range_selection() {
        let questions = vec![auth_question()];
        let mut sheet = AnswerSheet::new(1);

        assert!(sheet.select(&questions, 0, Selection::Option(3)).is_err());
        assert!(sheet.select(&questions, 1, Selection::Option(0)).is_err());
        assert!(sheet.is_empty());
    }
}
