//! `ask` command: answer an AskUserQuestion payload from the terminal

use anyhow::{anyhow, bail, Context, Result};
use ask_relay_core::bus::{PermissionResponse, UpstreamBus};
use ask_relay_core::config::Config;
use ask_relay_tools::{
    answer_response, AnswerSheet, AskUserQuestionTool, PendingQuestion, PendingQuestions,
    Question, Selection, Tool, ToolError,
};
use dialoguer::{Input, MultiSelect, Select};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Answers given on the command line instead of interactively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerPlan {
    picks: Vec<(usize, Selection)>,
}

impl AnswerPlan {
    /// Parse `--select Q=I[,I...]` and `--other Q=TEXT` arguments
    pub fn parse(select: &[String], other: &[String]) -> Result<Self> {
        let mut picks = Vec::new();

        for arg in select {
            let (question, options) = split_arg(arg)?;
            for option in options.split(',') {
                let option = option
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("invalid option index in '{}'", arg))?;
                picks.push((question, Selection::Option(option)));
            }
        }
        for arg in other {
            let (question, text) = split_arg(arg)?;
            picks.push((question, Selection::Other(text.to_string())));
        }

        Ok(Self { picks })
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    fn sheet(&self, questions: &[Question]) -> Result<AnswerSheet> {
        let mut sheet = AnswerSheet::new(questions.len());
        for (index, selection) in &self.picks {
            sheet.select(questions, *index, selection.clone())?;
        }
        Ok(sheet)
    }
}

fn split_arg(arg: &str) -> Result<(usize, &str)> {
    let Some((question, rest)) = arg.split_once('=') else {
        bail!("expected QUESTION=VALUE, got '{}'", arg);
    };
    let question = question
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid question index in '{}'", arg))?;
    Ok((question, rest))
}

pub async fn run(
    config: &Config,
    path: &Path,
    plan: AnswerPlan,
    deny: Option<String>,
    json: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let args: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let bus = UpstreamBus::new();
    let mut outbound = bus
        .take_outbound_receiver()
        .await
        .context("outbound receiver already taken")?;
    let pending = PendingQuestions::with_bus(bus);

    let mut tool = AskUserQuestionTool::new(pending.clone(), config.questions.clone());
    let plan = Arc::new(plan);
    let other_label = config.questions.other_label.clone();
    tool.set_prompt_callback(move |question: PendingQuestion| {
        let pending = pending.clone();
        let plan = Arc::clone(&plan);
        let deny = deny.clone();
        let other_label = other_label.clone();
        async move {
            let request_id = question.request_id.clone();
            let response = tokio::task::spawn_blocking(move || {
                respond(&question, &plan, deny, &other_label)
            })
            .await
            .unwrap_or_else(|e| Err(anyhow!("prompt task failed: {}", e)));

            let delivered =
                response.and_then(|response| pending.resolve(response).map_err(Into::into));
            if let Err(e) = delivered {
                error!(request_id = %request_id, "Could not answer question: {:#}", e);
                pending.cancel(&request_id);
            }
        }
    });

    info!(file = %path.display(), "Relaying question");
    match tool.execute(args).await {
        Ok(summary) => println!("{}", summary),
        Err(ToolError::Declined(reason)) => println!("Declined: {}", reason),
        Err(e) => return Err(e.into()),
    }

    if json {
        while let Ok(response) = outbound.try_recv() {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

fn respond(
    question: &PendingQuestion,
    plan: &AnswerPlan,
    deny: Option<String>,
    other_label: &str,
) -> Result<PermissionResponse> {
    if let Some(reason) = deny {
        return Ok(PermissionResponse::deny(&question.request_id).with_reason(reason));
    }

    let sheet = if plan.is_empty() {
        prompt_user(&question.questions, other_label)?
    } else {
        plan.sheet(&question.questions)?
    };
    Ok(answer_response(
        &question.request_id,
        &question.questions,
        &sheet,
        other_label,
    ))
}

fn prompt_user(questions: &[Question], other_label: &str) -> Result<AnswerSheet> {
    let mut sheet = AnswerSheet::new(questions.len());

    for (index, question) in questions.iter().enumerate() {
        let mut items: Vec<String> = question
            .options
            .iter()
            .map(|option| {
                if option.description.is_empty() {
                    option.label.clone()
                } else {
                    format!("{} - {}", option.label, option.description)
                }
            })
            .collect();
        // free text is always offered last
        let other_index = items.len();
        items.push(other_label.to_string());

        let picked = if question.multi_select {
            MultiSelect::new()
                .with_prompt(&question.question)
                .items(&items)
                .interact()?
        } else {
            vec![Select::new()
                .with_prompt(&question.question)
                .items(&items)
                .default(0)
                .interact()?]
        };

        for pick in picked {
            let selection = if pick == other_index {
                let text: String = Input::new()
                    .with_prompt(format!("{} ({})", question.title(), other_label))
                    .allow_empty(true)
                    .interact_text()?;
                Selection::Other(text)
            } else {
                Selection::Option(pick)
            };
            sheet.select(questions, index, selection)?;
        }
    }
    Ok(sheet)
}
