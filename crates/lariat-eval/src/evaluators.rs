//! LLM-as-judge evaluators

use std::sync::Arc;

use lariat_ai::{ChatRequest, Message};
use lariat_agent::Transport;
use serde_json::Value;

use crate::error::{Error, Result};

/// Default judge model
pub const DEFAULT_JUDGE_MODEL: &str = "claude-3-5-sonnet-latest";

const JUDGE_SYSTEM_PROMPT: &str = "\
You are an expert data labeler grading the correctness of an answer \
against a reference answer. Correctness means the answer conveys the \
same substantive information as the reference; formatting and phrasing \
differences do not matter. First explain your reasoning briefly, then \
give your verdict on the final line.";

/// How the judge scores an answer
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreMode {
    /// 1.0 for correct, 0.0 for incorrect
    Binary,
    /// A score anywhere in [0, 1]
    Continuous,
    /// A score snapped to the nearest allowed value
    Choices(Vec<f64>),
}

/// One piece of evaluator feedback
#[derive(Debug, Clone)]
pub struct EvaluatorResult {
    /// Feedback key logged to the backend
    pub key: String,
    /// Score in [0, 1]
    pub score: f64,
    /// The judge's full response, kept as the feedback comment
    pub comment: Option<String>,
}

/// Grades answers against reference outputs with a judge model
pub struct CorrectnessEvaluator {
    transport: Arc<dyn Transport>,
    model: String,
    feedback_key: String,
    mode: ScoreMode,
}

impl CorrectnessEvaluator {
    pub fn new(transport: Arc<dyn Transport>, model: impl Into<String>, mode: ScoreMode) -> Self {
        Self {
            transport,
            model: normalize_model(&model.into()),
            feedback_key: "correctness".to_string(),
            mode,
        }
    }

    /// Override the feedback key
    pub fn with_feedback_key(mut self, key: impl Into<String>) -> Self {
        self.feedback_key = key.into();
        self
    }

    /// Grade one answer
    pub async fn evaluate(
        &self,
        inputs: &Value,
        outputs: &Value,
        reference_outputs: &Value,
    ) -> Result<EvaluatorResult> {
        let prompt = self.build_prompt(inputs, outputs, reference_outputs);
        let request = ChatRequest {
            model: self.model.clone(),
            system: Some(JUDGE_SYSTEM_PROMPT.to_string()),
            messages: vec![Message::user(prompt)],
            tools: vec![],
            max_tokens: 1024,
            temperature: Some(0.0),
        };

        let completion = self.transport.complete(request).await?;
        let response = completion.message.text();

        let score = match &self.mode {
            ScoreMode::Binary => parse_binary_verdict(&response),
            ScoreMode::Continuous => parse_score(&response),
            ScoreMode::Choices(choices) => {
                parse_score(&response).map(|s| snap_to_choices(s, choices))
            }
        }
        .ok_or_else(|| Error::BadVerdict(response.chars().take(200).collect()))?;

        Ok(EvaluatorResult {
            key: self.feedback_key.clone(),
            score,
            comment: Some(response),
        })
    }

    fn build_prompt(&self, inputs: &Value, outputs: &Value, reference_outputs: &Value) -> String {
        let verdict_instruction = match &self.mode {
            ScoreMode::Binary => "Final line: exactly CORRECT or INCORRECT.".to_string(),
            ScoreMode::Continuous => {
                "Final line: a single score between 0.0 and 1.0.".to_string()
            }
            ScoreMode::Choices(choices) => format!(
                "Final line: a single score, one of: {}.",
                choices
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        format!(
            "<question>\n{}\n</question>\n\n\
             <reference_answer>\n{}\n</reference_answer>\n\n\
             <answer>\n{}\n</answer>\n\n{}",
            render(inputs),
            render(reference_outputs),
            render(outputs),
            verdict_instruction
        )
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Accept `provider:model` specs by stripping the provider prefix
fn normalize_model(model: &str) -> String {
    match model.split_once(':') {
        Some(("anthropic", name)) => name.to_string(),
        _ => model.to_string(),
    }
}

/// Find the verdict on the last non-empty line. INCORRECT is checked
/// first since CORRECT is a substring of it.
fn parse_binary_verdict(response: &str) -> Option<f64> {
    for line in response.lines().rev() {
        let line = line.trim().to_uppercase();
        if line.is_empty() {
            continue;
        }
        if line.contains("INCORRECT") {
            return Some(0.0);
        }
        if line.contains("CORRECT") {
            return Some(1.0);
        }
    }
    None
}

/// Find a numeric score in [0, 1] scanning from the end of the response
fn parse_score(response: &str) -> Option<f64> {
    for token in response.split_whitespace().rev() {
        let token = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '.');
        if let Ok(score) = token.parse::<f64>() {
            if (0.0..=1.0).contains(&score) {
                return Some(score);
            }
        }
    }
    None
}

fn snap_to_choices(score: f64, choices: &[f64]) -> f64 {
    choices
        .iter()
        .copied()
        .min_by(|a, b| {
            (a - score)
                .abs()
                .partial_cmp(&(b - score).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(score)
}
