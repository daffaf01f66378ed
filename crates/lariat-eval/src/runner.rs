//! Evaluation orchestration

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::client::EvalClient;
use crate::datasets::{ensure_filesystem_dataset, get_or_create_dataset};
use crate::error::{Error, Result};
use crate::evaluators::CorrectnessEvaluator;
use crate::target::EvalTarget;

/// Environment variable naming the tracing project
pub const PROJECT_ENV: &str = "LANGSMITH_PROJECT";

/// Default tracing project name
pub const DEFAULT_PROJECT: &str = "lariat-agent";

/// Settings for one evaluation run
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Prefix for the experiment name
    pub experiment_prefix: String,
    /// Override dataset name; defaults to the seeded filesystem dataset
    pub dataset_name: Option<String>,
    /// Override project name; defaults to `LANGSMITH_PROJECT`
    pub project_name: Option<String>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            experiment_prefix: "filesystem".to_string(),
            dataset_name: None,
            project_name: None,
        }
    }
}

/// Outcome for a single example
#[derive(Debug, Clone)]
pub struct ExampleResult {
    pub example_id: Uuid,
    pub question: String,
    pub answer: String,
    /// Missing when the judge failed on this example
    pub score: Option<f64>,
    pub comment: Option<String>,
}

/// Summary of a completed evaluation run
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub experiment_name: String,
    pub dataset_name: String,
    pub project_name: String,
    pub results: Vec<ExampleResult>,
    pub warnings: Vec<String>,
}

/// Environment variables the run needs to authenticate
fn validate_env() -> Vec<String> {
    let mut missing = vec![];
    for var in [crate::client::API_KEY_ENV, "ANTHROPIC_API_KEY"] {
        if std::env::var(var).map(|v| v.is_empty()).unwrap_or(true) {
            missing.push(var.to_string());
        }
    }
    missing
}

fn project_name(config: &EvaluationConfig) -> String {
    config
        .project_name
        .clone()
        .or_else(|| std::env::var(PROJECT_ENV).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_PROJECT.to_string())
}

fn experiment_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}

/// A target failure still produces an answer the judge can grade, so one
/// broken example does not abort the run.
fn fallback_answer(error: &Error) -> String {
    format!("[error] {}", error)
}

/// Run the agent over every example in the dataset, grade each answer,
/// and log runs and feedback to the backend.
pub async fn run_evaluation(
    client: &EvalClient,
    target: &mut dyn EvalTarget,
    evaluator: &CorrectnessEvaluator,
    config: &EvaluationConfig,
) -> Result<EvaluationReport> {
    let mut warnings = vec![];

    let missing = validate_env();
    if !missing.is_empty() {
        warnings.push(format!(
            "Missing required environment variables: {}. The evaluation may fail to authenticate.",
            missing.join(", ")
        ));
    }

    let dataset = match &config.dataset_name {
        Some(name) => get_or_create_dataset(client, name, "").await?,
        None => {
            let (dataset, removed) = ensure_filesystem_dataset(client).await?;
            if removed > 0 {
                warnings.push(format!(
                    "Removed {} duplicate example(s) with the same inputs from dataset '{}'.",
                    removed, dataset.name
                ));
            }
            dataset
        }
    };

    let examples = client.list_examples(dataset.id).await?;
    let experiment = experiment_name(&config.experiment_prefix);
    let project = project_name(config);
    let mut results = vec![];

    for example in examples {
        let question = example
            .inputs
            .get("question")
            .and_then(|q| q.as_str())
            .unwrap_or_default()
            .to_string();

        let start_time = Utc::now();
        let answer = match target.invoke(&question).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("target failed on example {}: {}", example.id, e);
                fallback_answer(&e)
            }
        };
        let end_time = Utc::now();
        let outputs = json!({"answer": answer});

        let run_id = Uuid::new_v4();
        if let Err(e) = client
            .create_run(
                run_id,
                &experiment,
                &project,
                &example.inputs,
                &outputs,
                start_time,
                end_time,
            )
            .await
        {
            warnings.push(format!("failed to log run for example {}: {}", example.id, e));
        }

        let (score, comment) = match evaluator
            .evaluate(&example.inputs, &outputs, &example.outputs)
            .await
        {
            Ok(feedback) => {
                if let Err(e) = client
                    .create_feedback(run_id, &feedback.key, feedback.score, feedback.comment.as_deref())
                    .await
                {
                    warnings.push(format!(
                        "failed to log feedback for example {}: {}",
                        example.id, e
                    ));
                }
                (Some(feedback.score), feedback.comment)
            }
            Err(e) => {
                warnings.push(format!("judge failed on example {}: {}", example.id, e));
                (None, None)
            }
        };

        results.push(ExampleResult {
            example_id: example.id,
            question,
            answer,
            score,
            comment,
        });
    }

    Ok(EvaluationReport {
        experiment_name: experiment,
        dataset_name: dataset.name,
        project_name: project,
        results,
        warnings,
    })
}
