//! Evaluation runs against the backend dataset

use std::sync::Arc;

use anyhow::bail;
use clap::Args;
use lariat_agent::ProviderTransport;
use lariat_eval::{
    run_evaluation, AgentTarget, CorrectnessEvaluator, EvalClient, EvaluationConfig,
    EvaluationReport, ScoreMode,
};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// LLM-as-judge model. Accepts `provider:model` specs.
    #[arg(long)]
    pub judge_model: Option<String>,

    /// Prefix for the experiment name
    #[arg(long, default_value = "filesystem")]
    pub experiment_prefix: String,

    /// Override dataset name (defaults to the seeded dataset)
    #[arg(long)]
    pub dataset_name: Option<String>,

    /// Override project name (defaults to env LANGSMITH_PROJECT)
    #[arg(long)]
    pub project_name: Option<String>,

    /// Return a continuous score in [0,1] instead of boolean
    #[arg(long)]
    pub continuous: bool,

    /// Comma-separated list of allowed scores (e.g. '0,0.5,1').
    /// Mutually exclusive with --continuous.
    #[arg(long)]
    pub choices: Option<String>,

    /// Model to use for the agent under test
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print raw JSON result instead of formatted output
    #[arg(long)]
    pub json: bool,
}

fn parse_choices(raw: &str) -> anyhow::Result<Vec<f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| anyhow::anyhow!("Invalid --choices value '{}'. Must be comma-separated floats, e.g. '0,0.5,1'", s))
        })
        .collect()
}

fn print_env_summary() {
    println!("Environment:");
    for var in [
        "LANGSMITH_API_KEY",
        "LANGSMITH_PROJECT",
        "ANTHROPIC_API_KEY",
    ] {
        let display = match std::env::var(var) {
            Ok(v) if !v.is_empty() => {
                if var == "LANGSMITH_PROJECT" {
                    v
                } else {
                    "***set***".to_string()
                }
            }
            _ => "(missing)".to_string(),
        };
        println!("  {} = {}", var, display);
    }
    println!();
}

fn print_report(report: &EvaluationReport) {
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }
    println!();
    println!("Experiment: {}", report.experiment_name);
    println!("Dataset:    {}", report.dataset_name);
    println!("Project:    {}", report.project_name);
    println!();
    for result in &report.results {
        let score = result
            .score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "n/a".to_string());
        println!("  [{}] {}", score, result.question);
    }
    println!();
    println!("Visit the backend UI to view detailed results and feedback.");
}

fn report_json(report: &EvaluationReport) -> serde_json::Value {
    serde_json::json!({
        "experiment_name": report.experiment_name,
        "dataset_name": report.dataset_name,
        "project_name": report.project_name,
        "warnings": report.warnings,
        "results": report.results.iter().map(|r| serde_json::json!({
            "example_id": r.example_id,
            "question": r.question,
            "answer": r.answer,
            "score": r.score,
        })).collect::<Vec<_>>(),
    })
}

pub async fn run(args: EvalArgs, config: Config) -> anyhow::Result<()> {
    let choices = args.choices.as_deref().map(parse_choices).transpose()?;
    if args.continuous && choices.is_some() {
        bail!("--continuous and --choices are mutually exclusive");
    }
    let mode = match choices {
        Some(choices) => ScoreMode::Choices(choices),
        None if args.continuous => ScoreMode::Continuous,
        None => ScoreMode::Binary,
    };

    if !args.json {
        print_env_summary();
    }

    let agent = super::build_agent(&config, args.model, None).await?;
    let mut target = AgentTarget::new(agent);

    let judge_model = args
        .judge_model
        .or_else(|| config.eval.judge_model.clone())
        .unwrap_or_else(|| lariat_eval::evaluators::DEFAULT_JUDGE_MODEL.to_string());
    let judge_transport = Arc::new(ProviderTransport::from_env()?);
    let evaluator = CorrectnessEvaluator::new(judge_transport, judge_model, mode);

    let client = EvalClient::from_env();
    let eval_config = EvaluationConfig {
        experiment_prefix: args.experiment_prefix,
        dataset_name: args.dataset_name,
        project_name: args.project_name.or_else(|| config.eval.project.clone()),
    };

    let report = run_evaluation(&client, &mut target, &evaluator, &eval_config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }
    Ok(())
}
