//! Dataset management: idempotent creation, example syncing, dedupe

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::client::{Dataset, EvalClient};
use crate::error::Result;

/// Environment variable controlling the dataset name prefix
pub const DATASET_PREFIX_ENV: &str = "LANGSMITH_DATASET_PREFIX";

/// Default dataset name prefix
pub const DEFAULT_DATASET_PREFIX: &str = "lariat";

/// Name of the seeded filesystem dataset
pub fn filesystem_dataset_name() -> String {
    let prefix = std::env::var(DATASET_PREFIX_ENV)
        .unwrap_or_else(|_| DEFAULT_DATASET_PREFIX.to_string());
    format!("{}-filesystem", prefix)
}

/// The seeded examples for the filesystem dataset
pub fn filesystem_examples() -> Vec<(Value, Value)> {
    vec![(
        json!({"question": "can you list all the files in the project root?"}),
        json!({"answer": "Here are all the files and directories in the project root:\n\n\
            **Files:**\n\
            - `README.md` - Project documentation\n\
            - `Cargo.toml` - Workspace manifest\n\
            - `servers.toml` - MCP server manifest\n\n\
            **Directories:**\n\
            - `crates/` - Contains the agent implementation\n\
            - `scripts/` - Utility scripts"}),
    )]
}

/// Get a dataset by name, creating it when absent
pub async fn get_or_create_dataset(
    client: &EvalClient,
    name: &str,
    description: &str,
) -> Result<Dataset> {
    if let Some(dataset) = client.read_dataset(name).await? {
        return Ok(dataset);
    }
    client.create_dataset(name, description).await
}

/// Examples are considered equal when their inputs match. Outputs can
/// drift due to formatting or reference updates.
fn examples_equal(a: &Value, b: &Value) -> bool {
    a == b
}

/// Ensure the provided examples exist in the dataset. Returns the number
/// of examples added.
pub async fn ensure_examples(
    client: &EvalClient,
    dataset_id: uuid::Uuid,
    examples: &[(Value, Value)],
) -> Result<usize> {
    let existing = client.list_examples(dataset_id).await?;
    let mut added = 0;

    for (inputs, outputs) in examples {
        let present = existing.iter().any(|e| examples_equal(&e.inputs, inputs));
        if !present {
            client.create_example(dataset_id, inputs, outputs).await?;
            added += 1;
        }
    }
    Ok(added)
}

/// Remove duplicate examples with the same inputs, keeping the first
/// occurrence. Deletions are best-effort. Returns the number removed.
pub async fn dedupe_examples_by_inputs(
    client: &EvalClient,
    dataset_id: uuid::Uuid,
) -> Result<usize> {
    let existing = client.list_examples(dataset_id).await?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut removed = 0;

    for example in &existing {
        let key = canonical_json(&example.inputs);
        if seen.contains(&key) {
            match client.delete_example(example.id).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!("failed to delete duplicate example {}: {}", example.id, e);
                }
            }
        } else {
            seen.insert(key);
        }
    }
    Ok(removed)
}

/// Create the filesystem dataset, deduplicate it, and seed its examples.
/// Returns the dataset and the number of duplicates removed.
pub async fn ensure_filesystem_dataset(client: &EvalClient) -> Result<(Dataset, usize)> {
    let dataset = get_or_create_dataset(
        client,
        &filesystem_dataset_name(),
        "Evaluation dataset for agent questions about the filesystem.",
    )
    .await?;
    let removed = dedupe_examples_by_inputs(client, dataset.id).await?;
    ensure_examples(client, dataset.id, &filesystem_examples()).await?;
    Ok((dataset, removed))
}

/// Serialize with object keys sorted at every level, so two JSON values
/// that differ only in key order produce the same string.
pub fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
                sorted.sort_by_key(|(k, _)| k.as_str());
                Value::Object(
                    sorted
                        .into_iter()
                        .map(|(k, v)| (k.clone(), sort(v)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_string(&sort(value)).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"d": 2, "c": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"c": 3, "d": 2}, "b": 1}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_canonical_json_distinguishes_values() {
        let a = json!({"question": "one"});
        let b = json!({"question": "two"});
        assert_ne!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_examples_equal_on_inputs_only() {
        let a = json!({"question": "q"});
        let b = json!({"question": "q"});
        assert!(examples_equal(&a, &b));
        assert!(!examples_equal(&a, &json!({"question": "other"})));
    }

    #[test]
    fn test_filesystem_dataset_name_uses_prefix() {
        std::env::remove_var(DATASET_PREFIX_ENV);
        assert_eq!(filesystem_dataset_name(), "lariat-filesystem");
    }

    #[test]
    fn test_filesystem_examples_shape() {
        let examples = filesystem_examples();
        assert_eq!(examples.len(), 1);
        assert!(examples[0].0["question"].is_string());
        assert!(examples[0].1["answer"].is_string());
    }
}
