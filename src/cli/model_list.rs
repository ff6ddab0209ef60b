//! Model listing functionality

use std::error::Error;

use chrono::DateTime;

use crate::api::models::format_model_size;
use crate::api::ModelInfo;
use crate::core::client::describe_transport_failure;
use crate::core::config::ResolvedConfig;
use crate::ui::chat_loop::setup::client_for;

pub async fn list_models(config: &ResolvedConfig) -> Result<(), Box<dyn Error>> {
    let client = client_for(config)?;

    println!("🤖 Models on {}", client.base_url());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if let Some(default_model) = &config.model {
        println!("🎯 Default model: {default_model}");
        println!();
    }

    let models = client
        .try_list_models()
        .await
        .map_err(|err| describe_transport_failure(&err))?;

    if models.is_empty() {
        println!("No models installed. Pull one with 'ollama pull <model>'.");
        return Ok(());
    }

    println!("Found {} models (newest first):", models.len());
    println!();
    for model in &models {
        for line in describe_model(model) {
            println!("{line}");
        }
        println!();
    }
    Ok(())
}

fn describe_model(model: &ModelInfo) -> Vec<String> {
    let mut lines = vec![format!("  • {}", model.name)];
    if let Some(size) = model.size {
        lines.push(format!("    Size: {}", format_model_size(size)));
    }
    if let Some(details) = &model.details {
        let facts: Vec<&str> = [
            details.family.as_deref(),
            details.parameter_size.as_deref(),
            details.quantization_level.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|fact| !fact.is_empty())
        .collect();
        if !facts.is_empty() {
            lines.push(format!("    Details: {}", facts.join(", ")));
        }
    }
    if let Some(modified) = model
        .modified_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
    {
        lines.push(format!("    Modified: {}", modified.format("%Y-%m-%d %H:%M")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ModelDetails;

    #[test]
    fn describes_size_details_and_date() {
        let model = ModelInfo {
            name: "llama3.1:8b".into(),
            modified_at: Some("2024-07-23T10:15:00.123456789-07:00".into()),
            size: Some(4_661_224_676),
            digest: None,
            details: Some(ModelDetails {
                family: Some("llama".into()),
                parameter_size: Some("8.0B".into()),
                quantization_level: Some("Q4_0".into()),
                format: Some("gguf".into()),
            }),
        };
        let lines = describe_model(&model);
        assert_eq!(lines[0], "  • llama3.1:8b");
        assert_eq!(lines[1], format!("    Size: {}", format_model_size(4_661_224_676)));
        assert_eq!(lines[2], "    Details: llama, 8.0B, Q4_0");
        assert_eq!(lines[3], "    Modified: 2024-07-23 10:15");
    }

    #[test]
    fn bare_model_is_one_line() {
        let model = ModelInfo {
            name: "tiny".into(),
            modified_at: None,
            size: None,
            digest: None,
            details: None,
        };
        assert_eq!(describe_model(&model), vec!["  • tiny".to_string()]);
    }
}
