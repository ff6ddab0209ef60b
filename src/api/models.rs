use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};

use crate::api::{ModelInfo, ModelsResponse};
use crate::core::client::TransportError;
use crate::utils::url::construct_api_url;

pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Option<Duration>,
) -> Result<ModelsResponse, TransportError> {
    let models_url = construct_api_url(base_url, "api/tags");
    let mut request = client.get(models_url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(TransportError::from_status(status, &body));
    }

    let models_response = response.json::<ModelsResponse>().await?;
    Ok(models_response)
}

fn parse_modified(model: &ModelInfo) -> Option<DateTime<FixedOffset>> {
    model
        .modified_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
}

pub fn sort_models(models: &mut [ModelInfo]) {
    // Newest first; models without a usable timestamp go last, by name.
    models.sort_by(|a, b| match (parse_modified(a), parse_modified(b)) {
        (Some(a_time), Some(b_time)) => b_time.cmp(&a_time).then_with(|| a.name.cmp(&b.name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    });
}

/// Human-readable size such as `3.8 GB`.
pub fn format_model_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
