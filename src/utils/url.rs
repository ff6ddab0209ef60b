//! URL helpers for building Ollama endpoint addresses
//!
//! Base URLs come from the command line, the `OLLAMA_HOST` environment
//! variable, or the config file, and are normalized here before any endpoint
//! path is appended.

use tracing::warn;

/// Default port the Ollama server listens on.
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use ollama_chat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
/// assert_eq!(normalize_base_url("http://localhost:11434///"), "http://localhost:11434");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// # Examples
///
/// ```
/// use ollama_chat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434/", "/api/chat"),
///     "http://localhost:11434/api/chat"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Turn an `OLLAMA_HOST`-style value into a base URL.
///
/// The server accepts bare `host`, `host:port`, or a full URL; a missing
/// scheme becomes `http` and a missing port becomes 11434. IPv6 addresses
/// may be bracketed (`[::1]:8080`) or bare (`::1`, default port only).
pub fn base_url_from_host(host: &str) -> Option<String> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.contains("://") {
        return Some(normalize_base_url(trimmed));
    }

    let trimmed = trimmed.trim_end_matches('/');

    if trimmed.starts_with('[') {
        let Some((_, after)) = trimmed.split_once(']') else {
            warn!(host, "Ignoring OLLAMA_HOST with an unclosed IPv6 bracket");
            return None;
        };
        return match after {
            "" => Some(format!("http://{trimmed}:{DEFAULT_OLLAMA_PORT}")),
            _ if after.strip_prefix(':').is_some_and(is_port) => Some(format!("http://{trimmed}")),
            _ => {
                warn!(host, "Ignoring OLLAMA_HOST with an invalid port");
                None
            }
        };
    }

    // More than one colon without brackets can only be an IPv6 address.
    if trimmed.matches(':').count() > 1 {
        return Some(format!("http://[{trimmed}]:{DEFAULT_OLLAMA_PORT}"));
    }

    let has_port = trimmed
        .rsplit_once(':')
        .map(|(_, port)| is_port(port))
        .unwrap_or(false);

    if has_port {
        Some(format!("http://{trimmed}"))
    } else {
        Some(format!("http://{trimmed}:{DEFAULT_OLLAMA_PORT}"))
    }
}

fn is_port(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}
