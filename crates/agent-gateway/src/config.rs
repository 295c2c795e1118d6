//! Gateway configuration, assembled from CLI flags with environment
//! variables as the fallback — the same precedence the teacher's config
//! loader uses for every setting it owns.

use std::env;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: String,
    pub system_prompt: Option<String>,
    pub default_tool_timeout_ms: u64,
    /// Pre-shared token for `/v1/sessions/ws`. `None` means unauthenticated
    /// (open access, dev mode) — mirrors the teacher's node-token fallback.
    pub token: Option<String>,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
}

impl GatewayConfig {
    pub fn from_env_and_flags(bind: Option<String>, system_prompt: Option<String>) -> Self {
        Self {
            bind: bind
                .or_else(|| env::var("GATEWAY_BIND").ok())
                .unwrap_or_else(|| "0.0.0.0:8088".into()),
            system_prompt: system_prompt.or_else(|| env::var("GATEWAY_SYSTEM_PROMPT").ok()),
            default_tool_timeout_ms: env::var("GATEWAY_TOOL_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(agent_protocol::DEFAULT_TOOL_TIMEOUT_MS),
            token: env::var("GATEWAY_TOKEN").ok().filter(|t| !t.is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_take_precedence_over_defaults() {
        let cfg = GatewayConfig::from_env_and_flags(Some("127.0.0.1:9000".into()), None);
        assert_eq!(cfg.bind, "127.0.0.1:9000");
    }

    #[test]
    fn empty_token_env_is_treated_as_unset() {
        // GATEWAY_TOKEN may be set to "" by a shell that exports but never
        // assigns; treat that the same as not set, not as an empty secret
        // that would make every request's token comparison trivially pass.
        std::env::remove_var("GATEWAY_TOKEN");
        let cfg = GatewayConfig::from_env_and_flags(None, None);
        assert!(cfg.token.is_none());
    }
}
