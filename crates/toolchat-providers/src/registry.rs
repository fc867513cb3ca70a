//! Provider registry: static specs for the supported chat backends.
//!
//! Each `ProviderSpec` describes how to reach one backend: keywords for model
//! matching, env var for the API key, and the default API base. Local
//! backends (Ollama, vLLM) need no key; Ollama is the fallback when nothing
//! else matches.

use toolchat_core::config::ProviderConfig;

// ─────────────────────────────────────────────
// ProviderSpec: static metadata for one provider
// ─────────────────────────────────────────────

/// Static specification describing one LLM provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name (e.g. `"ollama"`).
    pub name: &'static str,
    /// Keywords to match in model names (lowercase).
    pub keywords: &'static [&'static str],
    /// Environment variable for the API key (empty for local backends).
    pub env_key: &'static str,
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Whether this is a local/self-hosted backend that needs no API key.
    pub is_local: bool,
    /// If the API key starts with this prefix, auto-detect this provider.
    pub detect_by_key_prefix: Option<&'static str>,
    /// Default API base URL.
    pub default_api_base: &'static str,
}

/// Supported providers, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    // Ollama: local default, OpenAI-compatible under /v1
    ProviderSpec {
        name: "ollama",
        keywords: &["ollama"],
        env_key: "",
        display_name: "Ollama",
        is_local: true,
        detect_by_key_prefix: None,
        default_api_base: "http://localhost:11434/v1",
    },
    // vLLM (self-hosted)
    ProviderSpec {
        name: "vllm",
        keywords: &["vllm"],
        env_key: "HOSTED_VLLM_API_KEY",
        display_name: "vLLM",
        is_local: true,
        detect_by_key_prefix: None,
        default_api_base: "http://localhost:8000/v1",
    },
    // OpenRouter: gateway, matched by key prefix "sk-or-"
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        env_key: "OPENROUTER_API_KEY",
        display_name: "OpenRouter",
        is_local: false,
        detect_by_key_prefix: Some("sk-or-"),
        default_api_base: "https://openrouter.ai/api/v1",
    },
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt"],
        env_key: "OPENAI_API_KEY",
        display_name: "OpenAI",
        is_local: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.openai.com/v1",
    },
    ProviderSpec {
        name: "groq",
        keywords: &["groq"],
        env_key: "GROQ_API_KEY",
        display_name: "Groq",
        is_local: false,
        detect_by_key_prefix: Some("gsk_"),
        default_api_base: "https://api.groq.com/openai/v1",
    },
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        env_key: "DEEPSEEK_API_KEY",
        display_name: "DeepSeek",
        is_local: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.deepseek.com/v1",
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find a provider spec by exact name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Find a hosted provider by matching keywords against a model name.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model_lower = model.to_lowercase();
    PROVIDERS.iter().find(|spec| {
        !spec.is_local && spec.keywords.iter().any(|kw| model_lower.contains(kw))
    })
}

/// Auto-detect a provider from the API key prefix.
pub fn find_by_key(api_key: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|s| {
        s.detect_by_key_prefix
            .map_or(false, |pfx| api_key.starts_with(pfx))
    })
}

/// Pick the provider for a model.
///
/// 1. An explicit `provider.name` wins (unknown names are an error).
/// 2. Key prefix detection (`sk-or-` → OpenRouter).
/// 3. Model keyword match, only when an API key is available.
/// 4. Ollama.
pub fn match_provider(
    model: &str,
    config: &ProviderConfig,
) -> Result<&'static ProviderSpec, String> {
    if let Some(name) = config.name.as_deref() {
        return find_by_name(name).ok_or_else(|| {
            let known: Vec<&str> = PROVIDERS.iter().map(|s| s.name).collect();
            format!("Unknown provider '{name}' (known: {})", known.join(", "))
        });
    }

    if config.is_configured() {
        if let Some(spec) = find_by_key(&config.api_key) {
            return Ok(spec);
        }
    }

    if let Some(spec) = find_by_model(model) {
        if config.is_configured() || resolve_api_key(config, spec).is_some() {
            return Ok(spec);
        }
    }

    Ok(&PROVIDERS[0])
}

/// API key from config, falling back to the provider's env var.
pub fn resolve_api_key(config: &ProviderConfig, spec: &ProviderSpec) -> Option<String> {
    if config.is_configured() {
        return Some(config.api_key.clone());
    }
    if spec.env_key.is_empty() {
        return None;
    }
    std::env::var(spec.env_key).ok().filter(|k| !k.is_empty())
}

/// Strip a leading `"<provider>/"` routing prefix from the model name
/// (`"ollama/llama3.2"` → `"llama3.2"`). Other slashes are kept, since
/// gateway model ids such as `"meta-llama/llama-3"` contain them.
pub fn resolve_model_name(model: &str, spec: &ProviderSpec) -> String {
    model
        .strip_prefix(spec.name)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(model)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: Option<&str>, key: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.map(String::from),
            api_key: key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_is_ollama() {
        let spec = match_provider("llama3.2", &config(None, "")).unwrap();
        assert_eq!(spec.name, "ollama");
        assert!(spec.is_local);
    }

    #[test]
    fn test_explicit_name() {
        let spec = match_provider("anything", &config(Some("vllm"), "")).unwrap();
        assert_eq!(spec.display_name, "vLLM");
    }

    #[test]
    fn test_unknown_name_is_error() {
        let err = match_provider("x", &config(Some("nope"), "")).unwrap_err();
        assert!(err.contains("Unknown provider 'nope'"));
        assert!(err.contains("ollama"));
    }

    #[test]
    fn test_key_prefix_detection() {
        let spec = match_provider("meta-llama/llama-3", &config(None, "sk-or-abc")).unwrap();
        assert_eq!(spec.name, "openrouter");
    }

    #[test]
    fn test_model_keyword_needs_key() {
        let spec = match_provider("gpt-4o-mini", &config(None, "sk-test")).unwrap();
        assert_eq!(spec.name, "openai");
    }

    #[test]
    fn test_resolve_model_name() {
        let ollama = find_by_name("ollama").unwrap();
        assert_eq!(resolve_model_name("ollama/llama3.2", ollama), "llama3.2");
        assert_eq!(resolve_model_name("llama3.2", ollama), "llama3.2");
        let openrouter = find_by_name("openrouter").unwrap();
        assert_eq!(
            resolve_model_name("meta-llama/llama-3", openrouter),
            "meta-llama/llama-3"
        );
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let spec = find_by_name("openai").unwrap();
        assert_eq!(
            resolve_api_key(&config(None, "sk-cfg"), spec).as_deref(),
            Some("sk-cfg")
        );
        let ollama = find_by_name("ollama").unwrap();
        assert!(resolve_api_key(&config(None, ""), ollama).is_none());
    }
}
