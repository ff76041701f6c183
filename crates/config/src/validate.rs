//! Configuration validation engine.
//!
//! Checks a config file against the known schema, flags unknown or misspelled
//! keys, and rejects credentials that are missing or still placeholders.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use secrecy::{ExposeSecret, Secret};

use crate::{
    env_subst::substitute_env_with,
    loader::{apply_env_overrides_with, find_config_file, parse_config_value},
    schema::CourierConfig,
};

/// Telegram rejects longer messages.
const MAX_MESSAGE_LEN: usize = 4096;

/// Replies are chunked 32 chars short of the limit to fit the continuation
/// marker, so the limit has to leave room for text after that.
const MIN_MESSAGE_LEN: usize = 33;

/// Telegram caps the `getUpdates` long-poll timeout at 50 seconds.
const MAX_POLL_TIMEOUT_SECS: u32 = 50;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "credentials",
    /// "limits", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "telegram.token"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}]: {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.category, self.path, self.message
            )
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Expected shape of the configuration.
enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    /// Scalar value, stop recursion.
    Leaf,
}

/// Mirrors every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([
        (
            "telegram",
            Struct(HashMap::from([
                ("token", Leaf),
                ("poll_timeout_secs", Leaf),
                ("register_commands", Leaf),
            ])),
        ),
        (
            "gemini",
            Struct(HashMap::from([
                ("api_key", Leaf),
                ("model", Leaf),
                ("vision_model", Leaf),
                ("base_url", Leaf),
                ("request_timeout_secs", Leaf),
                ("max_output_tokens", Leaf),
            ])),
        ),
        (
            "chat",
            Struct(HashMap::from([
                ("max_message_len", Leaf),
                ("image_prompt", Leaf),
            ])),
        ),
    ]))
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    if a.is_empty() {
        return b_len;
    }
    if b.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

/// Validate the config at `path`, or the discovered config file when `None`.
///
/// Credentials are checked on the effective config, i.e. after
/// `TELEGRAM_BOT_TOKEN`/`GEMINI_API_KEY` overrides, so a file without secrets
/// is valid when the environment provides them.
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let lookup = |name: &str| std::env::var(name).ok();
    let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

    let Some(actual_path) = config_path else {
        let mut config = CourierConfig::default();
        apply_env_overrides_with(&mut config, lookup);
        let mut diagnostics = vec![Diagnostic::new(
            Severity::Info,
            "file-ref",
            "",
            "no config file found; using defaults and environment",
        )];
        diagnostics.extend(check_config(&config));
        return ValidationResult {
            diagnostics,
            config_path: None,
        };
    };

    match std::fs::read_to_string(&actual_path) {
        Ok(content) => {
            let mut result = validate_str_with(&content, &actual_path, lookup);
            result.config_path = Some(actual_path);
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "file-ref",
                "",
                format!("failed to read config file {}: {e}", actual_path.display()),
            )],
            config_path: Some(actual_path),
        },
    }
}

/// `path` only selects the format by extension.
fn validate_str_with(
    raw: &str,
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> ValidationResult {
    let mut diagnostics = Vec::new();
    let raw = substitute_env_with(raw, &lookup);

    // 1. Syntax
    let value = match parse_config_value(&raw, path) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                e.to_string(),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields
    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    // 3. Types
    let mut config = match serde_json::from_value::<CourierConfig>(value) {
        Ok(config) => config,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "type-error",
                "",
                format!("type error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 4. Semantics, on the effective config
    apply_env_overrides_with(&mut config, &lookup);
    diagnostics.extend(check_config(&config));

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (serde_json::Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        // Leaf or type mismatch; type errors are caught by deserialization.
        return;
    };

    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let message = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
            None => "unknown field".to_string(),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "unknown-field",
            path,
            message,
        ));
    }
}

/// Semantic checks on a parsed config.
pub fn check_config(config: &CourierConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    check_secret(
        config.telegram.token.as_ref(),
        "telegram.token",
        "TELEGRAM_BOT_TOKEN",
        &mut diagnostics,
    );
    if let Some(token) = &config.telegram.token
        && !is_placeholder(token.expose_secret())
        && !looks_like_bot_token(token.expose_secret())
    {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "credentials",
            "telegram.token",
            "token does not look like <bot id>:<secret>",
        ));
    }
    check_secret(
        config.gemini.api_key.as_ref(),
        "gemini.api_key",
        "GEMINI_API_KEY",
        &mut diagnostics,
    );

    if config.telegram.poll_timeout_secs > MAX_POLL_TIMEOUT_SECS {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "limits",
            "telegram.poll_timeout_secs",
            format!(
                "{}s exceeds Telegram's {MAX_POLL_TIMEOUT_SECS}s long-poll limit",
                config.telegram.poll_timeout_secs
            ),
        ));
    }

    for (path, model) in [
        ("gemini.model", &config.gemini.model),
        ("gemini.vision_model", &config.gemini.vision_model),
    ] {
        if model.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "limits",
                path,
                "model name must not be empty",
            ));
        }
    }

    let base_url = config.gemini.base_url.as_str();
    if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "limits",
            "gemini.base_url",
            format!("\"{base_url}\" is not an http(s) URL"),
        ));
    }
    if config.gemini.request_timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "limits",
            "gemini.request_timeout_secs",
            "timeout must be at least 1 second",
        ));
    }
    if config.gemini.max_output_tokens == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "limits",
            "gemini.max_output_tokens",
            "must be at least 1",
        ));
    }

    let max_len = config.chat.max_message_len;
    if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&max_len) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "limits",
            "chat.max_message_len",
            format!("{max_len} is outside {MIN_MESSAGE_LEN}..={MAX_MESSAGE_LEN}"),
        ));
    }
    if config
        .chat
        .image_prompt
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "limits",
            "chat.image_prompt",
            "prompt must not be blank; remove it to use the default",
        ));
    }

    diagnostics
}

fn check_secret(
    secret: Option<&Secret<String>>,
    path: &'static str,
    env_var: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let message = match secret.map(|s| s.expose_secret().trim()) {
        None | Some("") => format!("missing; set it in the config file or via {env_var}"),
        Some(value) if is_placeholder(value) => {
            format!("still a placeholder; set it in the config file or via {env_var}")
        },
        Some(_) => return,
    };
    diagnostics.push(Diagnostic::new(
        Severity::Error,
        "credentials",
        path,
        message,
    ));
}

fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.to_ascii_uppercase().starts_with("YOUR_")
        || value.contains("${")
        || value.eq_ignore_ascii_case("changeme")
}

/// `<digits>:<secret>`, as issued by BotFather.
fn looks_like_bot_token(token: &str) -> bool {
    token.split_once(':').is_some_and(|(id, secret)| {
        !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && !secret.is_empty()
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[telegram]
token = "123456:ABC-def"

[gemini]
api_key = "AIza-test"
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn validate_toml(raw: &str) -> ValidationResult {
        validate_str_with(raw, Path::new("courier.toml"), no_env)
    }

    fn find<'a>(result: &'a ValidationResult, path: &str) -> Option<&'a Diagnostic> {
        result.diagnostics.iter().find(|d| d.path == path)
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("token", "token"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("tokn", "token"), 1);
        assert_eq!(levenshtein("modle", "model"), 2);
    }

    #[test]
    fn valid_config_has_no_diagnostics() {
        let result = validate_toml(VALID);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn missing_credentials_are_errors() {
        let result = validate_toml("");
        assert!(result.has_errors());
        let token = find(&result, "telegram.token").unwrap();
        assert_eq!(token.category, "credentials");
        assert!(token.message.contains("TELEGRAM_BOT_TOKEN"));
        assert!(find(&result, "gemini.api_key").is_some());
    }

    #[test]
    fn environment_supplies_credentials() {
        let lookup = |name: &str| match name {
            "TELEGRAM_BOT_TOKEN" => Some("42:from-env".to_string()),
            "GEMINI_API_KEY" => Some("env-key".to_string()),
            _ => None,
        };
        let result = validate_str_with("", Path::new("courier.toml"), lookup);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn placeholders_are_rejected() {
        for raw in [
            "[telegram]\ntoken = \"YOUR_TELEGRAM_BOT_TOKEN\"\n",
            "[telegram]\ntoken = \"${UNSET_COURIER_TOKEN}\"\n",
            "[telegram]\ntoken = \"changeme\"\n",
        ] {
            let result = validate_toml(raw);
            let d = find(&result, "telegram.token").unwrap();
            assert_eq!(d.severity, Severity::Error);
            assert!(d.message.contains("placeholder"), "{raw}: {}", d.message);
        }
    }

    #[test]
    fn substituted_variables_count_as_set() {
        let lookup = |name: &str| (name == "MY_TOKEN").then(|| "7:abc".to_string());
        let raw = "[telegram]\ntoken = \"${MY_TOKEN}\"\n[gemini]\napi_key = \"k\"\n";
        let result = validate_str_with(raw, Path::new("courier.toml"), lookup);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn malformed_token_is_a_warning() {
        let raw = VALID.replace("123456:ABC-def", "not-a-token");
        let result = validate_toml(&raw);
        assert!(!result.has_errors());
        assert_eq!(
            find(&result, "telegram.token").unwrap().severity,
            Severity::Warning
        );
    }

    #[test]
    fn unknown_key_warns_with_suggestion() {
        let raw = format!("{VALID}\n[chat]\nmax_mesage_len = 100\n");
        let result = validate_toml(&raw);
        let d = find(&result, "chat.max_mesage_len").unwrap();
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.category, "unknown-field");
        assert!(d.message.contains("max_message_len"), "{}", d.message);
        assert!(!result.has_errors());
    }

    #[test]
    fn unknown_top_level_section() {
        let raw = format!("{VALID}\n[gemni]\nmodel = \"x\"\n");
        let result = validate_toml(&raw);
        assert!(find(&result, "gemni").unwrap().message.contains("gemini"));
    }

    #[test]
    fn message_len_bounds() {
        for (len, ok) in [
            (0, false),
            (1, false),
            (32, false),
            (33, true),
            (4096, true),
            (4097, false),
        ] {
            let raw = format!("{VALID}\n[chat]\nmax_message_len = {len}\n");
            let result = validate_toml(&raw);
            assert_eq!(!result.has_errors(), ok, "len {len}");
        }
    }

    #[test]
    fn zero_timeout_and_bad_url_are_errors() {
        let raw = VALID.replace(
            "api_key = \"AIza-test\"",
            "api_key = \"AIza-test\"\nrequest_timeout_secs = 0\nbase_url = \"ftp://x\"",
        );
        let result = validate_toml(&raw);
        assert_eq!(result.count(Severity::Error), 2, "{:?}", result.diagnostics);
        assert!(find(&result, "gemini.base_url").is_some());
        assert!(find(&result, "gemini.request_timeout_secs").is_some());
    }

    #[test]
    fn long_poll_timeout_warns() {
        let raw = VALID.replace(
            "token = \"123456:ABC-def\"",
            "token = \"123456:ABC-def\"\npoll_timeout_secs = 90",
        );
        let result = validate_toml(&raw);
        assert_eq!(result.count(Severity::Warning), 1);
        assert!(!result.has_errors());
    }

    #[test]
    fn type_errors_are_reported() {
        let raw = format!("{VALID}\n[chat]\nmax_message_len = \"long\"\n");
        let result = validate_toml(&raw);
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.category == "type-error")
        );
    }

    #[test]
    fn syntax_error_stops_validation() {
        let result = validate_toml("[telegram\n");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn yaml_is_validated_too() {
        let raw = "telegram:\n  token: \"1:a\"\n  tokn: x\ngemini:\n  api_key: k\n";
        let result = validate_str_with(raw, Path::new("courier.yaml"), no_env);
        let d = find(&result, "telegram.tokn").unwrap();
        assert!(d.message.contains("token"));
    }

    #[test]
    fn validate_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        std::fs::write(&path, "[chat]\nmax_message_len = 0\n").unwrap();
        let result = validate(Some(&path));
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
        assert!(find(&result, "chat.max_message_len").is_some());
    }

    #[test]
    fn validate_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate(Some(&dir.path().join("nope.toml")));
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "file-ref");
    }
}
