use crate::error::TldrError;
use crate::tldr::truncate::TruncationWindow;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TLDR_PROMPT: &str = "Please provide a concise TL;DR summary of the following article in 1-2 sentences. Focus on the main points and key takeaways.";
pub const DEFAULT_LABEL_LANGUAGE: &str = "English";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 30,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TldrSettings {
    pub prompt: String,
    pub max_tokens: u32,
    pub min_article_length: usize,
    pub fallback_max_chars: usize,
    pub truncate_trigger_length: usize,
    pub truncate_keep_start: usize,
    pub truncate_keep_end: usize,
    pub enabled_feeds: BTreeSet<i64>,
}

impl Default for TldrSettings {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_TLDR_PROMPT.to_string(),
            max_tokens: 150,
            min_article_length: 200,
            fallback_max_chars: 15_000,
            truncate_trigger_length: 1_200,
            truncate_keep_start: 1_000,
            truncate_keep_end: 200,
            enabled_feeds: BTreeSet::new(),
        }
    }
}

impl TldrSettings {
    pub fn window(&self) -> TruncationWindow {
        TruncationWindow {
            trigger_length: self.truncate_trigger_length,
            keep_start: self.truncate_keep_start,
            keep_end: self.truncate_keep_end,
            fallback_max_chars: self.fallback_max_chars,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutotagSettings {
    pub enabled: bool,
    pub model: String,
    pub label_language: String,
    pub max_tags: usize,
    pub min_article_length: usize,
    pub fallback_max_chars: usize,
    pub truncate_trigger_length: usize,
    pub truncate_keep_start: usize,
    pub truncate_keep_end: usize,
    pub enabled_feeds: BTreeSet<i64>,
}

impl Default for AutotagSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: DEFAULT_MODEL.to_string(),
            label_language: DEFAULT_LABEL_LANGUAGE.to_string(),
            max_tags: 5,
            min_article_length: 50,
            fallback_max_chars: 10_000,
            truncate_trigger_length: 1_000,
            truncate_keep_start: 800,
            truncate_keep_end: 200,
            enabled_feeds: BTreeSet::new(),
        }
    }
}

impl AutotagSettings {
    pub fn window(&self) -> TruncationWindow {
        TruncationWindow {
            trigger_length: self.truncate_trigger_length,
            keep_start: self.truncate_keep_start,
            keep_end: self.truncate_keep_end,
            fallback_max_chars: self.fallback_max_chars,
        }
    }
}

/// Immutable configuration snapshot handed to every pipeline call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub openai: OpenAiSettings,
    pub http: HttpSettings,
    pub tldr: TldrSettings,
    pub autotag: AutotagSettings,
}

impl Settings {
    pub fn tldr_enabled_for(&self, feed_id: i64) -> bool {
        self.tldr.enabled_feeds.contains(&feed_id)
    }

    pub fn autotag_enabled_for(&self, feed_id: i64) -> bool {
        self.autotag.enabled && self.autotag.enabled_feeds.contains(&feed_id)
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    env_non_empty(var).unwrap_or_else(|| fallback.to_string())
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    env_non_empty(var)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    env_non_empty(var)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(fallback)
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    env_non_empty(var)
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(fallback)
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env_non_empty(var).as_deref() {
        Some("1" | "true" | "TRUE" | "yes" | "on") => true,
        Some("0" | "false" | "FALSE" | "no" | "off") => false,
        _ => fallback,
    }
}

fn parse_feed_csv(raw: &str) -> BTreeSet<i64> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn env_or_feed_set(var: &str, fallback: &BTreeSet<i64>) -> BTreeSet<i64> {
    match env::var(var) {
        Ok(v) => parse_feed_csv(&v),
        Err(_) => fallback.clone(),
    }
}

fn apply_env_overrides(cfg: &mut Settings) {
    cfg.openai.api_key = env_non_empty("TLDR_OPENAI_API_KEY")
        .or_else(|| env_non_empty("OPENAI_API_KEY"))
        .unwrap_or_else(|| cfg.openai.api_key.clone());
    cfg.openai.base_url = env_or_string("TLDR_OPENAI_BASE_URL", &cfg.openai.base_url);
    cfg.openai.model = env_or_string("TLDR_OPENAI_MODEL", &cfg.openai.model);

    cfg.http.timeout_secs = env_or_u64("TLDR_CURL_TIMEOUT", cfg.http.timeout_secs);
    cfg.http.connect_timeout_secs =
        env_or_u64("TLDR_CURL_CONNECT_TIMEOUT", cfg.http.connect_timeout_secs);

    cfg.tldr.prompt = env_or_string("TLDR_TLDR_PROMPT", &cfg.tldr.prompt);
    cfg.tldr.max_tokens = env_or_u32("TLDR_TLDR_MAX_TOKENS", cfg.tldr.max_tokens);
    cfg.tldr.min_article_length =
        env_or_usize("TLDR_TLDR_MIN_ARTICLE_LENGTH", cfg.tldr.min_article_length);
    cfg.tldr.fallback_max_chars =
        env_or_usize("TLDR_TLDR_FALLBACK_MAX_CHARS", cfg.tldr.fallback_max_chars);
    cfg.tldr.truncate_trigger_length = env_or_usize(
        "TLDR_TLDR_TRUNCATE_TRIGGER_LENGTH",
        cfg.tldr.truncate_trigger_length,
    );
    cfg.tldr.truncate_keep_start =
        env_or_usize("TLDR_TLDR_TRUNCATE_KEEP_START", cfg.tldr.truncate_keep_start);
    cfg.tldr.truncate_keep_end =
        env_or_usize("TLDR_TLDR_TRUNCATE_KEEP_END", cfg.tldr.truncate_keep_end);
    cfg.tldr.enabled_feeds = env_or_feed_set("TLDR_TLDR_ENABLED_FEEDS", &cfg.tldr.enabled_feeds);

    cfg.autotag.enabled = env_or_bool("TLDR_AUTOTAG_ENABLED", cfg.autotag.enabled);
    cfg.autotag.model = env_or_string("TLDR_AUTOTAG_OPENAI_MODEL", &cfg.autotag.model);
    cfg.autotag.label_language =
        env_or_string("TLDR_AUTOTAG_LABEL_LANGUAGE", &cfg.autotag.label_language);
    cfg.autotag.max_tags = env_or_usize("TLDR_AUTOTAG_MAX_TAGS", cfg.autotag.max_tags);
    cfg.autotag.min_article_length = env_or_usize(
        "TLDR_AUTOTAG_MIN_ARTICLE_LENGTH",
        cfg.autotag.min_article_length,
    );
    cfg.autotag.fallback_max_chars = env_or_usize(
        "TLDR_AUTOTAG_FALLBACK_MAX_CHARS",
        cfg.autotag.fallback_max_chars,
    );
    cfg.autotag.truncate_trigger_length = env_or_usize(
        "TLDR_AUTOTAG_TRUNCATE_TRIGGER_LENGTH",
        cfg.autotag.truncate_trigger_length,
    );
    cfg.autotag.truncate_keep_start = env_or_usize(
        "TLDR_AUTOTAG_TRUNCATE_KEEP_START",
        cfg.autotag.truncate_keep_start,
    );
    cfg.autotag.truncate_keep_end = env_or_usize(
        "TLDR_AUTOTAG_TRUNCATE_KEEP_END",
        cfg.autotag.truncate_keep_end,
    );
    cfg.autotag.enabled_feeds =
        env_or_feed_set("TLDR_AUTOTAG_ENABLED_FEEDS", &cfg.autotag.enabled_feeds);
}

fn default_if_blank(value: &mut String, fallback: &str) {
    let trimmed = value.trim();
    *value = if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    };
}

/// Blank strings and zero budgets fall back to their defaults; zero is a
/// meaningful value only for the truncation trigger/keep knobs and the
/// minimum-length gates.
pub fn normalize(cfg: &mut Settings) {
    let http = HttpSettings::default();
    let tldr = TldrSettings::default();
    let autotag = AutotagSettings::default();

    cfg.openai.api_key = cfg.openai.api_key.trim().to_string();
    default_if_blank(&mut cfg.openai.base_url, DEFAULT_BASE_URL);
    default_if_blank(&mut cfg.openai.model, DEFAULT_MODEL);
    default_if_blank(&mut cfg.tldr.prompt, DEFAULT_TLDR_PROMPT);
    default_if_blank(&mut cfg.autotag.model, DEFAULT_MODEL);
    default_if_blank(&mut cfg.autotag.label_language, DEFAULT_LABEL_LANGUAGE);

    if cfg.http.timeout_secs == 0 {
        cfg.http.timeout_secs = http.timeout_secs;
    }
    if cfg.http.connect_timeout_secs == 0 {
        cfg.http.connect_timeout_secs = http.connect_timeout_secs;
    }
    if cfg.tldr.max_tokens == 0 {
        cfg.tldr.max_tokens = tldr.max_tokens;
    }
    if cfg.tldr.fallback_max_chars == 0 {
        cfg.tldr.fallback_max_chars = tldr.fallback_max_chars;
    }
    if cfg.autotag.max_tags == 0 {
        cfg.autotag.max_tags = autotag.max_tags;
    }
    if cfg.autotag.fallback_max_chars == 0 {
        cfg.autotag.fallback_max_chars = autotag.fallback_max_chars;
    }
}

fn is_valid_api_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix("sk-") else {
        return false;
    };
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn validate(cfg: &Settings) -> Result<(), TldrError> {
    if cfg.openai.api_key.is_empty() {
        return Err(TldrError::Config("OpenAI API key is required".to_string()));
    }
    if !is_valid_api_key(&cfg.openai.api_key) {
        return Err(TldrError::Config(
            "invalid OpenAI API key format: expected sk-[A-Za-z0-9_-]+".to_string(),
        ));
    }
    let parsed = url::Url::parse(&cfg.openai.base_url).map_err(|err| {
        TldrError::Config(format!(
            "invalid OpenAI base URL `{}`: {err}",
            cfg.openai.base_url
        ))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(TldrError::Config(format!(
            "invalid OpenAI base URL `{}`: expected an http(s) URL with a host",
            cfg.openai.base_url
        )));
    }
    Ok(())
}

pub fn parse_settings(raw: &str) -> Result<Settings> {
    toml::from_str(raw).map_err(|err| anyhow!("failed to parse tldr config: {err}"))
}

fn merge_file_config(base: &mut Settings, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| anyhow!("failed to read tldr config {}: {err}", path.display()))?;
    *base = parse_settings(&raw).map_err(|err| anyhow!("{}: {err}", path.display()))?;
    Ok(())
}

/// Build the per-invocation snapshot: defaults, then the TOML file, then
/// `TLDR_*` environment overrides, then normalization and validation.
pub fn load_config(config_file: &Path) -> Result<Settings> {
    let mut cfg = Settings::default();
    merge_file_config(&mut cfg, config_file)?;
    apply_env_overrides(&mut cfg);
    normalize(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}
