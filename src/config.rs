//! Environment-driven pipeline settings.
//!
//! Every external collaborator (registry, classification service, translator,
//! embedding service, store) has an env-overridable endpoint so test runs can
//! point the pipeline at local mock servers. Credentials are read here but
//! only validated by the pipeline that actually needs them.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::stores::DEFAULT_WRITE_BATCH;
use crate::types::PipelineError;

/// Companies fetched per registry run when `FETCH_TARGET` is unset.
pub const DEFAULT_FETCH_TARGET: usize = 300;

const DEFAULT_REGISTRY_URL: &str = "https://avoindata.prh.fi/opendata-ytj-api/v3/companies";
const DEFAULT_CLASSIFICATION_URL: &str = "https://avoindata.prh.fi/opendata-ytj-api/v3/description";
const DEFAULT_TRANSLATION_URL: &str = "https://api-free.deepl.com/v2/translate";
const DEFAULT_EMBEDDING_URL: &str = "https://api.jina.ai/v1/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "jina-embeddings-v3";
const DEFAULT_ROSTER_PATH: &str = "data/investors.json";

#[derive(Clone, Debug)]
pub struct Settings {
    pub store_url: Option<Url>,
    pub store_key: Option<String>,
    pub embedding_key: Option<String>,
    pub translation_key: Option<String>,
    pub registry_url: Url,
    pub classification_url: Url,
    pub translation_url: Url,
    pub embedding_url: Url,
    pub embedding_model: String,
    pub roster_path: PathBuf,
    pub fetch_target: usize,
    pub write_batch_size: usize,
    pub embeddings_enabled: bool,
    /// Politeness pause between registry page requests.
    pub page_pause: Duration,
    /// Pause between embedding batches, sized to the provider's per-minute ceiling.
    pub batch_pause: Duration,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        Ok(Self {
            store_url: opt_url(&lookup, "STORE_URL")?,
            store_key: non_empty(lookup("STORE_SERVICE_KEY")),
            embedding_key: non_empty(lookup("EMBEDDING_API_KEY")),
            translation_key: non_empty(lookup("TRANSLATION_API_KEY")),
            registry_url: url_or(&lookup, "REGISTRY_API_URL", DEFAULT_REGISTRY_URL)?,
            classification_url: url_or(
                &lookup,
                "CLASSIFICATION_API_URL",
                DEFAULT_CLASSIFICATION_URL,
            )?,
            translation_url: url_or(&lookup, "TRANSLATION_API_URL", DEFAULT_TRANSLATION_URL)?,
            embedding_url: url_or(&lookup, "EMBEDDING_API_URL", DEFAULT_EMBEDDING_URL)?,
            embedding_model: lookup("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            roster_path: lookup("INVESTOR_ROSTER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROSTER_PATH)),
            fetch_target: number_or(&lookup, "FETCH_TARGET", DEFAULT_FETCH_TARGET)?,
            write_batch_size: number_or(&lookup, "STORE_WRITE_BATCH", DEFAULT_WRITE_BATCH)?,
            embeddings_enabled: flag_or(&lookup, "EMBEDDINGS_ENABLED", true),
            page_pause: Duration::from_millis(
                number_or(&lookup, "REGISTRY_PAGE_PAUSE_MS", 500)? as u64,
            ),
            batch_pause: Duration::from_secs(
                number_or(&lookup, "EMBEDDING_BATCH_PAUSE_SECS", 60)? as u64,
            ),
        })
    }

    /// Store endpoint and credential, required by every pipeline.
    pub fn require_store(&self) -> Result<(&Url, &str), PipelineError> {
        let url = self
            .store_url
            .as_ref()
            .ok_or_else(|| missing("STORE_URL"))?;
        let key = self
            .store_key
            .as_deref()
            .ok_or_else(|| missing("STORE_SERVICE_KEY"))?;
        Ok((url, key))
    }

    pub fn require_embedding_key(&self) -> Result<&str, PipelineError> {
        self.embedding_key
            .as_deref()
            .ok_or_else(|| missing("EMBEDDING_API_KEY"))
    }

    pub fn require_translation_key(&self) -> Result<&str, PipelineError> {
        self.translation_key
            .as_deref()
            .ok_or_else(|| missing("TRANSLATION_API_KEY"))
    }
}

fn missing(name: &str) -> PipelineError {
    PipelineError::Config(format!("{name} is not set"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn opt_url(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<Url>, PipelineError> {
    match non_empty(lookup(name)) {
        Some(raw) => Url::parse(&raw)
            .map(Some)
            .map_err(|err| PipelineError::Config(format!("{name} is not a valid URL: {err}"))),
        None => Ok(None),
    }
}

fn url_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<Url, PipelineError> {
    let raw = non_empty(lookup(name)).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|err| PipelineError::Config(format!("{name} is not a valid URL: {err}")))
}

fn number_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
) -> Result<usize, PipelineError> {
    match non_empty(lookup(name)) {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| PipelineError::Config(format!("{name} must be a number, got '{raw}'"))),
        None => Ok(default),
    }
}

fn flag_or(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    match non_empty(lookup(name)) {
        Some(raw) => raw == "1" || raw.eq_ignore_ascii_case("true"),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> Result<Settings, PipelineError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = settings_from(&[]).unwrap();
        assert!(settings.store_url.is_none());
        assert_eq!(settings.fetch_target, DEFAULT_FETCH_TARGET);
        assert_eq!(settings.write_batch_size, DEFAULT_WRITE_BATCH);
        assert!(settings.embeddings_enabled);
        assert_eq!(settings.batch_pause, Duration::from_secs(60));
        assert_eq!(settings.embedding_model, DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn overrides_are_read() {
        let settings = settings_from(&[
            ("STORE_URL", "http://localhost:4000"),
            ("STORE_SERVICE_KEY", "svc"),
            ("FETCH_TARGET", "25"),
            ("EMBEDDINGS_ENABLED", "false"),
            ("REGISTRY_PAGE_PAUSE_MS", "0"),
        ])
        .unwrap();

        let (url, key) = settings.require_store().unwrap();
        assert_eq!(url.as_str(), "http://localhost:4000/");
        assert_eq!(key, "svc");
        assert_eq!(settings.fetch_target, 25);
        assert!(!settings.embeddings_enabled);
        assert_eq!(settings.page_pause, Duration::ZERO);
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let settings = settings_from(&[]).unwrap();
        assert!(matches!(
            settings.require_store(),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            settings.require_embedding_key(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let result = settings_from(&[("FETCH_TARGET", "many")]);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let settings = settings_from(&[("STORE_SERVICE_KEY", "  "), ("FETCH_TARGET", "")]).unwrap();
        assert!(settings.store_key.is_none());
        assert_eq!(settings.fetch_target, DEFAULT_FETCH_TARGET);
    }
}
