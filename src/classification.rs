//! Memoized industry classification lookup.
//!
//! The registry labels companies with bare industry codes; the classification
//! service maps codes to human-readable labels. The full table is fetched at
//! most once per run and shared read-only afterwards. A failed fetch is
//! remembered as an empty table rather than retried, and downstream code
//! falls back to rendering the raw code.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::types::PipelineError;

const TARGET_LANGUAGE: &str = "EN";
const SOURCE_LANGUAGE: &str = "FI";

/// One resolved classification entry.
///
/// `needs_translation` is set when only a source-language label was
/// available; the registry adapter routes such labels through the translator.
#[derive(Clone, Debug, PartialEq)]
pub struct IndustryClass {
    pub code: String,
    pub label: String,
    pub needs_translation: bool,
}

#[derive(Default)]
struct CacheState {
    attempted: bool,
    table: Arc<HashMap<String, IndustryClass>>,
}

/// Lazily-populated classification table.
///
/// `attempted` distinguishes "not yet loaded" from "loaded empty", so a
/// service outage costs one request per run, not one per company.
pub struct ClassificationCache {
    client: Client,
    endpoint: Url,
    state: Mutex<CacheState>,
}

impl ClassificationCache {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the code-to-entry table, fetching it on first use.
    pub async fn classifications(&self) -> Arc<HashMap<String, IndustryClass>> {
        let mut state = self.state.lock().await;
        if state.attempted {
            return Arc::clone(&state.table);
        }
        state.attempted = true;
        match self.fetch().await {
            Ok(table) => {
                debug!(entries = table.len(), "classification table loaded");
                state.table = Arc::new(table);
            }
            Err(err) => {
                warn!(error = %err, "classification fetch failed; industry codes will not be labeled");
            }
        }
        Arc::clone(&state.table)
    }

    async fn fetch(&self) -> Result<HashMap<String, IndustryClass>, PipelineError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await?
            .error_for_status()?;
        let entries: Vec<ClassEntry> = response
            .json()
            .await
            .map_err(|err| PipelineError::Fetch(format!("malformed classification table: {err}")))?;

        let mut table = HashMap::with_capacity(entries.len());
        for entry in entries {
            let (label, needs_translation) = select_label(&entry.descriptions);
            table.insert(
                entry.code.clone(),
                IndustryClass {
                    code: entry.code,
                    label,
                    needs_translation,
                },
            );
        }
        Ok(table)
    }
}

/// Prefers the target-language label, falls back to the source language,
/// else yields an empty label.
fn select_label(descriptions: &[ClassDescription]) -> (String, bool) {
    if let Some(label) = label_in(descriptions, TARGET_LANGUAGE) {
        return (label, false);
    }
    if let Some(label) = label_in(descriptions, SOURCE_LANGUAGE) {
        return (label, true);
    }
    (String::new(), false)
}

fn label_in(descriptions: &[ClassDescription], language: &str) -> Option<String> {
    descriptions
        .iter()
        .filter(|d| d.language_code.as_deref() == Some(language))
        .find_map(|d| {
            d.description
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassEntry {
    code: String,
    #[serde(default)]
    descriptions: Vec<ClassDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassDescription {
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}
