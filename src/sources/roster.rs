//! Static investor roster loader.
//!
//! The roster is a local JSON array of investor objects maintained by hand.
//! Each object is carried into the profile payload verbatim so no curated
//! field is lost, however the roster schema evolves.

use std::path::Path;

use serde_json::{Map, Value};
use tokio::fs;
use tracing::info;

use crate::types::{PipelineError, Profile};

/// Reads and normalizes the roster document. A missing or malformed file is
/// fatal; the roster is the sole source for the investor pipeline.
pub async fn load_investors(path: &Path) -> Result<Vec<Profile>, PipelineError> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|err| PipelineError::Roster(format!("{}: {err}", path.display())))?;
    let entries: Vec<Map<String, Value>> = serde_json::from_str(&raw).map_err(|err| {
        PipelineError::Roster(format!("{} is not a valid roster: {err}", path.display()))
    })?;

    let mut profiles = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let Some(key) = investor_key(&entry) else {
            return Err(PipelineError::Roster(format!(
                "investor #{index} has neither 'id' nor 'name'"
            )));
        };
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&key)
            .to_string();
        profiles.push(Profile {
            key,
            name,
            details: entry,
        });
    }

    info!(count = profiles.len(), path = %path.display(), "investor roster loaded");
    Ok(profiles)
}

fn investor_key(entry: &Map<String, Value>) -> Option<String> {
    match entry.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => return Some(id.trim().to_string()),
        Some(Value::Number(id)) => return Some(id.to_string()),
        _ => {}
    }
    entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
