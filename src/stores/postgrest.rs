//! PostgREST-style HTTP backend.
//!
//! Upserts are `POST /rest/v1/{table}?on_conflict={key}` with
//! `Prefer: resolution=merge-duplicates`; id resolution is a plain filtered
//! select. The service key travels both as `apikey` and as a bearer token,
//! which is what PostgREST deployments behind an API gateway expect.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use url::Url;

use super::{Backend, KeyedId};
use crate::types::PipelineError;

pub struct PostgrestStore {
    client: Client,
    base: Url,
    service_key: String,
}

impl PostgrestStore {
    pub fn new(client: Client, base: Url, service_key: impl Into<String>) -> Self {
        Self {
            client,
            base,
            service_key: service_key.into(),
        }
    }

    fn table_url(&self, table: &str) -> Result<Url, PipelineError> {
        self.base
            .join(&format!("rest/v1/{table}"))
            .map_err(|err| PipelineError::Store(format!("invalid table url for '{table}': {err}")))
    }
}

#[async_trait]
impl Backend for PostgrestStore {
    async fn upsert(
        &self,
        table: &str,
        conflict_key: &str,
        rows: &[Value],
    ) -> Result<(), PipelineError> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = self.table_url(table)?;
        self.client
            .post(url)
            .query(&[("on_conflict", conflict_key)])
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| PipelineError::Store(format!("upsert into '{table}' failed: {err}")))?;
        Ok(())
    }

    async fn select_ids(
        &self,
        table: &str,
        key_column: &str,
        keys: &[String],
    ) -> Result<Vec<KeyedId>, PipelineError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.table_url(table)?;
        let select = format!("id,{key_column}");
        let filter = format!(
            "in.({})",
            keys.iter()
                .map(|key| quoted(key))
                .collect::<Vec<_>>()
                .join(",")
        );
        let response = self
            .client
            .get(url)
            .query(&[("select", select.as_str()), (key_column, filter.as_str())])
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| {
                PipelineError::Store(format!("id read-back from '{table}' failed: {err}"))
            })?;
        let rows: Vec<Map<String, Value>> = response
            .json()
            .await
            .map_err(|err| PipelineError::Store(format!("malformed read-back rows: {err}")))?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| PipelineError::Store(format!("row in '{table}' missing id")))?;
            let key = row
                .get(key_column)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    PipelineError::Store(format!("row in '{table}' missing '{key_column}'"))
                })?
                .to_string();
            ids.push(KeyedId { id, key });
        }
        Ok(ids)
    }
}

/// PostgREST `in.(...)` values are quoted so ids containing commas or
/// reserved characters survive; embedded quotes are stripped rather than
/// escaped since no natural key legitimately contains one.
fn quoted(key: &str) -> String {
    format!("\"{}\"", key.replace('"', ""))
}
