//! Core record types and the shared pipeline error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A normalized entity produced by one of the source adapters.
///
/// `key` is the stable source identifier (business id for registry companies,
/// investor id for roster entries) and doubles as the upsert conflict key in
/// the store: re-running a pipeline updates existing rows instead of
/// duplicating them. `details` carries the structured payload verbatim and is
/// persisted as an opaque document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub key: String,
    pub name: String,
    pub details: Map<String, Value>,
}

impl Profile {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            details: Map::new(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }
}

/// Profiles paired one-to-one with their embedding vectors.
///
/// The embedding service returns vectors positionally, with no correlation
/// key, so the pairing is only trustworthy at the moment both sequences are
/// in hand. [`EmbeddedProfiles::pair`] is the single place that zips them and
/// it refuses mismatched lengths; everything downstream consumes the pairs
/// and can no longer mix up indices.
#[derive(Clone, Debug)]
pub struct EmbeddedProfiles {
    items: Vec<(Profile, Vec<f32>)>,
}

impl EmbeddedProfiles {
    /// Zips profiles with their vectors, rejecting length mismatches.
    pub fn pair(
        profiles: Vec<Profile>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, PipelineError> {
        if profiles.len() != vectors.len() {
            return Err(PipelineError::Alignment {
                profiles: profiles.len(),
                vectors: vectors.len(),
            });
        }
        Ok(Self {
            items: profiles.into_iter().zip(vectors).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[(Profile, Vec<f32>)] {
        &self.items
    }

    pub fn into_items(self) -> Vec<(Profile, Vec<f32>)> {
        self.items
    }
}

/// Failures surfaced by the ingestion pipelines.
///
/// Recoverable degradations (classification fetch, label translation) are
/// handled in place and never reach this type; everything here aborts the
/// stage that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("registry fetch failed: {0}")]
    Fetch(String),

    #[error("investor roster unavailable: {0}")]
    Roster(String),

    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("store write failed: {0}")]
    Store(String),

    #[error("{profiles} profiles paired with {vectors} vectors")]
    Alignment { profiles: usize, vectors: usize },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(key: &str) -> Profile {
        Profile::new(key, key.to_uppercase())
    }

    #[test]
    fn pair_zips_in_order() {
        let batch = EmbeddedProfiles::pair(
            vec![profile("a"), profile("b")],
            vec![vec![0.1], vec![0.2]],
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.items()[0].0.key, "a");
        assert_eq!(batch.items()[0].1, vec![0.1]);
        assert_eq!(batch.items()[1].0.key, "b");
        assert_eq!(batch.items()[1].1, vec![0.2]);
    }

    #[test]
    fn pair_rejects_mismatched_lengths() {
        let result = EmbeddedProfiles::pair(vec![profile("a")], vec![]);
        match result {
            Err(PipelineError::Alignment { profiles, vectors }) => {
                assert_eq!(profiles, 1);
                assert_eq!(vectors, 0);
            }
            other => panic!("expected alignment error, got {other:?}"),
        }
    }

    #[test]
    fn pair_accepts_empty() {
        let batch = EmbeddedProfiles::pair(vec![], vec![]).unwrap();
        assert!(batch.is_empty());
    }
}
