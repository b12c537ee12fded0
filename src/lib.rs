//! Ingestion-to-embedding pipeline for company and investor matching.
//!
//! ```text
//! registry listing ──► sources::registry ──┐
//!      │                                   │
//!      ├─ classification (memoized)        ├──► describe ──► embeddings ──► stores
//!      └─ translate (best-effort)          │
//!                                          │
//! investor roster ───► sources::roster ────┘
//! ```
//!
//! Two pipelines share the back half. The registry pipeline paginates the
//! company listing, filters and normalizes records, and resolves industry
//! labels through the classification cache and the translator. The roster
//! pipeline loads a curated local document. Both then render each profile to
//! text, embed the texts in rate-limited batches, and upsert rows plus
//! vectors through the store writer.
//!
//! Degradations on the labeling path (classification fetch, translation) are
//! absorbed with logged fallbacks; failures on the main path (listing fetch,
//! embedding, store writes) abort the run.

pub mod classification;
pub mod config;
pub mod describe;
pub mod embeddings;
pub mod pipeline;
pub mod sources;
pub mod stores;
pub mod translate;
pub mod types;

pub use types::{EmbeddedProfiles, PipelineError, Profile};
