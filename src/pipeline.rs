//! End-to-end orchestration of the two ingestion pipelines.
//!
//! Each run is strictly sequential: fetch finishes before any text is
//! embedded, embedding finishes before anything is written. The only
//! concurrency in the process is the async runtime waiting on network I/O.

use std::path::PathBuf;

use reqwest::Client;
use tracing::info;

use crate::classification::ClassificationCache;
use crate::config::Settings;
use crate::describe::{company_profile_text, investor_profile_text};
use crate::embeddings::{BatchPolicy, EmbeddingClient};
use crate::sources::registry::RegistryClient;
use crate::sources::roster::load_investors;
use crate::stores::{
    Backend, COMPANY_TABLES, INVESTOR_TABLES, PostgrestStore, UpsertWriter, WriteReport,
};
use crate::translate::Translator;
use crate::types::{EmbeddedProfiles, PipelineError};

/// What a completed run did, for the final log line and exit message.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunSummary {
    pub fetched: usize,
    pub embedded: usize,
    pub stored: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn from_report(fetched: usize, report: WriteReport) -> Self {
        Self {
            fetched,
            embedded: report.embeddings,
            stored: report.entities,
            skipped: report.skipped,
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} fetched, {} embedded, {} stored, {} skipped",
            self.fetched, self.embedded, self.stored, self.skipped
        )
    }
}

/// Registry ingestion: fetch, describe, embed (unless disabled), store.
pub struct CompanyPipeline<B> {
    registry: RegistryClient,
    embedder: Option<EmbeddingClient>,
    writer: UpsertWriter<B>,
    fetch_target: usize,
}

impl<B: Backend> CompanyPipeline<B> {
    /// `embedder: None` means entity rows only, no vectors.
    pub fn new(
        registry: RegistryClient,
        embedder: Option<EmbeddingClient>,
        writer: UpsertWriter<B>,
        fetch_target: usize,
    ) -> Self {
        Self {
            registry,
            embedder,
            writer,
            fetch_target,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        info!(fetch_target = self.fetch_target, "fetching companies");
        let profiles = self.registry.fetch_companies(self.fetch_target).await?;
        info!(count = profiles.len(), "registry fetch complete");
        if profiles.is_empty() {
            return Ok(RunSummary::default());
        }

        let Some(embedder) = &self.embedder else {
            let stored = self.writer.write_entities(&COMPANY_TABLES, &profiles).await?;
            info!(stored, "company rows written, embeddings disabled");
            return Ok(RunSummary {
                fetched: profiles.len(),
                stored,
                ..RunSummary::default()
            });
        };

        let fetched = profiles.len();
        let texts: Vec<String> = profiles.iter().map(company_profile_text).collect();
        let vectors = embedder.embed_all(&texts).await?;
        info!(count = vectors.len(), "company vectors computed");

        let batch = EmbeddedProfiles::pair(profiles, vectors)?;
        let report = self.writer.write(&COMPANY_TABLES, batch).await?;
        Ok(RunSummary::from_report(fetched, report))
    }
}

/// Roster ingestion: load, describe, embed, store.
pub struct InvestorPipeline<B> {
    roster_path: PathBuf,
    embedder: EmbeddingClient,
    writer: UpsertWriter<B>,
}

impl<B: Backend> InvestorPipeline<B> {
    pub fn new(roster_path: PathBuf, embedder: EmbeddingClient, writer: UpsertWriter<B>) -> Self {
        Self {
            roster_path,
            embedder,
            writer,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let profiles = load_investors(&self.roster_path).await?;
        if profiles.is_empty() {
            return Ok(RunSummary::default());
        }

        let fetched = profiles.len();
        let texts: Vec<String> = profiles.iter().map(investor_profile_text).collect();
        let vectors = self.embedder.embed_all(&texts).await?;
        info!(count = vectors.len(), "investor vectors computed");

        let batch = EmbeddedProfiles::pair(profiles, vectors)?;
        let report = self.writer.write(&INVESTOR_TABLES, batch).await?;
        Ok(RunSummary::from_report(fetched, report))
    }
}

impl CompanyPipeline<PostgrestStore> {
    /// Wires the registry pipeline from settings, validating the credentials
    /// this run will actually use.
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let client = http_client()?;
        let writer = writer_from(settings, &client)?;

        let translator = Translator::new(
            client.clone(),
            settings.translation_url.clone(),
            settings.require_translation_key()?,
        );
        let classifications =
            ClassificationCache::new(client.clone(), settings.classification_url.clone());
        let registry = RegistryClient::new(
            client.clone(),
            settings.registry_url.clone(),
            classifications,
            translator,
        )
        .with_page_pause(settings.page_pause);

        let embedder = if settings.embeddings_enabled {
            Some(embedder_from(settings, &client)?)
        } else {
            None
        };

        Ok(Self::new(registry, embedder, writer, settings.fetch_target))
    }
}

impl InvestorPipeline<PostgrestStore> {
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let client = http_client()?;
        let writer = writer_from(settings, &client)?;
        let embedder = embedder_from(settings, &client)?;
        Ok(Self::new(settings.roster_path.clone(), embedder, writer))
    }
}

fn http_client() -> Result<Client, PipelineError> {
    Ok(Client::builder()
        .user_agent(concat!("matchsmith/", env!("CARGO_PKG_VERSION")))
        .use_rustls_tls()
        .build()?)
}

fn writer_from(
    settings: &Settings,
    client: &Client,
) -> Result<UpsertWriter<PostgrestStore>, PipelineError> {
    let (url, key) = settings.require_store()?;
    let store = PostgrestStore::new(client.clone(), url.clone(), key);
    Ok(UpsertWriter::new(store).with_write_batch_size(settings.write_batch_size))
}

fn embedder_from(settings: &Settings, client: &Client) -> Result<EmbeddingClient, PipelineError> {
    let key = settings.require_embedding_key()?;
    let policy = BatchPolicy {
        pause: settings.batch_pause,
        ..BatchPolicy::default()
    };
    Ok(EmbeddingClient::new(
        client.clone(),
        settings.embedding_url.clone(),
        key,
        settings.embedding_model.clone(),
    )
    .with_policy(policy))
}
