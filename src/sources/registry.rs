//! Paginated company registry adapter.
//!
//! Walks the registry listing page by page, keeps companies that are recent
//! enough and carry an industry code, and normalizes each raw record into a
//! [`Profile`]. Industry codes are resolved through the classification cache
//! and translated when only a source-language label exists.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::classification::{ClassificationCache, IndustryClass};
use crate::translate::Translator;
use crate::types::{PipelineError, Profile};

/// Page size fixed by the listing service.
const PAGE_SIZE: usize = 100;
/// Upper bound on pages walked in one run.
const MAX_PAGES: usize = 50;
/// Companies registered before this year are ignored.
const MIN_REGISTRATION_YEAR: i32 = 2015;
const DEFAULT_PAGE_PAUSE: Duration = Duration::from_millis(500);

const TARGET_LANGUAGE: &str = "EN";

pub struct RegistryClient {
    client: Client,
    base_url: Url,
    classifications: ClassificationCache,
    translator: Translator,
    page_pause: Duration,
}

impl RegistryClient {
    pub fn new(
        client: Client,
        base_url: Url,
        classifications: ClassificationCache,
        translator: Translator,
    ) -> Self {
        Self {
            client,
            base_url,
            classifications,
            translator,
            page_pause: DEFAULT_PAGE_PAUSE,
        }
    }

    /// Pause inserted between page requests.
    #[must_use]
    pub fn with_page_pause(mut self, pause: Duration) -> Self {
        self.page_pause = pause;
        self
    }

    /// Fetches filtered, normalized companies until `target` records are
    /// accumulated, the listing runs out, or the page ceiling is hit.
    pub async fn fetch_companies(&self, target: usize) -> Result<Vec<Profile>, PipelineError> {
        let classes = self.classifications.classifications().await;
        let mut collected: Vec<Profile> = Vec::with_capacity(target);

        for page in 1..=MAX_PAGES {
            let records = self.fetch_page(page).await?;
            let page_len = records.len();

            for company in records {
                if !passes_filters(&company) {
                    continue;
                }
                if let Some(profile) = self.normalize(company, &classes).await {
                    collected.push(profile);
                }
            }
            debug!(page, page_len, collected = collected.len(), "registry page processed");

            if collected.len() >= target {
                break;
            }
            if page_len < PAGE_SIZE {
                info!(page, "registry listing exhausted");
                break;
            }
            if page < MAX_PAGES {
                sleep(self.page_pause).await;
            }
        }

        collected.truncate(target);
        Ok(collected)
    }

    async fn fetch_page(&self, page: usize) -> Result<Vec<RegistryCompany>, PipelineError> {
        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[("page", page.to_string())])
            .send()
            .await?
            .error_for_status()?;
        let listing: RegistryPage = response
            .json()
            .await
            .map_err(|err| PipelineError::Fetch(format!("malformed listing page {page}: {err}")))?;
        Ok(listing.companies)
    }

    async fn normalize(
        &self,
        company: RegistryCompany,
        classes: &HashMap<String, IndustryClass>,
    ) -> Option<Profile> {
        let key = company
            .business_id
            .as_ref()
            .map(BusinessId::value)
            .unwrap_or_default();
        if key.is_empty() {
            warn!("registry record without a business id skipped");
            return None;
        }

        let name = current_name(&company.names);
        let code = company
            .main_business_line
            .as_ref()
            .and_then(|line| line.code.clone())
            .unwrap_or_default();
        let industry = self.industry_label(&code, classes).await;
        let description = pick_localized(&company.descriptions);
        let address = company
            .addresses
            .first()
            .map(compose_address)
            .unwrap_or_default();

        let mut details = Map::new();
        details.insert("businessId".into(), Value::String(key.clone()));
        details.insert("industryCode".into(), Value::String(code));
        details.insert("industry".into(), Value::String(industry));
        details.insert("description".into(), Value::String(description));
        details.insert("address".into(), Value::String(address));
        if let Some(date) = &company.registration_date {
            details.insert("registrationDate".into(), Value::String(date.clone()));
        }
        if let Some(form) = company
            .company_forms
            .first()
            .map(|form| pick_localized(&form.descriptions))
            .filter(|form| !form.is_empty())
        {
            details.insert("companyForm".into(), Value::String(form));
        }

        Some(Profile { key, name, details })
    }

    async fn industry_label(
        &self,
        code: &str,
        classes: &HashMap<String, IndustryClass>,
    ) -> String {
        match classes.get(code) {
            Some(class) if class.needs_translation => {
                self.translator.translate(&class.label).await
            }
            Some(class) if !class.label.is_empty() => class.label.clone(),
            _ => format!("Industry Code: {code}"),
        }
    }
}

/// Year cutoff plus industry code presence.
fn passes_filters(company: &RegistryCompany) -> bool {
    let recent = registration_year(company).is_some_and(|year| year >= MIN_REGISTRATION_YEAR);
    let classified = company
        .main_business_line
        .as_ref()
        .and_then(|line| line.code.as_deref())
        .is_some_and(|code| !code.is_empty());
    recent && classified
}

fn registration_year(company: &RegistryCompany) -> Option<i32> {
    let date = company.registration_date.as_deref()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|date| date.year())
}

/// The active primary name when one exists, else the first listed name.
fn current_name(names: &[RegistryName]) -> String {
    names
        .iter()
        .find(|name| name.kind.as_deref() == Some("1") && name.end_date.is_none())
        .or_else(|| names.first())
        .map(|name| name.name.clone())
        .unwrap_or_default()
}

/// Target-language entry if present, else the first non-empty one.
fn pick_localized(entries: &[LocalizedText]) -> String {
    let non_empty = |entry: &&LocalizedText| {
        entry
            .description
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    };
    entries
        .iter()
        .filter(non_empty)
        .find(|entry| entry.language_code.as_deref() == Some(TARGET_LANGUAGE))
        .or_else(|| entries.iter().find(non_empty))
        .and_then(|entry| entry.description.as_deref())
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

/// Single-line postal address. Street, building number, and entrance run
/// together; the apartment gets a space; post code and city form the
/// locality; the two halves are joined with ", ". Missing parts leave no
/// stray separators behind.
fn compose_address(address: &RegistryAddress) -> String {
    let mut street_part = String::new();
    for piece in [&address.street, &address.building_number, &address.entrance] {
        if let Some(value) = piece {
            street_part.push_str(value.trim());
        }
    }
    if let Some(apartment) = &address.apartment_number {
        let apartment = apartment.trim();
        if !apartment.is_empty() {
            if !street_part.is_empty() {
                street_part.push(' ');
            }
            street_part.push_str(apartment);
        }
    }

    let mut locality = String::new();
    if let Some(code) = &address.post_code {
        locality.push_str(code.trim());
    }
    if let Some(city) = &address.city {
        let city = city.trim();
        if !city.is_empty() {
            if !locality.is_empty() {
                locality.push(' ');
            }
            locality.push_str(city);
        }
    }

    match (street_part.is_empty(), locality.is_empty()) {
        (true, true) => String::new(),
        (false, true) => street_part,
        (true, false) => locality,
        (false, false) => format!("{street_part}, {locality}"),
    }
}

#[derive(Debug, Deserialize)]
struct RegistryPage {
    #[serde(default)]
    companies: Vec<RegistryCompany>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryCompany {
    #[serde(default)]
    business_id: Option<BusinessId>,
    #[serde(default)]
    names: Vec<RegistryName>,
    #[serde(default)]
    main_business_line: Option<BusinessLine>,
    #[serde(default)]
    registration_date: Option<String>,
    #[serde(default)]
    addresses: Vec<RegistryAddress>,
    #[serde(default)]
    descriptions: Vec<LocalizedText>,
    #[serde(default)]
    company_forms: Vec<CompanyForm>,
}

/// The listing has carried the business id both as a bare string and as a
/// wrapped object; accept either shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BusinessId {
    Flat(String),
    Nested { value: String },
}

impl BusinessId {
    fn value(&self) -> String {
        match self {
            BusinessId::Flat(value) => value.trim().to_string(),
            BusinessId::Nested { value } => value.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryName {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BusinessLine {
    #[serde(default, rename = "type")]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryAddress {
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    building_number: Option<String>,
    #[serde(default)]
    entrance: Option<String>,
    #[serde(default)]
    apartment_number: Option<String>,
    #[serde(default)]
    post_code: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalizedText {
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompanyForm {
    #[serde(default)]
    descriptions: Vec<LocalizedText>,
}
