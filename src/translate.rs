//! Best-effort Finnish-to-English label translation.
//!
//! Translation is a nicety, never a gate: the pipeline keeps going with the
//! original text when the service is down, rate-limited, or simply does not
//! know the phrase. Labels that already look like English are returned
//! without a network call.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::types::PipelineError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const SOURCE_LANG: &str = "FI";
const TARGET_LANG: &str = "EN";

static PLAIN_ENGLISH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9\s.,;:'&()/\-]+$").expect("plain text pattern compiles")
});

pub struct Translator {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl Translator {
    pub fn new(client: Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
        }
    }

    /// Translates `text`, falling back to a fixed dictionary and finally to
    /// the original text. Never fails.
    pub async fn translate(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        if looks_english(text) {
            return text.to_string();
        }

        match self.request(text).await {
            Ok(translated) if !translated.is_empty() => translated,
            Ok(_) => self.fallback(text, "empty translation response"),
            Err(err) => self.fallback(text, &err.to_string()),
        }
    }

    fn fallback(&self, text: &str, reason: &str) -> String {
        match dictionary_lookup(text) {
            Some(translated) => {
                debug!(reason, "translation service unavailable, dictionary hit");
                translated.to_string()
            }
            None => {
                warn!(reason, text, "translation unavailable, keeping original label");
                text.to_string()
            }
        }
    }

    async fn request(&self, text: &str) -> Result<String, PipelineError> {
        let body = serde_json::json!({
            "text": [text],
            "source_lang": SOURCE_LANG,
            "target_lang": TARGET_LANG,
        });
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let payload: TranslateResponse = response.json().await?;
        Ok(payload
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .unwrap_or_default())
    }
}

/// Heuristic for text that needs no translation: nothing outside plain ASCII
/// letters, digits, and common punctuation, and no Finnish signature.
fn looks_english(text: &str) -> bool {
    !has_finnish_signature(text) && PLAIN_ENGLISH.is_match(text)
}

/// Diacritics, plus the doubled vowels that give away diacritic-free Finnish
/// words such as "Teollisuus".
fn has_finnish_signature(text: &str) -> bool {
    if text
        .chars()
        .any(|c| matches!(c, 'ä' | 'ö' | 'å' | 'Ä' | 'Ö' | 'Å'))
    {
        return true;
    }
    let lower = text.to_lowercase();
    ["uu", "yy", "ää", "öö"]
        .iter()
        .any(|pair| lower.contains(pair))
}

/// Exact-match vocabulary for the labels that matter most when the service
/// is unreachable. Fuzzy matching is deliberately avoided; a wrong label is
/// worse than an untranslated one.
fn dictionary_lookup(text: &str) -> Option<&'static str> {
    let translated = match text {
        "Maatalous, metsätalous ja kalatalous" => "Agriculture, forestry and fishing",
        "Kaivostoiminta ja louhinta" => "Mining and quarrying",
        "Teollisuus" => "Manufacturing",
        "Sähkö-, kaasu- ja lämpöhuolto, jäähdytysliiketoiminta" => {
            "Electricity, gas, steam and air conditioning supply"
        }
        "Vesihuolto, viemäri- ja jätevesihuolto, jätehuolto" => {
            "Water supply, sewerage and waste management"
        }
        "Rakentaminen" => "Construction",
        "Tukku- ja vähittäiskauppa" => "Wholesale and retail trade",
        "Kuljetus ja varastointi" => "Transportation and storage",
        "Majoitus- ja ravitsemistoiminta" => "Accommodation and food service activities",
        "Informaatio ja viestintä" => "Information and communication",
        "Ohjelmistot, konsultointi ja siihen liittyvä toiminta" => {
            "Computer programming, consultancy and related activities"
        }
        "Rahoitus- ja vakuutustoiminta" => "Financial and insurance activities",
        "Kiinteistöalan toiminta" => "Real estate activities",
        "Ammatillinen, tieteellinen ja tekninen toiminta" => {
            "Professional, scientific and technical activities"
        }
        "Hallinto- ja tukipalvelutoiminta" => "Administrative and support service activities",
        "Julkinen hallinto ja maanpuolustus" => "Public administration and defence",
        "Koulutus" => "Education",
        "Terveys- ja sosiaalipalvelut" => "Human health and social work activities",
        "Taiteet, viihde ja virkistys" => "Arts, entertainment and recreation",
        "Muu palvelutoiminta" => "Other service activities",
        _ => return None,
    };
    Some(translated)
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
struct TranslatedText {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn translator_for(server: &MockServer) -> Translator {
        let endpoint = Url::parse(&server.url("/translate")).unwrap();
        Translator::new(Client::new(), endpoint, "test-key")
    }

    #[test]
    fn heuristic_accepts_plain_english() {
        assert!(looks_english("Manufacturing"));
        assert!(looks_english("Wholesale and retail trade; repair of vehicles"));
        assert!(!looks_english("Teollisuus"));
        assert!(!looks_english("Teollisuus ja sähköhuolto"));
        assert!(!looks_english("Östermalm"));
    }

    #[tokio::test]
    async fn empty_input_passes_through() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/translate");
                then.status(200);
            })
            .await;

        let translator = translator_for(&server);
        assert_eq!(translator.translate("").await, "");
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn english_text_skips_the_network() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/translate");
                then.status(200);
            })
            .await;

        let translator = translator_for(&server);
        assert_eq!(translator.translate("Manufacturing").await, "Manufacturing");
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn service_response_is_used() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/translate")
                    .body_contains("Metsätalous");
                then.status(200)
                    .json_body(json!({"translations": [{"text": "Forestry"}]}));
            })
            .await;

        let translator = translator_for(&server);
        assert_eq!(translator.translate("Metsätalous").await, "Forestry");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn service_failure_falls_back_to_dictionary() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/translate");
                then.status(429);
            })
            .await;

        let translator = translator_for(&server);
        assert_eq!(translator.translate("Teollisuus").await, "Manufacturing");
    }

    #[tokio::test]
    async fn unknown_text_survives_service_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/translate");
                then.status(500);
            })
            .await;

        let translator = translator_for(&server);
        let original = "Erikoistunut pörssiyhtiö";
        assert_eq!(translator.translate(original).await, original);
    }

    #[tokio::test]
    async fn empty_translations_array_falls_back() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/translate");
                then.status(200).json_body(json!({"translations": []}));
            })
            .await;

        let translator = translator_for(&server);
        assert_eq!(translator.translate("Teollisuus").await, "Manufacturing");
    }
}
