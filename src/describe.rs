//! Profile-to-text composition.
//!
//! These functions are the single source of the text that gets embedded;
//! both pipelines call them exactly once per profile, so the embedding input
//! is deterministic for a given profile. Missing fields render as empty
//! strings, never as "null".

use serde_json::{Map, Value};

use crate::types::Profile;

/// One descriptive sentence per company field.
pub fn company_profile_text(profile: &Profile) -> String {
    let details = &profile.details;
    format!(
        "Company Name: {}. Business ID: {}. Industry: {}. Description: {}. Address: {}. Registered: {}.",
        profile.name,
        profile.key,
        text(details, "industry"),
        text(details, "description"),
        text(details, "address"),
        text_or(details, "registrationDate", "N/A"),
    )
}

/// Narrative investor summary with the list attributes flattened to
/// comma-separated strings.
pub fn investor_profile_text(profile: &Profile) -> String {
    let details = &profile.details;
    let role = text(details, "role");
    let firm = text(details, "firm");
    let headline = if firm.is_empty() {
        role
    } else {
        format!("{role} at {firm}")
    };

    format!(
        "{}. {}. Location: {}. Thesis: {}. Preferred industries: {}. Business models: {}. \
         Preferred rounds: {}. Geographic focus: {}. Avoids: {}. Check size: {}.",
        profile.name,
        headline,
        text(details, "location"),
        text(details, "thesis"),
        list(details, "preferredIndustries"),
        list(details, "businessModels"),
        list(details, "preferredRounds"),
        list(details, "geographicFocus"),
        list(details, "avoidIndustries"),
        text(details, "checkSize"),
    )
}

fn text(details: &Map<String, Value>, key: &str) -> String {
    details
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn text_or(details: &Map<String, Value>, key: &str, fallback: &str) -> String {
    let value = text(details, key);
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn list(details: &Map<String, Value>, key: &str) -> String {
    details
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details_from(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn company_text_reads_field_by_field() {
        let profile = Profile::new("1234567-8", "Aurora Analytics Oy").with_details(details_from(
            json!({
                "industry": "Computer programming",
                "description": "Predictive maintenance for wind farms",
                "address": "Mannerheimintie10, 00100 Helsinki",
                "registrationDate": "2021-06-15"
            }),
        ));

        assert_eq!(
            company_profile_text(&profile),
            "Company Name: Aurora Analytics Oy. Business ID: 1234567-8. \
             Industry: Computer programming. Description: Predictive maintenance for wind farms. \
             Address: Mannerheimintie10, 00100 Helsinki. Registered: 2021-06-15."
        );
    }

    #[test]
    fn company_text_marks_missing_registration_date() {
        let profile = Profile::new("1234567-8", "Sparse Oy");
        let rendered = company_profile_text(&profile);
        assert!(rendered.contains("Registered: N/A."));
        assert!(rendered.contains("Industry: ."));
        assert!(!rendered.contains("null"));
    }

    #[test]
    fn investor_text_joins_firm_with_at() {
        let profile = Profile::new("inv-001", "Aino Virtanen").with_details(details_from(json!({
            "role": "Partner",
            "firm": "Nordic Seed",
            "location": "Helsinki",
            "thesis": "Early B2B software in the Nordics",
            "preferredIndustries": ["SaaS", "Fintech"],
            "businessModels": ["B2B"],
            "preferredRounds": ["Pre-seed", "Seed"],
            "geographicFocus": ["Nordics", "Baltics"],
            "avoidIndustries": ["Gambling"],
            "checkSize": "100k-500k EUR"
        })));

        let rendered = investor_profile_text(&profile);
        assert!(rendered.starts_with("Aino Virtanen. Partner at Nordic Seed."));
        assert!(rendered.contains("Preferred industries: SaaS, Fintech."));
        assert!(rendered.contains("Geographic focus: Nordics, Baltics."));
        assert!(rendered.contains("Check size: 100k-500k EUR."));
    }

    #[test]
    fn investor_text_drops_at_without_a_firm() {
        let profile = Profile::new("inv-002", "Solo Angel").with_details(details_from(json!({
            "role": "Angel"
        })));

        let rendered = investor_profile_text(&profile);
        assert!(rendered.starts_with("Solo Angel. Angel. Location: ."));
        assert!(!rendered.contains(" at "));
        assert!(!rendered.contains("null"));
    }

    #[test]
    fn same_profile_renders_identically() {
        let profile = Profile::new("inv-003", "Repeatable Ventures");
        assert_eq!(
            investor_profile_text(&profile),
            investor_profile_text(&profile)
        );
    }
}
