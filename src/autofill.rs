//! LLM-assisted autofill for the Japanese side of an entry.
//!
//! The model call is best-effort and external: any of the four fields may
//! come back empty, meaning "could not be determined". Empty fields are
//! surfaced as a deficiency to the caller, never silently persisted. The
//! [`AutofillCoordinator`] implements the supersede/touched-field policy:
//! only the latest request may apply, and fields the user has edited by
//! hand are never overwritten.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{CoreError, Result};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/responses";
const MODEL: &str = "gpt-4o-mini";
const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// The four suggested fields. Empty string means the model could not
/// determine the value with confidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutofillFields {
    pub target_kana: String,
    pub target_kanji: String,
    pub target_romaji: String,
    pub lesson_or_domain: String,
}

impl AutofillFields {
    /// Labels of the fields the model left empty, for the deficiency report.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.target_kana.is_empty() {
            missing.push("Japanisch (Kana)");
        }
        if self.target_kanji.is_empty() {
            missing.push("Kanji");
        }
        if self.target_romaji.is_empty() {
            missing.push("Romaji");
        }
        if self.lesson_or_domain.is_empty() {
            missing.push("Lektion/Bereich");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    fn trimmed(self) -> AutofillFields {
        AutofillFields {
            target_kana: self.target_kana.trim().to_string(),
            target_kanji: self.target_kanji.trim().to_string(),
            target_romaji: self.target_romaji.trim().to_string(),
            lesson_or_domain: self.lesson_or_domain.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponsesPayload {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    refusal: String,
}

/// Extract the structured suggestion from a raw responses-API body.
fn fields_from_payload(body: &str) -> Result<AutofillFields> {
    let payload: ResponsesPayload = serde_json::from_str(body)?;

    let mut output_text = "";
    let mut refusal = "";
    for item in payload.output.iter().filter(|item| item.kind == "message") {
        for part in &item.content {
            match part.kind.as_str() {
                "output_text" if output_text.is_empty() => output_text = part.text.trim(),
                "refusal" if refusal.is_empty() => refusal = part.refusal.trim(),
                _ => {}
            }
        }
    }

    if !refusal.is_empty() {
        return Err(CoreError::Upstream(format!("autofill model refused: {refusal}")));
    }
    if output_text.is_empty() {
        return Err(CoreError::Upstream("autofill response was empty".to_string()));
    }

    let fields: AutofillFields = serde_json::from_str(output_text)?;
    let fields = fields.trimmed();
    if !fields.is_complete() {
        log::warn!("autofill left fields undetermined: {}", fields.missing_fields().join(", "));
    }
    Ok(fields)
}

/// Blocking client for the autofill collaborator.
pub struct AutofillClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl AutofillClient {
    pub fn new(api_key: impl Into<String>) -> Result<AutofillClient> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(AutofillClient { http, api_key: api_key.into(), endpoint: DEFAULT_ENDPOINT.to_string() })
    }

    /// Read the API key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<AutofillClient> {
        let api_key = std::env::var(API_KEY_VAR)
            .map_err(|_| CoreError::Upstream(format!("{API_KEY_VAR} is not configured")))?;
        Self::new(api_key)
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> AutofillClient {
        self.endpoint = endpoint.into();
        self
    }

    /// Ask the model for the four Japanese study fields of a German word.
    /// Any field may legitimately come back empty; use
    /// [`AutofillFields::missing_fields`] before persisting.
    pub fn fill(&self, source_text: &str) -> Result<AutofillFields> {
        let source_text = source_text.trim();
        if source_text.is_empty() {
            return Err(CoreError::validation("sourceText", "must not be empty"));
        }

        let body = json!({
            "model": MODEL,
            "temperature": 0.2,
            "max_output_tokens": 300,
            "input": [
                {
                    "role": "system",
                    "content": "You generate Japanese study metadata for German vocabulary. Respond with accurate Japanese readings. Lesson/domain labels must be in German."
                },
                {
                    "role": "user",
                    "content": format!(
                        "For the German word or phrase: \"{source_text}\", provide:\n\
                         - targetKana: Japanese reading in kana (required)\n\
                         - targetKanji: kanji form (required)\n\
                         - targetRomaji: romaji reading (required)\n\
                         - lessonOrDomain: 1 short label in German (required)\n\
                         If any field cannot be identified with confidence, return an empty string for that field. Do not guess."
                    )
                }
            ],
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": "vocab_autofill",
                    "strict": true,
                    "schema": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "targetKana": { "type": "string" },
                            "targetKanji": { "type": "string" },
                            "targetRomaji": { "type": "string" },
                            "lessonOrDomain": { "type": "string" }
                        },
                        "required": ["targetKana", "targetKanji", "targetRomaji", "lessonOrDomain"]
                    }
                }
            }
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().unwrap_or_default();
            return Err(CoreError::Upstream(format!("autofill request failed ({status}): {detail}")));
        }

        fields_from_payload(&response.text()?)
    }
}

/// One of the four autofill-managed entry fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutofillField {
    Kana,
    Kanji,
    Romaji,
    Lesson,
}

/// Single-flight-with-cancellation bookkeeping for autofill requests.
///
/// Every new request supersedes all earlier in-flight ones; a result may
/// only be applied if its generation is still current, and never to a field
/// the user has touched since.
#[derive(Debug, Default)]
pub struct AutofillCoordinator {
    generation: u64,
    touched: HashSet<AutofillField>,
}

impl AutofillCoordinator {
    pub fn new() -> AutofillCoordinator {
        AutofillCoordinator::default()
    }

    /// Start a new request; the returned generation must accompany its result.
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Record a manual edit; that field is off-limits for later results.
    pub fn touch(&mut self, field: AutofillField) {
        self.touched.insert(field);
    }

    /// Forget touched fields, e.g. when the form is reset for a new entry.
    pub fn clear_touched(&mut self) {
        self.touched.clear();
    }

    /// Merge a finished request into the current field values. Returns
    /// `None` when the result is stale (a newer request has since begun);
    /// otherwise touched fields keep their current value.
    pub fn apply(
        &self,
        generation: u64,
        suggestion: &AutofillFields,
        current: &AutofillFields,
    ) -> Option<AutofillFields> {
        if generation != self.generation {
            log::debug!("discarding stale autofill result (generation {generation})");
            return None;
        }

        let pick = |field: AutofillField, suggested: &str, existing: &str| {
            if self.touched.contains(&field) { existing.to_string() } else { suggested.to_string() }
        };

        Some(AutofillFields {
            target_kana: pick(AutofillField::Kana, &suggestion.target_kana, &current.target_kana),
            target_kanji: pick(AutofillField::Kanji, &suggestion.target_kanji, &current.target_kanji),
            target_romaji: pick(AutofillField::Romaji, &suggestion.target_romaji, &current.target_romaji),
            lesson_or_domain: pick(
                AutofillField::Lesson,
                &suggestion.lesson_or_domain,
                &current.lesson_or_domain,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload(text: &str) -> String {
        json!({
            "output": [
                {
                    "type": "message",
                    "content": [ { "type": "output_text", "text": text } ]
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn parses_a_complete_suggestion() {
        let body = payload(
            r#"{"targetKana":" いぬ ","targetKanji":"犬","targetRomaji":"inu","lessonOrDomain":"Tiere"}"#,
        );
        let fields = fields_from_payload(&body).unwrap();
        assert_eq!(fields.target_kana, "いぬ");
        assert!(fields.is_complete());
    }

    #[test]
    fn empty_fields_are_reported_not_invented() {
        let body = payload(
            r#"{"targetKana":"いぬ","targetKanji":"","targetRomaji":"inu","lessonOrDomain":""}"#,
        );
        let fields = fields_from_payload(&body).unwrap();
        assert!(!fields.is_complete());
        assert_eq!(fields.missing_fields(), vec!["Kanji", "Lektion/Bereich"]);
    }

    #[test]
    fn refusal_is_an_upstream_error() {
        let body = json!({
            "output": [
                {
                    "type": "message",
                    "content": [ { "type": "refusal", "refusal": "cannot comply" } ]
                }
            ]
        })
        .to_string();
        match fields_from_payload(&body) {
            Err(CoreError::Upstream(message)) => assert!(message.contains("cannot comply")),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn empty_output_is_an_upstream_error() {
        let body = json!({ "output": [] }).to_string();
        assert!(matches!(fields_from_payload(&body), Err(CoreError::Upstream(_))));
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut coordinator = AutofillCoordinator::new();
        let first = coordinator.begin();
        let second = coordinator.begin();

        let suggestion = AutofillFields {
            target_kana: "いぬ".into(),
            target_kanji: "犬".into(),
            target_romaji: "inu".into(),
            lesson_or_domain: "Tiere".into(),
        };
        let current = AutofillFields::default();

        assert_eq!(coordinator.apply(first, &suggestion, &current), None);
        assert!(coordinator.apply(second, &suggestion, &current).is_some());
    }

    #[test]
    fn touched_fields_survive_an_applied_result() {
        let mut coordinator = AutofillCoordinator::new();
        let generation = coordinator.begin();
        coordinator.touch(AutofillField::Kanji);

        let suggestion = AutofillFields {
            target_kana: "いぬ".into(),
            target_kanji: "犬".into(),
            target_romaji: "inu".into(),
            lesson_or_domain: "Tiere".into(),
        };
        let current = AutofillFields {
            target_kanji: "戌".into(),
            ..AutofillFields::default()
        };

        let merged = coordinator.apply(generation, &suggestion, &current).unwrap();
        assert_eq!(merged.target_kanji, "戌");
        assert_eq!(merged.target_kana, "いぬ");

        coordinator.clear_touched();
        let merged = coordinator.apply(generation, &suggestion, &current).unwrap();
        assert_eq!(merged.target_kanji, "犬");
    }
}
