use std::collections::BTreeMap;

use serde::Deserialize;

use super::prompt::INVALID_INPUT_MARKER;
use super::DiagnosisError;
use crate::models::enums::EnergyState;
use crate::models::{CardResult, DiagnosisResult};

/// Whether the model rejected the release text.
pub fn is_invalid_input(content: &str) -> bool {
    content.to_ascii_uppercase().contains(INVALID_INPUT_MARKER)
}

/// Parse the Stage-1 reply into a diagnosis.
///
/// The invalid-input marker wins over any payload; a reply without a
/// decodable payload is a parse failure, never `InvalidInput`.
pub fn parse_diagnosis_response(content: &str) -> Result<DiagnosisResult, DiagnosisError> {
    if is_invalid_input(content) {
        return Err(DiagnosisError::InvalidInput);
    }

    #[derive(Deserialize)]
    struct RawDiagnosis {
        #[serde(rename = "detectedEmotions", alias = "detected_emotions")]
        detected_emotions: Vec<String>,
        #[serde(rename = "chakraBalance", alias = "chakra_balance")]
        chakra_balance: serde_json::Map<String, serde_json::Value>,
        #[serde(rename = "energyState", alias = "energy_state")]
        energy_state: String,
    }

    let json_str = extract_json_payload(content)?;
    let raw: RawDiagnosis = serde_json::from_str(json_str)
        .map_err(|e| DiagnosisError::JsonParsing(e.to_string()))?;

    let detected_emotions = raw
        .detected_emotions
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    Ok(DiagnosisResult {
        detected_emotions,
        chakra_balance: numeric_entries(raw.chakra_balance),
        energy_state: EnergyState::from_model(&raw.energy_state),
    })
}

/// Parse the Stage-2 reply into an affirmation card.
pub fn parse_card_response(content: &str) -> Result<CardResult, DiagnosisError> {
    #[derive(Deserialize)]
    struct RawCard {
        #[serde(alias = "responseText", alias = "response_text")]
        response: String,
        #[serde(default)]
        quote: String,
    }

    let json_str = extract_json_payload(content)?;
    let raw: RawCard = serde_json::from_str(json_str)
        .map_err(|e| DiagnosisError::JsonParsing(e.to_string()))?;

    let response_text = raw.response.trim().to_string();
    if response_text.is_empty() {
        return Err(DiagnosisError::MalformedResponse("Card response is empty".into()));
    }

    Ok(CardResult {
        response_text,
        quote: raw.quote.trim().to_string(),
    })
}

/// Keep numeric chakra values; skip anything else.
fn numeric_entries(map: serde_json::Map<String, serde_json::Value>) -> BTreeMap<String, f64> {
    map.into_iter()
        .filter_map(|(key, value)| match value.as_f64() {
            Some(v) => Some((key, v)),
            None => {
                tracing::debug!(key = %key, "Skipping non-numeric chakra value");
                None
            }
        })
        .collect()
}

/// Locate the JSON object in a model reply.
///
/// Order: a ```json fence, any other fence holding an object, then the
/// outermost `{ ... }` span of the whole reply.
fn extract_json_payload(content: &str) -> Result<&str, DiagnosisError> {
    // ASCII lowercasing keeps byte offsets aligned with `content`.
    let lower = content.to_ascii_lowercase();

    if let Some(start) = lower.find("```json") {
        let body_start = start + 7;
        let body_end = content[body_start..]
            .find("```")
            .ok_or_else(|| DiagnosisError::MalformedResponse("Unclosed JSON block".into()))?;
        return Ok(content[body_start..body_start + body_end].trim());
    }

    let mut rest = content;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let Some(close) = after_fence.find("```") else {
            break;
        };
        // Skip an optional language tag on the fence line.
        let block = after_fence[..close]
            .split_once('\n')
            .map(|(_, body)| body)
            .unwrap_or(&after_fence[..close])
            .trim();
        if block.starts_with('{') {
            return Ok(block);
        }
        rest = &after_fence[close + 3..];
    }

    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&content[start..=end]),
        _ => Err(DiagnosisError::MalformedResponse("No JSON object found".into())),
    }
}
