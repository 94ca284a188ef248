//! Prompt assembly for generation requests.
use super::{GenerationRequest, SubmissionKind};
use anyhow::{Context, Result};

// Prompt templates loaded at compile time
const CONTENT_PROMPT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/content.md"));
const DECK_PROMPT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/deck.md"));

const DOCUMENT_TYPE_FIELD: &str = "documentType";
const COMPANY_NAME_FIELD: &str = "companyName";

fn document_type_label(raw: Option<&str>) -> &'static str {
    match raw.map(str::trim) {
        Some(value) if value.eq_ignore_ascii_case("cim") => "Confidential Information Memorandum",
        Some(value) if value.eq_ignore_ascii_case("teaser") => "Teaser Document",
        _ => "Management Presentation",
    }
}

/// Fill the kind-specific template with the request payload.
pub fn build_prompt(request: &GenerationRequest) -> Result<String> {
    let template = match request.kind {
        SubmissionKind::Content => CONTENT_PROMPT,
        SubmissionKind::Deck => DECK_PROMPT,
    };
    let payload =
        serde_json::to_string_pretty(&request.payload).context("serialize generation payload")?;
    let company = request
        .payload
        .text(COMPANY_NAME_FIELD)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("the company");
    Ok(template
        .replace(
            "{document_type}",
            document_type_label(request.payload.text(DOCUMENT_TYPE_FIELD)),
        )
        .replace("{company_name}", company)
        .replace("{payload}", &payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataRecord;

    #[test]
    fn prompt_embeds_payload_and_company() {
        let mut payload = DataRecord::default();
        payload.set("companyName", "Acme Analytics");
        payload.set("documentType", "cim");
        let prompt = build_prompt(&GenerationRequest {
            kind: SubmissionKind::Content,
            payload,
        })
        .expect("build prompt");

        assert!(prompt.contains("Confidential Information Memorandum for Acme Analytics"));
        assert!(prompt.contains("\"companyName\": \"Acme Analytics\""));
        assert!(!prompt.contains("{payload}"));
    }

    #[test]
    fn deck_prompt_defaults_company_label() {
        let prompt = build_prompt(&GenerationRequest {
            kind: SubmissionKind::Deck,
            payload: DataRecord::default(),
        })
        .expect("build prompt");
        assert!(prompt.contains("Management Presentation about the company"));
        assert!(prompt.contains("\"slides\""));
    }
}
