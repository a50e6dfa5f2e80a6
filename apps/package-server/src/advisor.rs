//! Ordering advisor client
//!
//! The advisor is an external model that proposes a section order and a
//! compliance estimate. Its reply is untrusted text; parsing happens in
//! `compliance_engine::parse_advisor_output`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{LenderRequirements, Section};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Advisor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Advisor returned status {0}")]
    Status(u16),

    #[error("Advisor returned no content")]
    EmptyResponse,
}

/// Proposes a document order for a set of sections
#[async_trait]
pub trait OrderingAdvisor: Send + Sync {
    /// Raw advisor reply, expected to embed JSON
    async fn propose_order(
        &self,
        sections: &[Section],
        requirements: Option<&LenderRequirements>,
    ) -> Result<String, AdvisorError>;
}

/// Advisor backed by an OpenAI-compatible chat completions endpoint
pub struct HttpAdvisor {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpAdvisor {
    pub fn new(
        url: String,
        api_key: Option<String>,
        model: String,
        timeout_ms: u64,
    ) -> Result<Self, AdvisorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            client,
            url,
            api_key,
            model,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

const SYSTEM_PROMPT: &str = "You order mortgage closing documents to match a lender's \
checklist. Reply with JSON only.";

#[async_trait]
impl OrderingAdvisor for HttpAdvisor {
    async fn propose_order(
        &self,
        sections: &[Section],
        requirements: Option<&LenderRequirements>,
    ) -> Result<String, AdvisorError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(sections, requirements),
                },
            ],
            temperature: 0.0,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::Status(status.as_u16()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AdvisorError::EmptyResponse)?;

        debug!(chars = content.len(), "Advisor replied");
        Ok(content)
    }
}

pub fn build_prompt(sections: &[Section], requirements: Option<&LenderRequirements>) -> String {
    let mut prompt = String::from("Sections found in the uploaded package:\n");
    for section in sections {
        prompt.push_str(&format!("- {} (pages {})\n", section.name, section.page_range));
    }

    if let Some(req) = requirements {
        prompt.push_str(&format!("\nLender: {}\n", req.lender_name));
        if !req.documents.is_empty() {
            prompt.push_str("Required documents, in the lender's order:\n");
            for doc in &req.documents {
                prompt.push_str(&format!("- {}\n", doc));
            }
        }
        if !req.special_instructions.is_empty() {
            prompt.push_str("Instructions:\n");
            for note in &req.special_instructions {
                prompt.push_str(&format!("- {}\n", note));
            }
        }
    }

    prompt.push_str(
        "\nReturn {\"orderedDocumentNames\": [section names in the order they should appear], \
         \"complianceScore\": 0-100, \"missingDocuments\": [required documents not present]}. \
         Use the section names exactly as listed.",
    );
    prompt
}

/// Cache key for an advisor reply: the text plus the required document list
pub fn cache_key(text: &str, requirements: Option<&LenderRequirements>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    if let Some(req) = requirements {
        for doc in &req.documents {
            hasher.update([0u8]);
            hasher.update(doc.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_engine::segmenter::segment;

    #[test]
    fn test_prompt_lists_sections_and_requirements() {
        let req = LenderRequirements {
            lender_name: "Acme Lending".into(),
            documents: vec!["Survey".into()],
            special_instructions: vec!["Wet signatures only".into()],
            ..LenderRequirements::default()
        };
        let prompt = build_prompt(&segment("", "a.pdf", None), Some(&req));
        assert!(prompt.contains("- Mortgage (pages 2-3)"));
        assert!(prompt.contains("Lender: Acme Lending"));
        assert!(prompt.contains("- Survey"));
        assert!(prompt.contains("- Wet signatures only"));
        assert!(prompt.contains("orderedDocumentNames"));
    }

    #[test]
    fn test_cache_key_depends_on_requirements() {
        let a = LenderRequirements {
            documents: vec!["Survey".into()],
            ..LenderRequirements::default()
        };
        let b = LenderRequirements {
            documents: vec!["Payoff".into()],
            ..LenderRequirements::default()
        };
        assert_eq!(cache_key("text", Some(&a)), cache_key("text", Some(&a)));
        assert_ne!(cache_key("text", Some(&a)), cache_key("text", Some(&b)));
        assert_ne!(cache_key("text", None), cache_key("other", None));
        assert_eq!(cache_key("text", None).len(), 64);
    }

    #[test]
    fn test_chat_response_parses_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"[\"Mortgage\"]"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "[\"Mortgage\"]");
    }
}
