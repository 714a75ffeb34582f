use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};


const SYSTEM_PROMPT: &str = "You extract named entities for supply chain risk analysis. \
Respond only with a JSON array of strings.";

const USER_PROMPT_TEMPLATE: &str = r#"List every company, product, location, logistics node and risk event named in the question.
Return ONLY a JSON array of the names exactly as written.

Question: "Will the Rotterdam flooding delay Nordwind Motors?"
Answer: ["Rotterdam flooding", "Nordwind Motors"]

Question: "{query}"
Answer:"#;

lazy_static! {
    static ref JSON_ARRAY: Regex = Regex::new(r"(?s)\[.*\]").expect("static regex");
}


#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}


/// Proposes entity surface forms found in a question.
#[async_trait]
pub trait MentionExtractor: Send + Sync {
    async fn extract(&self, query: &str) -> Result<Vec<String>, ExtractionError>;
}


#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}


pub struct OllamaMentionExtractor {
    base_url: String,
    model: String,
    temperature: f64,
    client: Client,
}

impl OllamaMentionExtractor {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        timeout: Duration,
    ) -> Result<Self, ExtractionError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        info!("Ollama mention extractor initialized (model={}, url={})", model, base_url);
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url,
            model,
            temperature,
        })
    }
}

#[async_trait]
impl MentionExtractor for OllamaMentionExtractor {
    async fn extract(&self, query: &str) -> Result<Vec<String>, ExtractionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: USER_PROMPT_TEMPLATE.replace("{query}", query),
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        let mentions = parse_mentions(&response.message.content);
        debug!("LLM proposed {} mentions", mentions.len());
        Ok(mentions)
    }
}


/// Pulls the first JSON array out of a model reply. Anything unparseable yields no names.
pub fn parse_mentions(response: &str) -> Vec<String> {
    let Some(found) = JSON_ARRAY.find(response) else {
        warn!("No JSON array in extractor reply: {}", crate::safe_truncate_ellipsis(response, 80));
        return Vec::new();
    };

    match serde_json::from_str::<Vec<serde_json::Value>>(found.as_str()) {
        Ok(values) => values
            .into_iter()
            .filter_map(|value| match value {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Err(e) => {
            warn!("Could not parse extractor reply as JSON array: {}", e);
            Vec::new()
        }
    }
}
