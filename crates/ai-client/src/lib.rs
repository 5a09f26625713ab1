//! Chat-completion client that turns a fused record into a short
//! narrative analysis.
//!
//! The summarizer is strictly additive: callers treat any failure here as
//! "no narrative" and keep serving the numeric breakdown.

use std::env;
use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use screener_core::{FieldValue, FusedRecord, ScoreBreakdown};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Error, Debug)]
pub enum AiError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("Chat completion request failed: {0}")]
    Http(String),

    #[error("Chat completion returned status {0}")]
    Status(u16),

    #[error("Chat completion response had no choices")]
    EmptyResponse,
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl SummarizerConfig {
    /// Read the summarizer configuration from the environment. Only the
    /// API key is mandatory.
    pub fn from_env() -> Result<Self, AiError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| AiError::MissingApiKey)?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

pub struct SummarizerClient {
    config: SummarizerConfig,
    http: reqwest::Client,
}

impl SummarizerClient {
    pub fn new(config: SummarizerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http }
    }

    /// Render the fused fields, the score breakdown when present, and any
    /// caller-supplied context into the user prompt.
    pub fn build_prompt(
        record: &FusedRecord,
        score: Option<&ScoreBreakdown>,
        context: Option<&str>,
    ) -> String {
        let mut prompt = String::from("Analyze the following stock based on its fundamentals:\n");
        let _ = writeln!(prompt, "Symbol: {}", record.symbol);
        for field in screener_core::Field::ALL {
            if let Some(value) = record.fields.get(field) {
                if value.is_empty() {
                    continue;
                }
                match value {
                    FieldValue::Num(v) => {
                        let _ = writeln!(prompt, "{}: {v}", field.as_str());
                    }
                    FieldValue::Text(s) => {
                        let _ = writeln!(prompt, "{}: {s}", field.as_str());
                    }
                }
            }
        }
        if let Some(score) = score {
            let _ = writeln!(
                prompt,
                "Composite quant score: {}/9 (value {}, growth {}, tech {})",
                score.total_score, score.value_score, score.growth_score, score.tech_score
            );
        }
        if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
            let _ = writeln!(prompt, "Additional context: {context}");
        }
        prompt.push_str(
            "\nWrite a short analysis covering:\n\
             - Valuation (expensive / fair / cheap)\n\
             - Growth pace\n\
             - Overall risk\n\
             - Short-term and long-term potential\n",
        );
        prompt
    }

    pub async fn summarize(
        &self,
        record: &FusedRecord,
        score: Option<&ScoreBreakdown>,
        context: Option<&str>,
    ) -> Result<String, AiError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are an expert equity market analyst.".to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(record, score, context),
                },
            ],
            temperature: 0.7,
        };

        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .ok_or(AiError::EmptyResponse)?
            .message
            .content;

        tracing::debug!(symbol = %record.symbol, model = %self.config.model, "narrative generated");
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_only_present_fields() {
        let mut record = FusedRecord::new("AAPL");
        record.fields.name = Some("Apple Inc.".to_string());
        record.fields.pe = Some(29.4);
        record.fields.volume = Some(0.0); // falsy, must not appear

        let prompt = SummarizerClient::build_prompt(&record, None, None);
        assert!(prompt.contains("Symbol: AAPL"));
        assert!(prompt.contains("Name: Apple Inc."));
        assert!(prompt.contains("P/E: 29.4"));
        assert!(!prompt.contains("Volume"));
        assert!(!prompt.contains("Additional context"));
    }

    #[test]
    fn prompt_appends_context_and_score() {
        let record = FusedRecord::new("TSLA");
        let score = ScoreBreakdown {
            symbol: "TSLA".to_string(),
            computed_at: chrono_now(),
            daily_change_pct: None,
            pe_z: None,
            ps_z: None,
            pb_z: None,
            peg_flag: screener_core::PegFlag::NotAvailable,
            value_score: 1,
            growth_score: 2,
            tech_score: 3,
            total_score: 6,
            notes: vec![],
        };

        let prompt =
            SummarizerClient::build_prompt(&record, Some(&score), Some("  earnings next week "));
        assert!(prompt.contains("Composite quant score: 6/9"));
        assert!(prompt.contains("Additional context: earnings next week"));
    }

    fn chrono_now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
