//! Reply drafting, triage and summaries through a text-generation provider.
//!
//! [`Generator`] is a closed set of two providers: OpenAI chat completions
//! and the Anthropic messages API. [`ReplyDrafter`] holds a primary
//! generator and an optional long-form one, which is used for inputs
//! longer than `long_form_threshold` characters.

use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::schema::GenerationConfig;
use crate::error::ProviderError;
use crate::http_client::{build_client, read_json};
use crate::ingest::Summarizer;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const REPLY_SYSTEM: &str = "You are a helpful support assistant. Write brief, conversational \
responses. No markdown formatting, bullet points, or special characters. Keep responses under \
150 words.";

const SUMMARY_SYSTEM: &str = "You are a technical support summarizer. Create concise summaries \
that preserve specific keywords, symptoms, error messages, and technical details. Focus on WHAT \
the problem is, not meta-descriptions.";

fn reply_prompt(report: &str) -> String {
    format!(
        "Based on these similar past tickets, write a brief helpful message (3-4 sentences max):\n\n\
         {report}\n\n\
         Include: what the issue is, what usually helps, and 1-2 simple next steps. \
         Write naturally like talking to a person."
    )
}

fn triage_prompt(ticket_text: &str) -> String {
    format!(
        "Analyze this ticket and provide:\n\
         1. Issue Category (e.g., billing, technical, account)\n\
         2. Urgency Level (low/medium/high)\n\
         3. Customer Sentiment (positive/neutral/negative)\n\
         4. Key Problem Statement (one sentence)\n\n\
         Ticket Info:\n{ticket_text}\n\n\
         Respond in this format:\n\
         Category: [category]\n\
         Urgency: [level]\n\
         Sentiment: [sentiment]\n\
         Problem: [statement]\n"
    )
}

fn summary_prompt(description: &str) -> String {
    format!(
        "Create a 2-3 sentence summary of this support ticket. Preserve specific keywords, \
         error messages, and symptoms:\n\n{description}"
    )
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Connection details shared by both generator variants.
pub struct ChatEndpoint {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

impl std::fmt::Debug for ChatEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEndpoint")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatEndpoint {
    fn new(
        api_base: &str,
        path: &str,
        model: &str,
        api_key: String,
        config: &GenerationConfig,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config.timeout_ms)?,
            endpoint: format!("{}/{path}", api_base.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Debug)]
pub enum Generator {
    OpenAi(ChatEndpoint),
    Anthropic(ChatEndpoint),
}

impl Generator {
    pub fn openai(config: &GenerationConfig, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self::OpenAi(ChatEndpoint::new(
            &config.openai_api_base,
            "chat/completions",
            &config.openai_model,
            api_key,
            config,
        )?))
    }

    pub fn anthropic(config: &GenerationConfig, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self::Anthropic(ChatEndpoint::new(
            &config.anthropic_api_base,
            "messages",
            &config.anthropic_model,
            api_key,
            config,
        )?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Anthropic(_) => "anthropic",
        }
    }

    fn request_body(&self, system: Option<&str>, prompt: &str) -> Value {
        match self {
            Self::OpenAi(ep) => {
                let mut messages = Vec::new();
                if let Some(system) = system {
                    messages.push(json!({ "role": "system", "content": system }));
                }
                messages.push(json!({ "role": "user", "content": prompt }));
                json!({
                    "model": ep.model,
                    "temperature": 0,
                    "max_tokens": ep.max_tokens,
                    "messages": messages,
                })
            }
            Self::Anthropic(ep) => {
                let mut body = json!({
                    "model": ep.model,
                    "temperature": 0,
                    "max_tokens": ep.max_tokens,
                    "messages": [{ "role": "user", "content": prompt }],
                });
                if let Some(system) = system {
                    body["system"] = json!(system);
                }
                body
            }
        }
    }

    fn parse_response(&self, json: &Value) -> Result<String, ProviderError> {
        let text = match self {
            Self::OpenAi(_) => json
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .map(str::to_string),
            Self::Anthropic(_) => json.get("content").and_then(Value::as_array).map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            }),
        };
        text.map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!("{} response has no text content", self.name()))
            })
    }

    /// One completion. No retries.
    pub fn generate(&self, system: Option<&str>, prompt: &str) -> Result<String, ProviderError> {
        let body = self.request_body(system, prompt);
        let request = match self {
            Self::OpenAi(ep) => ep.client.post(&ep.endpoint).bearer_auth(&ep.api_key),
            Self::Anthropic(ep) => ep
                .client
                .post(&ep.endpoint)
                .header("x-api-key", &ep.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        };
        let json = read_json(request.json(&body).send()?)?;
        self.parse_response(&json)
    }
}

// ---------------------------------------------------------------------------
// Triage
// ---------------------------------------------------------------------------

/// Structured triage of a ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketTriage {
    pub category: String,
    pub urgency: String,
    pub sentiment: String,
    pub problem: String,
}

impl TicketTriage {
    /// Parse `Label: value` lines. Missing labels become `"unknown"`.
    pub fn parse(text: &str) -> Self {
        let field = |label: &str| {
            text.lines()
                .map(str::trim)
                .find_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    let key = key.trim().trim_matches(|c: char| c == '*' || c == '#').trim();
                    key.eq_ignore_ascii_case(label).then(|| value.trim().to_string())
                })
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "unknown".to_string())
        };
        Self {
            category: field("category"),
            urgency: field("urgency").to_lowercase(),
            sentiment: field("sentiment").to_lowercase(),
            problem: field("problem"),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Category: {}\nUrgency: {}\nSentiment: {}\nProblem: {}",
            self.category, self.urgency, self.sentiment, self.problem
        )
    }
}

// ---------------------------------------------------------------------------
// ReplyDrafter
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ReplyDrafter {
    primary: Generator,
    long_form: Option<Generator>,
    long_form_threshold: usize,
}

impl ReplyDrafter {
    pub fn new(primary: Generator, long_form: Option<Generator>, long_form_threshold: usize) -> Self {
        Self {
            primary,
            long_form,
            long_form_threshold,
        }
    }

    /// Build from config. `Ok(None)` when generation is disabled.
    ///
    /// OpenAI is primary and Anthropic long-form when both keys are set.
    /// With a single key, that provider serves everything.
    pub fn from_config<F>(config: &GenerationConfig, lookup: F) -> Result<Option<Self>, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !config.enabled {
            return Ok(None);
        }
        let key = |name: &str| lookup(name).filter(|k| !k.trim().is_empty());
        let openai = key(&config.openai_api_key_env)
            .map(|k| Generator::openai(config, k))
            .transpose()?;
        let anthropic = key(&config.anthropic_api_key_env)
            .map(|k| Generator::anthropic(config, k))
            .transpose()?;

        let drafter = match (openai, anthropic) {
            (Some(primary), long_form) => Self::new(primary, long_form, config.long_form_threshold),
            (None, Some(primary)) => Self::new(primary, None, config.long_form_threshold),
            (None, None) => {
                return Err(ProviderError::Unavailable(format!(
                    "generation is enabled but neither {} nor {} is set",
                    config.openai_api_key_env, config.anthropic_api_key_env
                )))
            }
        };
        tracing::info!(
            primary = drafter.primary.name(),
            long_form = drafter.long_form.as_ref().map(Generator::name),
            "reply drafter ready"
        );
        Ok(Some(drafter))
    }

    /// Generator for an input of this size.
    pub fn select(&self, input: &str) -> &Generator {
        match &self.long_form {
            Some(long_form) if input.chars().count() > self.long_form_threshold => long_form,
            _ => &self.primary,
        }
    }

    /// Customer-facing reply grounded in a similar-tickets report.
    pub fn draft_reply(&self, report: &str) -> Result<String, ProviderError> {
        let generator = self.select(report);
        tracing::debug!(generator = generator.name(), chars = report.len(), "drafting reply");
        generator.generate(Some(REPLY_SYSTEM), &reply_prompt(report))
    }

    /// Category, urgency, sentiment and problem statement for a ticket.
    pub fn triage(&self, ticket_text: &str) -> Result<TicketTriage, ProviderError> {
        let generator = self.long_form.as_ref().unwrap_or(&self.primary);
        let raw = generator.generate(None, &triage_prompt(ticket_text))?;
        Ok(TicketTriage::parse(&raw))
    }
}

impl Summarizer for ReplyDrafter {
    fn summarize(&self, description: &str) -> Result<String, ProviderError> {
        self.primary
            .generate(Some(SUMMARY_SYSTEM), &summary_prompt(description))
    }
}
