use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Enricher, Quote, Summary};
use crate::config::EnhancementConfig;
use crate::transcribe::Transcript;
use crate::utils::{is_youtube_url, truncate_chars};
use crate::Result;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Add a timestamp marker every N segments in the quote-extraction input
const TIMESTAMP_EVERY_SEGMENTS: usize = 5;

/// Cap on segments sent for quote extraction
const MAX_QUOTE_SEGMENTS: usize = 100;

/// Enricher backed by the Anthropic Messages API
pub struct AnthropicEnricher {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_input_chars: usize,
}

impl AnthropicEnricher {
    /// Build from config, reading the API key from `ANTHROPIC_API_KEY`
    pub fn from_env(config: &EnhancementConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY not set")?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
            max_input_chars: config.max_input_chars,
        })
    }

    async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "temperature": 0.3,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("Anthropic API request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API returned {}: {}", status, detail);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| anyhow::anyhow!("Anthropic API response contained no text"))
    }

    /// Quote-extraction input: segment text with a `[MM:SS]` marker every few
    /// segments so the model can report timestamps
    fn transcript_with_timestamps(&self, transcript: &Transcript) -> String {
        if transcript.segments.is_empty() {
            return transcript.text.clone();
        }

        let mut formatted = String::new();
        for (i, segment) in transcript.segments.iter().take(MAX_QUOTE_SEGMENTS).enumerate() {
            if i % TIMESTAMP_EVERY_SEGMENTS == 0 {
                let minutes = (segment.start / 60.0) as u64;
                let seconds = (segment.start % 60.0) as u64;
                formatted.push_str(&format!("\n[{:02}:{:02}] ", minutes, seconds));
            }
            formatted.push_str(&segment.text);
            formatted.push(' ');
        }

        formatted
    }
}

#[async_trait]
impl Enricher for AnthropicEnricher {
    async fn summarize(&self, transcript_text: &str, title: &str) -> Result<Summary> {
        let prompt = format!(
            "Please summarize this transcript titled \"{title}\".\n\n\
             Provide:\n\
             1. A 2-3 sentence overview that captures the essence of the content\n\
             2. 3-5 key takeaways or insights (as bullet points)\n\
             3. 2-4 main themes discussed\n\n\
             Focus on actionable insights and important ideas. Be concise.\n\n\
             Transcript:\n{transcript}\n\n\
             Please respond in this exact format:\n\
             OVERVIEW:\n\
             [Your 2-3 sentence overview here]\n\n\
             KEY POINTS:\n\
             - [Point 1]\n\
             - [Point 2]\n\n\
             THEMES:\n\
             - [Theme 1]\n\
             - [Theme 2]\n",
            title = title,
            transcript = truncate_chars(transcript_text, self.max_input_chars),
        );

        let response = self.complete(prompt, 1000).await?;
        Ok(parse_summary(&response))
    }

    async fn extract_quotes(
        &self,
        transcript: &Transcript,
        source_url: Option<&str>,
        item_id: &str,
    ) -> Result<Vec<Quote>> {
        let input = self.transcript_with_timestamps(transcript);

        let prompt = format!(
            "Extract 3-5 memorable, insightful quotes from this transcript.\n\n\
             Choose quotes that:\n\
             - Capture key ideas or surprising insights\n\
             - Are complete thoughts (not fragments)\n\
             - Would stand alone as meaningful statements\n\n\
             For each quote, provide the exact text, the timestamp in seconds \
             when it appears, and context explaining why it is significant.\n\n\
             Transcript:\n{transcript}\n\n\
             Respond in JSON format with an array of quotes:\n\
             [\n  {{\"text\": \"The exact quote\", \"timestamp\": 123.5, \
             \"context\": \"Why this quote matters\"}}\n]\n",
            transcript = truncate_chars(&input, self.max_input_chars),
        );

        let response = self.complete(prompt, 2000).await?;
        let raw_quotes = parse_quotes(&response)?;

        let link_base = source_url.filter(|url| is_youtube_url(url));
        let quotes = raw_quotes
            .into_iter()
            .map(|raw| {
                let timestamp_link = link_base.map(|_| {
                    format!(
                        "https://youtube.com/watch?v={}&t={}s",
                        item_id, raw.timestamp as u64
                    )
                });
                Quote {
                    text: raw.text,
                    timestamp: raw.timestamp,
                    timestamp_link,
                    context: raw.context,
                }
            })
            .collect();

        Ok(quotes)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(default)]
    text: String,
    #[serde(default)]
    timestamp: f64,
    #[serde(default)]
    context: String,
}

/// Parse the OVERVIEW / KEY POINTS / THEMES response format
fn parse_summary(response: &str) -> Summary {
    let mut overview = String::new();
    let mut key_points = Vec::new();
    let mut themes = Vec::new();

    #[derive(PartialEq)]
    enum Section {
        None,
        Overview,
        KeyPoints,
        Themes,
    }
    let mut section = Section::None;

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("OVERVIEW:") {
            section = Section::Overview;
            continue;
        }
        if line.starts_with("KEY POINTS:") {
            section = Section::KeyPoints;
            continue;
        }
        if line.starts_with("THEMES:") {
            section = Section::Themes;
            continue;
        }

        match section {
            Section::Overview => {
                if !overview.is_empty() {
                    overview.push(' ');
                }
                overview.push_str(line);
            }
            Section::KeyPoints => {
                if let Some(point) = line.strip_prefix("- ") {
                    key_points.push(point.to_string());
                }
            }
            Section::Themes => {
                if let Some(theme) = line.strip_prefix("- ") {
                    themes.push(theme.to_string());
                }
            }
            Section::None => {}
        }
    }

    if overview.is_empty() {
        overview = "Summary could not be generated.".to_string();
    }
    if key_points.is_empty() {
        key_points.push("No key points extracted".to_string());
    }
    if themes.is_empty() {
        themes.push("No themes identified".to_string());
    }

    Summary {
        overview,
        key_points,
        themes,
    }
}

/// Parse the quotes JSON array, tolerating markdown code fences
fn parse_quotes(response: &str) -> Result<Vec<RawQuote>> {
    let mut text = response.trim();

    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    } else if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }

    serde_json::from_str(text.trim()).context("Failed to parse quotes JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary_sections() {
        let response = "\
OVERVIEW:
This talk covers testing strategies.
It argues for fast feedback loops.

KEY POINTS:
- Write tests first
- Keep them fast

THEMES:
- Testing
- Feedback";

        let summary = parse_summary(response);
        assert_eq!(
            summary.overview,
            "This talk covers testing strategies. It argues for fast feedback loops."
        );
        assert_eq!(summary.key_points, vec!["Write tests first", "Keep them fast"]);
        assert_eq!(summary.themes, vec!["Testing", "Feedback"]);
    }

    #[test]
    fn test_parse_summary_fallbacks() {
        let summary = parse_summary("no structure at all");
        assert_eq!(summary.overview, "Summary could not be generated.");
        assert_eq!(summary.key_points, vec!["No key points extracted"]);
        assert_eq!(summary.themes, vec!["No themes identified"]);
    }

    #[test]
    fn test_parse_quotes_plain_json() {
        let response = r#"[{"text": "Quote one", "timestamp": 12.5, "context": "Opens the talk"}]"#;
        let quotes = parse_quotes(response).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].text, "Quote one");
        assert_eq!(quotes[0].timestamp, 12.5);
    }

    #[test]
    fn test_parse_quotes_with_code_fence() {
        let response = "```json\n[{\"text\": \"Fenced\", \"timestamp\": 3.0, \"context\": \"x\"}]\n```";
        let quotes = parse_quotes(response).unwrap();
        assert_eq!(quotes[0].text, "Fenced");
    }

    #[test]
    fn test_parse_quotes_rejects_non_array() {
        assert!(parse_quotes("{\"text\": \"not a list\"}").is_err());
        assert!(parse_quotes("not json").is_err());
    }
}
