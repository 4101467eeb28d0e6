use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::transcribe::Transcript;
use crate::utils::format_timestamp;
use crate::Result;

pub mod anthropic;

pub use anthropic::AnthropicEnricher;

/// Quotes shown in the main section; the rest go to "Additional Quotes"
const NOTABLE_QUOTE_LIMIT: usize = 7;

/// Structured summary with overview and key points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// 2-3 sentence overview
    pub overview: String,

    /// 3-5 bullet points
    pub key_points: Vec<String>,

    /// Main themes discussed
    pub themes: Vec<String>,
}

/// A memorable quote with context and timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,

    /// Seconds into the media
    pub timestamp: f64,

    /// YouTube deep link, if applicable
    pub timestamp_link: Option<String>,

    /// Why this quote matters
    pub context: String,
}

/// Text-based enrichment capability
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn summarize(&self, transcript_text: &str, title: &str) -> Result<Summary>;

    async fn extract_quotes(
        &self,
        transcript: &Transcript,
        source_url: Option<&str>,
        item_id: &str,
    ) -> Result<Vec<Quote>>;
}

/// Combine summary and quotes into a single insights document
///
/// Handles missing summary or quotes; when both are absent a note explains
/// why the document is empty.
pub fn generate_insights(summary: Option<&Summary>, quotes: &[Quote], title: &str) -> String {
    let mut lines = vec![format!("# Insights: {}", title), String::new()];

    if let Some(summary) = summary {
        if !summary.overview.is_empty() {
            lines.extend([
                "## Overview".to_string(),
                String::new(),
                summary.overview.clone(),
                String::new(),
            ]);
        }

        if !summary.key_points.is_empty() {
            lines.extend(["## Key Points".to_string(), String::new()]);
            for point in &summary.key_points {
                lines.push(format!("- {}", point));
            }
            lines.push(String::new());
        }
    }

    if !quotes.is_empty() {
        lines.extend(["## Notable Quotes".to_string(), String::new()]);

        for quote in quotes.iter().take(NOTABLE_QUOTE_LIMIT) {
            let stamp = format_timestamp(quote.timestamp);

            lines.push(format!("> \"{}\"", quote.text));
            match &quote.timestamp_link {
                Some(link) => lines.push(format!("> - [{}]({})", stamp, link)),
                None => lines.push(format!("> - [{}]", stamp)),
            }
            if !quote.context.is_empty() {
                lines.push(">".to_string());
                lines.push(format!("> *{}*", quote.context));
            }
            lines.push(String::new());
        }
    }

    if let Some(summary) = summary {
        if !summary.themes.is_empty() {
            lines.extend(["## Central Themes".to_string(), String::new()]);
            for theme in &summary.themes {
                lines.push(format!("- {}", theme));
            }
            lines.push(String::new());
        }
    }

    if quotes.len() > NOTABLE_QUOTE_LIMIT {
        lines.extend(["## Additional Quotes".to_string(), String::new()]);
        for quote in &quotes[NOTABLE_QUOTE_LIMIT..] {
            let stamp = format_timestamp(quote.timestamp);
            match &quote.timestamp_link {
                Some(link) => {
                    lines.push(format!("- \"{}\" [[{}]({})]", quote.text, stamp, link))
                }
                None => lines.push(format!("- \"{}\" [{}]", quote.text, stamp)),
            }
        }
        lines.push(String::new());
    }

    if summary.is_none() && quotes.is_empty() {
        lines.extend([
            "## Note".to_string(),
            String::new(),
            "_No insights were generated for this content. This may be due to \
             processing errors or unavailable AI services._"
                .to_string(),
            String::new(),
        ]);
    }

    lines.join("\n")
}
