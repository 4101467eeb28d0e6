//! Formats transcript segments into readable markdown.
//!
//! Two-stage approach: build continuous text with inline timestamps at
//! regular intervals, then insert paragraph breaks at sentence boundaries
//! without altering the content.

use crate::sources::{SourceInfo, SourceKind};
use crate::transcribe::{Transcript, TranscriptSegment};
use crate::utils::{format_timestamp, is_youtube_url, youtube_timestamp_link};

/// Seconds between inline timestamps in the markdown body
const TIMESTAMP_INTERVAL_SECONDS: f64 = 30.0;

/// Sentences per paragraph before a break is considered
const SENTENCES_PER_PARAGRAPH: usize = 4;

/// Words that should not start a new paragraph
const CONTINUATION_WORDS: &[&str] = &[
    "but",
    "and",
    "so",
    "because",
    "however",
    "although",
    "while",
    "yet",
    "furthermore",
    "moreover",
    "therefore",
    "thus",
];

/// Render a transcript as markdown with metadata header and timestamped,
/// paragraphed body
pub fn format_transcript(transcript: &Transcript, info: &SourceInfo) -> String {
    let source_display = match &info.kind {
        SourceKind::Remote { url } => url.clone(),
        SourceKind::Local { path } => path.display().to_string(),
    };

    let mut lines = vec![
        format!("# {}", info.title),
        String::new(),
        "## Media Information".to_string(),
        String::new(),
        format!("- **Source**: {}", source_display),
        format!("- **Duration**: {}", format_timestamp(info.duration_seconds)),
    ];

    if let Some(uploader) = &info.uploader {
        lines.push(format!("- **Uploader**: {}", uploader));
    }
    if let Some(language) = &transcript.language {
        lines.push(format!("- **Language**: {}", language));
    }
    lines.push(format!(
        "- **Transcribed**: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(String::new());

    if let Some(description) = &info.description {
        lines.extend([
            "## Description".to_string(),
            String::new(),
            description.clone(),
            String::new(),
        ]);
    }

    lines.extend(["## Transcript".to_string(), String::new()]);

    if transcript.segments.is_empty() {
        lines.push(transcript.text.clone());
    } else {
        let video_url = info
            .source_url()
            .filter(|url| is_youtube_url(url));
        let continuous = build_continuous_text(&transcript.segments, video_url);
        lines.push(add_paragraph_breaks(&continuous));
    }
    lines.push(String::new());

    lines.join("\n")
}

/// Stage 1: flowing text with a timestamp marker roughly every 30 seconds,
/// deep-linked when the source is a YouTube URL
fn build_continuous_text(segments: &[TranscriptSegment], video_url: Option<&str>) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut last_timestamp = 0.0;

    for segment in segments {
        if segment.start >= last_timestamp + TIMESTAMP_INTERVAL_SECONDS {
            let stamp = format_timestamp(segment.start);
            let marker = match video_url.and_then(|url| youtube_timestamp_link(url, segment.start))
            {
                Some(link) => format!(" [{}]({})", stamp, link),
                None => format!(" [{}]", stamp),
            };
            parts.push(marker);
            last_timestamp = segment.start;
        }

        parts.push(format!(" {}", segment.text.trim()));
    }

    parts.concat().trim().to_string()
}

/// Stage 2: paragraph breaks every few sentences, skipping breaks before
/// continuation words so thoughts stay together
fn add_paragraph_breaks(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let sentences = split_sentences(text);

    let mut result = String::new();
    let mut paragraph: Vec<&str> = Vec::new();

    for (i, sentence) in sentences.iter().enumerate() {
        paragraph.push(sentence);

        let is_last = i + 1 == sentences.len();
        if paragraph.len() >= SENTENCES_PER_PARAGRAPH && !is_last {
            let next_first_word = first_word_ignoring_timestamps(sentences[i + 1]);
            let continuation = next_first_word
                .map(|w| CONTINUATION_WORDS.contains(&w.to_lowercase().as_str()))
                .unwrap_or(false);

            if !continuation {
                if !result.is_empty() {
                    result.push_str("\n\n");
                }
                result.push_str(&paragraph.join(" "));
                paragraph.clear();
            }
        }
    }

    if !paragraph.is_empty() {
        if !result.is_empty() {
            result.push_str("\n\n");
        }
        result.push_str(&paragraph.join(" "));
    }

    result
}

/// Split on `.` `!` `?` followed by whitespace, keeping the punctuation
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_idx, next_c)) = chars.peek() {
                if next_c.is_whitespace() {
                    sentences.push(text[start..next_idx].trim());
                    start = next_idx;
                }
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// First word of a sentence, skipping any leading `[MM:SS](link)` markers
fn first_word_ignoring_timestamps(sentence: &str) -> Option<&str> {
    let mut rest = sentence.trim_start();

    while rest.starts_with('[') {
        let close = rest.find(']')?;
        rest = &rest[close + 1..];
        if rest.starts_with('(') {
            let close = rest.find(')')?;
            rest = &rest[close + 1..];
        }
        rest = rest.trim_start();
    }

    rest.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;

    fn segment(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: text.to_string(),
            confidence: None,
        }
    }

    fn youtube_info() -> SourceInfo {
        SourceInfo {
            id: "vid42".to_string(),
            title: "Sample Talk".to_string(),
            duration_seconds: 300.0,
            uploader: Some("Speaker".to_string()),
            description: Some("A talk about things.".to_string()),
            kind: SourceKind::Remote {
                url: "https://youtube.com/watch?v=vid42".to_string(),
            },
        }
    }

    #[test]
    fn test_header_contains_metadata() {
        let transcript = Transcript {
            text: "Hello.".to_string(),
            language: Some("en-US".to_string()),
            duration_seconds: 300.0,
            segments: vec![segment(0.0, 2.0, "Hello.")],
        };

        let md = format_transcript(&transcript, &youtube_info());
        assert!(md.starts_with("# Sample Talk"));
        assert!(md.contains("- **Source**: https://youtube.com/watch?v=vid42"));
        assert!(md.contains("- **Duration**: 05:00"));
        assert!(md.contains("- **Uploader**: Speaker"));
        assert!(md.contains("- **Language**: en-US"));
        assert!(md.contains("## Description"));
        assert!(md.contains("## Transcript"));
    }

    #[test]
    fn test_timestamps_inserted_at_interval() {
        let segments = vec![
            segment(0.0, 10.0, "First part."),
            segment(10.0, 20.0, "Second part."),
            segment(35.0, 45.0, "Third part."),
        ];

        let text = build_continuous_text(&segments, None);
        // One marker at the 35s segment; nothing before the interval elapses
        assert_eq!(text, "First part. Second part. [00:35] Third part.");
    }

    #[test]
    fn test_timestamps_link_to_youtube() {
        let segments = vec![
            segment(0.0, 10.0, "Intro."),
            segment(40.0, 50.0, "Later."),
        ];

        let text = build_continuous_text(&segments, Some("https://youtu.be/vid42"));
        assert!(text.contains("[00:40](https://youtube.com/watch?v=vid42&t=40)"));
    }

    #[test]
    fn test_paragraph_breaks_every_four_sentences() {
        let text = "One one. Two two. Three three. Four four. Five five. Six six.";
        let result = add_paragraph_breaks(text);

        let paragraphs: Vec<&str> = result.split("\n\n").collect();
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs[0].ends_with("Four four."));
    }

    #[test]
    fn test_no_break_before_continuation_word() {
        let text = "One. Two. Three. Four. But five. Six. Seven. Eight. Nine.";
        let result = add_paragraph_breaks(text);

        // "But five." must stay attached to its preceding paragraph
        let first = result.split("\n\n").next().unwrap();
        assert!(first.contains("But five."));
    }

    #[test]
    fn test_first_word_skips_timestamp_markers() {
        assert_eq!(
            first_word_ignoring_timestamps("[01:30](https://youtube.com/x) However we go"),
            Some("However")
        );
        assert_eq!(first_word_ignoring_timestamps("[02:00] And then"), Some("And"));
        assert_eq!(first_word_ignoring_timestamps("Plain words"), Some("Plain"));
    }

    #[test]
    fn test_plain_text_fallback_without_segments() {
        let transcript = Transcript {
            text: "Just the raw text.".to_string(),
            language: None,
            duration_seconds: 0.0,
            segments: vec![],
        };

        let md = format_transcript(&transcript, &youtube_info());
        assert!(md.contains("Just the raw text."));
    }
}
