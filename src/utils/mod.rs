use url::Url;

/// Sanitize a string for safe filesystem usage, capped at 100 chars
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            match c {
                // Keep alphanumeric characters, spaces, hyphens, underscores, and dots
                c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
                _ => '_',
            }
        })
        .take(100)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Format a duration as HH:MM:SS, or MM:SS when under an hour
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Truncate to at most `max_chars` characters, respecting char boundaries
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Check if a URL is from YouTube
pub fn is_youtube_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    match parsed.host_str() {
        Some(host) => {
            let host = host.to_lowercase();
            host == "youtu.be" || host == "youtube.com" || host.ends_with(".youtube.com")
        }
        None => false,
    }
}

/// Extract the YouTube video id from watch/short/embed URL forms
pub fn extract_youtube_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();

    let id = if host == "youtu.be" {
        parsed.path().trim_start_matches('/').to_string()
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        match parsed.path() {
            "/watch" => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())?,
            path => path.strip_prefix("/embed/")?.to_string(),
        }
    } else {
        return None;
    };

    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Deep link into a YouTube video at an offset in seconds
pub fn youtube_timestamp_link(url: &str, seconds: f64) -> Option<String> {
    let id = extract_youtube_id(url)?;
    Some(format!(
        "https://youtube.com/watch?v={}&t={}",
        id, seconds as u64
    ))
}
