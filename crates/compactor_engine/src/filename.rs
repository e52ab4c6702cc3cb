use sha2::{Digest, Sha256};

const MAX_TITLE_LEN: usize = 60;

/// Filesystem-safe, timestamped export name:
/// `{prefix}_{sanitized_title}--{short_hash(source)}_{timestamp}.md`.
///
/// The hash keeps exports of different conversations with the same title
/// apart; the timestamp keeps repeated exports of one conversation apart.
pub fn artifact_filename(prefix: &str, title: &str, source: &str, timestamp: &str) -> String {
    let title = sanitize(title, "conversation");
    let stamp = sanitize(timestamp, "undated");
    let hash = short_hash(source);
    format!("{prefix}_{title}--{hash}_{stamp}.md")
}

fn sanitize(input: &str, fallback: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.trim().chars() {
        let c = if is_forbidden(c) || c.is_whitespace() {
            '_'
        } else {
            c
        };
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    let mut cleaned: String = compacted
        .trim_matches(&['_', '.'][..])
        .chars()
        .take(MAX_TITLE_LEN)
        .collect();
    if cleaned.is_empty() {
        cleaned = fallback.to_string();
    }
    cleaned
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
