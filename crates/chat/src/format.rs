use std::sync::OnceLock;

use regex::Regex;

/// Bot API hard limit is 4096; the margin leaves room for keyboards and entities.
pub const MESSAGE_CHUNK_CHARS: usize = 3_500;
pub const EMPTY_REPLY: &str = "(empty reply)";

fn markup_symbols() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[*#]+").expect("valid markup regex"))
}

fn block_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n{2,}").expect("valid block regex"))
}

fn bullet_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-•—*]+\s*").expect("valid bullet regex"))
}

fn number_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+[).\-–]\s*").expect("valid numbering regex"))
}

pub fn strip_markup(text: &str) -> String {
    markup_symbols().replace_all(text, "").into_owned()
}

fn strip_list_marker(line: &str) -> String {
    let without_bullet = bullet_marker().replace(line.trim(), "");
    number_marker().replace(without_bullet.trim(), "").trim().to_owned()
}

/// Reshapes model output into plain Telegram text.
///
/// Each paragraph becomes a `🔹` header followed by `•` bullets. A `Header: body` first
/// line is split so the body becomes the first bullet.
pub fn format_generated(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let normalized = strip_markup(normalized.trim());
    if normalized.is_empty() {
        return String::new();
    }

    let blocks: Vec<String> = block_break()
        .split(&normalized)
        .filter_map(format_block)
        .collect();
    if blocks.is_empty() {
        normalized
    } else {
        blocks.join("\n\n")
    }
}

fn format_block(block: &str) -> Option<String> {
    let lines: Vec<&str> = block.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
    let (first, rest) = lines.split_first()?;

    let mut header = strip_list_marker(first);
    if header.is_empty() {
        header = (*first).to_owned();
    }

    let mut body = Vec::new();
    if let Some((head, inline)) = split_header(&header) {
        if !inline.is_empty() {
            body.push(inline.to_owned());
        }
        header = head.to_owned();
    }
    body.extend(rest.iter().map(|line| strip_list_marker(line)));

    let bullets: Vec<String> =
        body.into_iter().filter(|line| !line.is_empty()).map(|line| format!("• {line}")).collect();

    let header = if header.is_empty() { String::new() } else { format!("🔹 {header}") };
    let formatted = match (header.is_empty(), bullets.is_empty()) {
        (true, true) => return None,
        (false, true) => header,
        (true, false) => bullets.join("\n"),
        (false, false) => format!("{header}\n{}", bullets.join("\n")),
    };
    Some(formatted)
}

/// Splits on the first colon that is not part of a URL scheme.
fn split_header(line: &str) -> Option<(&str, &str)> {
    let index = line.find(':')?;
    if line[index..].starts_with("://") {
        return None;
    }
    Some((line[..index].trim(), line[index + 1..].trim()))
}

/// Splits text into chunks of at most `chunk_chars` characters.
///
/// Prefers a newline, then a space, when one falls in the second half of the window;
/// otherwise cuts hard. Empty input yields a single placeholder chunk.
pub fn split_message(text: &str, chunk_chars: usize) -> Vec<String> {
    let cleaned = text.replace('\0', " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return vec![EMPTY_REPLY.to_owned()];
    }

    let chunk_chars = chunk_chars.max(2);
    let mut parts = Vec::new();
    let mut remaining = cleaned;
    while !remaining.is_empty() {
        if remaining.chars().count() <= chunk_chars {
            parts.push(remaining.to_owned());
            break;
        }

        let limit = byte_offset(remaining, chunk_chars);
        let half = byte_offset(remaining, chunk_chars / 2);
        let window = &remaining[..limit];
        let acceptable = |index: &usize| *index > 0 && *index >= half;
        let split = window
            .rfind('\n')
            .filter(acceptable)
            .or_else(|| window.rfind(' ').filter(acceptable))
            .unwrap_or(limit);

        let head = remaining[..split].trim();
        if !head.is_empty() {
            parts.push(head.to_owned());
        }
        remaining = remaining[split..].trim_start();
    }
    parts
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map(|(index, _)| index).unwrap_or(text.len())
}
