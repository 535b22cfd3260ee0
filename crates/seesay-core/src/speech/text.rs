//! Splitting answer text into request-sized pieces

/// Google's TTS endpoint rejects longer inputs
pub const MAX_CHARS: usize = 100;

const BREAKING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];
const ALWAYS_BREAKING: &[char] = &['\n', '(', ')', '[', ']', '«', '»', '—', '¡', '¿'];

/// Break text into pieces of at most `max_chars` characters, preferring
/// sentence punctuation and then whitespace as split points. Pieces that
/// hold no letters or digits are dropped.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    split_on_punctuation(text)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .flat_map(|s| minimize(&s, max_chars))
        .collect()
}

fn split_on_punctuation(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let next_is_break = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        // "3.5" and "e.g." stay intact: punctuation only breaks before whitespace
        let breaks = ALWAYS_BREAKING.contains(&ch)
            || (BREAKING_PUNCTUATION.contains(&ch) && next_is_break);
        if breaks {
            pieces.push(&text[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Pack a piece into chunks of at most `max_chars`, splitting at the last
/// space that fits and hard-splitting words longer than the limit.
fn minimize(text: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > max_chars {
        let Some((limit, limit_char)) = rest.char_indices().nth(max_chars) else {
            break;
        };

        let cut = match rest[..limit + limit_char.len_utf8()].rfind(' ') {
            Some(space) if space > 0 => space,
            _ => limit,
        };
        out.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}
