const FENCE: &str = "```";

/// Strip a Markdown code fence wrapped around the model output.
///
/// Removes one opening fence (with an optional language tag such as `json`)
/// and one closing fence, plus surrounding whitespace. The content itself is
/// not parsed or validated.
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        text = match rest.find('\n') {
            Some(newline) if is_language_tag(&rest[..newline]) => &rest[newline + 1..],
            None if is_language_tag(rest) => "",
            _ => rest,
        };
    }

    text = text.trim_end();
    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }

    text.trim().to_string()
}

fn is_language_tag(s: &str) -> bool {
    s.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
}
