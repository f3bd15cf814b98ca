/// Cleans user text before it is embedded in an extraction prompt: drops
/// control characters, swaps double quotes for single quotes and collapses
/// all whitespace (newlines included) to single spaces.
pub fn sanitize_for_prompt(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !is_stripped_control(*c))
        .map(|c| match c {
            '"' => '\'',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Tab, LF and CR survive the filter; LF/CR are folded into spaces afterwards.
fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}
