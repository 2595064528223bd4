use std::sync::LazyLock;

use regex::Regex;

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static BLANK_LINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static regex"));
/// Shape of the `:name_part:` codes the converter emits for emoji images.
/// Only this shape is exempt; every other underscore is rewritten.
static SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":[a-z0-9+\-]+(?:_[a-z0-9+\-]+)+:").expect("static regex"));

/// Glyphs the web client renders in place of the workspace's own shortcodes.
const GLYPH_SHORTCODES: [(&str, &str); 4] = [
    ("\u{261d}\u{fe0f}", ":point_up:"),
    ("\u{261d}", ":point_up:"),
    ("\u{263a}\u{fe0f}", ":relaxed:"),
    ("\u{263a}", ":relaxed:"),
];

/// Final clean-up of converted message text; the result is trimmed.
///
/// Underscore emphasis becomes asterisk emphasis. Emoji shortcodes such as
/// `:white_check_mark:` keep their underscores.
pub fn normalize_text(raw: &str) -> String {
    let collapsed = EXCESS_NEWLINES.replace_all(raw, "\n\n");
    let collapsed = BLANK_LINE_RUN.replace_all(&collapsed, "\n\n");
    let mut text = underscores_to_asterisks(&collapsed);
    for (glyph, shortcode) in GLYPH_SHORTCODES {
        if text.contains(glyph) {
            text = text.replace(glyph, shortcode);
        }
    }
    text.trim().to_string()
}

fn underscores_to_asterisks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for code in SHORTCODE.find_iter(text) {
        out.push_str(&text[last..code.start()].replace('_', "*"));
        out.push_str(code.as_str());
        last = code.end();
    }
    out.push_str(&text[last..].replace('_', "*"));
    out
}
