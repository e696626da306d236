//! Plain-text rendering of provider message bodies.
//!
//! Bodies arrive in whatever markup dialect the provider speaks (HTML fragments, numeric
//! character references, stray whitespace). The normalizer is not a parser:
//! anything from `<` to the next `>` is dropped, and an unterminated `<` swallows the rest of
//! the input.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>?").expect("markup pattern"));

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([xX])?([0-9A-Za-z]*)|(nbsp|amp|lt|gt|quot));").expect("entity pattern")
});

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace pattern"));

const NBSP: u32 = 0xA0;

/// Normalizes an optional body; absent input yields an empty string.
///
/// ```
/// use chatmux_core::normalize;
///
/// assert_eq!(normalize(Some("Hello &amp; welcome <b>friend</b>")), "Hello & welcome friend");
/// assert_eq!(normalize(None), "");
/// ```
pub fn normalize(raw: Option<&str>) -> String {
    raw.map(normalize_str).unwrap_or_default()
}

/// Strips markup, decodes character references, and collapses whitespace.
///
/// Escaped delimiters decode to literal `<`, `>` and `&`, so feeding the output back in can
/// strip text that was only ever escaped markup (`&lt;b&gt;hi` gives `<b>hi`, then `hi`).
/// Normalize raw provider bodies once and do not re-normalize the result.
pub fn normalize_str(raw: &str) -> String {
    let stripped = MARKUP.replace_all(raw, "");
    let decoded = ENTITY.replace_all(&stripped, decode_entity);
    let collapsed = WHITESPACE_RUN.replace_all(&decoded, " ");
    collapsed.trim().to_string()
}

fn decode_entity(caps: &Captures<'_>) -> String {
    if let Some(named) = caps.get(3) {
        return match named.as_str() {
            "nbsp" => " ",
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            _ => "",
        }
        .to_string();
    }

    let digits = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let radix = if caps.get(1).is_some() { 16 } else { 10 };
    decode_code_point(digits, radix)
        .map(String::from)
        .unwrap_or_default()
}

fn decode_code_point(digits: &str, radix: u32) -> Option<char> {
    let value = u32::from_str_radix(digits, radix).ok()?;
    match value {
        0 => None,
        NBSP => Some(' '),
        other => char::from_u32(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_decodes_named_entities() {
        assert_eq!(
            normalize_str("Hello &amp; welcome <b>friend</b>"),
            "Hello & welcome friend"
        );
        assert_eq!(
            normalize_str("&quot;quoted&quot; &#39;single&#39;"),
            "\"quoted\" 'single'"
        );
    }

    #[test]
    fn escaped_markup_survives_as_text() {
        assert_eq!(normalize_str("&amp;&lt;b&gt;"), "&<b>");
    }

    #[test]
    fn renormalizing_decoded_markup_strips_it() {
        let once = normalize_str("&lt;b&gt;hi");
        assert_eq!(once, "<b>hi");
        assert_eq!(normalize_str(&once), "hi");
    }

    #[test]
    fn decodes_numeric_references() {
        assert_eq!(normalize_str("caf&#233;"), "café");
        assert_eq!(normalize_str("&#x1F600;!"), "\u{1F600}!");
        assert_eq!(normalize_str("&#X41;&#66;"), "AB");
    }

    #[test]
    fn unparseable_numeric_reference_becomes_empty() {
        assert_eq!(normalize_str("&#xZZZZ;"), "");
        assert_eq!(normalize_str("a&#12b;b"), "ab");
        assert_eq!(normalize_str("x&#xD800;y"), "xy");
        assert_eq!(normalize_str("&#99999999999;"), "");
    }

    #[test]
    fn non_breaking_spaces_become_spaces() {
        assert_eq!(normalize_str("a&nbsp;b&#160;c&#xA0;d"), "a b c d");
        assert_eq!(normalize_str("&nbsp;&nbsp;padded&nbsp;"), "padded");
    }

    #[test]
    fn unknown_named_entities_are_left_alone() {
        assert_eq!(normalize_str("&copy; 2024"), "&copy; 2024");
    }

    #[test]
    fn decoding_is_single_pass() {
        assert_eq!(normalize_str("&amp;amp;"), "&amp;");
    }

    #[test]
    fn unterminated_tag_consumes_remainder() {
        assert_eq!(normalize_str("keep this <a href='x' and lose this"), "keep this");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(normalize_str("  one \n\n two\t\tthree  "), "one two three");
        assert_eq!(normalize_str("single\nbreak"), "single\nbreak");
        assert_eq!(normalize_str("<p>para</p>\n\n<p>graph</p>"), "para graph");
    }

    #[test]
    fn is_idempotent_on_rendered_text() {
        let samples = [
            "Hello &amp; welcome <b>friend</b>",
            "<div>  multi \n\n line   </div>",
            "plain text",
            "&#xZZZZ; tail",
            "caf&#233; &nbsp; bar",
            "",
            "<br/><br/>",
        ];
        for sample in samples {
            let once = normalize_str(sample);
            assert_eq!(normalize_str(&once), once, "sample {sample:?}");
        }
    }

    #[test]
    fn absent_input_is_empty() {
        assert_eq!(normalize(None), "");
    }
}
