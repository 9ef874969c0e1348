//! Small text helpers shared by the source clients, prompt builder, and
//! card formatter.

use scraper::Html;
use std::collections::HashSet;
use std::sync::OnceLock;

static STOP_WORDS: OnceLock<HashSet<String>> = OnceLock::new();

/// English stop words, ignored when computing keyword overlap.
fn stop_words() -> &'static HashSet<String> {
    STOP_WORDS.get_or_init(|| {
        stop_words::get(stop_words::LANGUAGE::English)
            .into_iter()
            .map(|w| w.to_string())
            .collect()
    })
}

/// Return at most `max` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Like [`truncate_chars`], appending `"..."` when anything was cut.
pub fn ellipsize(s: &str, max: usize) -> String {
    let cut = truncate_chars(s, max);
    if cut.len() < s.len() {
        format!("{}...", cut.trim_end())
    } else {
        cut.to_string()
    }
}

/// Parse `s` as an HTML fragment and return its text content with
/// whitespace collapsed. Entities are decoded and a bare `<` in prose is
/// kept as text.
pub fn strip_html(s: &str) -> String {
    let fragment = Html::parse_fragment(s);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove Teams `<at>Name</at>` mentions and surrounding whitespace.
pub fn strip_mentions(s: &str) -> String {
    let mut rest = s;
    let mut out = String::with_capacity(s.len());
    while let Some(start) = rest.find("<at>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</at>") {
            Some(end) => rest = &rest[start + end + "</at>".len()..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase alphanumeric tokens of length >= 2, minus stop words.
pub fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(|w| w.to_lowercase())
        .filter(|w| !stop_words().contains(w))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn ellipsize_only_when_cut() {
        assert_eq!(ellipsize("short", 10), "short");
        assert_eq!(ellipsize("a longer sentence", 8), "a longer...");
    }

    #[test]
    fn strip_html_removes_tags_and_entities() {
        let html = "<p>Deploy&nbsp;with <strong>helm</strong> &amp; kubectl</p>";
        assert_eq!(strip_html(html), "Deploy with helm & kubectl");
    }

    #[test]
    fn strip_html_decodes_named_and_numeric_entities() {
        assert_eq!(
            strip_html("<p>It&rsquo;s the team&#8217;s guide &mdash; read it</p>"),
            "It\u{2019}s the team\u{2019}s guide \u{2014} read it"
        );
    }

    #[test]
    fn strip_html_keeps_bare_angle_brackets() {
        assert_eq!(
            strip_html("Scale when cpu < 80 and memory > 2GB before deploying"),
            "Scale when cpu < 80 and memory > 2GB before deploying"
        );
    }

    #[test]
    fn strip_html_handles_graph_highlights() {
        assert_eq!(
            strip_html("Connect to the <c0>VPN</c0> before <ddd/> deploying"),
            "Connect to the VPN before deploying"
        );
    }

    #[test]
    fn strip_mentions_drops_at_tags() {
        assert_eq!(
            strip_mentions("<at>NAVO</at> where is the API guide?"),
            "where is the API guide?"
        );
        assert_eq!(strip_mentions("no mention"), "no mention");
    }

    #[test]
    fn tokenize_drops_stop_words_and_short_tokens() {
        assert_eq!(
            tokenize("How do I deploy the gateway to kubernetes?"),
            vec!["deploy", "gateway", "kubernetes"]
        );
    }
}
