//! Heuristic code detector.  A handful of patterns decide whether a
//! selection is probably source code; false positives are expected (any
//! sentence containing "if" or a parenthesis qualifies).

use once_cell::sync::Lazy;
use regex::Regex;

static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(function|class|if|for|while|return|import|export|const|let|var)\b").unwrap()
});
static PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[{}();]").unwrap());
static LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(true|false|null|undefined)\b").unwrap());
static OBJECT_CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(console|document|window)\.\w").unwrap());

/// Returns true when any code indicator matches.
pub fn looks_like_code(text: &str) -> bool {
    [&*KEYWORD_RE, &*PUNCT_RE, &*LITERAL_RE, &*OBJECT_CALL_RE]
        .iter()
        .any(|re| re.is_match(text))
}
