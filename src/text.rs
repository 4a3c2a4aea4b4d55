use once_cell::sync::Lazy;
use regex::Regex;

static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

// Titles are cut to this many characters before the ellipsis marker.
const TITLE_LEN: usize = 50;

/// Edit-distance similarity in `[0.0, 1.0]`; `1.0` means identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Remove every `http(s)://...` substring. Shortened and truncated links are
/// the usual source of drift between a listing excerpt and its detail view.
pub fn strip_links(s: &str) -> String {
    RE_LINK.replace_all(s, "").into_owned()
}

/// A fuzzy match must beat this once links are stripped from both sides.
pub const MATCH_RATIO_MIN: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMatch {
    pub index: usize,
    pub ratio: f64,
    pub exact: bool,
}

/// Locate `target` among `candidates`. Exact text wins; otherwise the
/// closest candidate is taken only if it is near-identical to the target
/// with links stripped.
pub fn find_match<S: AsRef<str>>(target: &str, candidates: &[S]) -> Option<TextMatch> {
    if let Some(index) = candidates.iter().position(|c| c.as_ref() == target) {
        return Some(TextMatch { index, ratio: 1.0, exact: true });
    }

    let (index, _) = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, ratio(target, c.as_ref())))
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let stripped = ratio(&strip_links(target), &strip_links(candidates[index].as_ref()));
    (stripped > MATCH_RATIO_MIN).then_some(TextMatch { index, ratio: stripped, exact: false })
}

/// Single-line title: line breaks removed, first 50 characters, then `...`.
pub fn derive_title(body: &str) -> String {
    let mut title: String = body
        .chars()
        .filter(|&c| c != '\n' && c != '\r')
        .take(TITLE_LEN)
        .collect();
    title.push_str("...");
    title
}

/// Short one-line rendering for log messages.
pub fn preview(s: &str, n: usize) -> String {
    s.chars().filter(|&c| c != '\n' && c != '\r').take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_bounds() {
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("abc", "abc"), 1.0);
        assert_eq!(ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn trailing_whitespace_is_trivial() {
        let r = ratio("Patch notes for v3.0.0", "Patch notes for v3.0.0 ");
        assert!(r > 0.95, "ratio was {r}");
    }

    #[test]
    fn strip_links_removes_urls_only() {
        assert_eq!(
            strip_links("see https://t.co/abc123 now"),
            "see  now"
        );
        assert_eq!(strip_links("no links here"), "no links here");
    }

    #[test]
    fn title_counts_characters_not_bytes() {
        let body = "スプラトゥーン3".repeat(10);
        let title = derive_title(&body);
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn find_match_prefers_exact_then_near_identical() {
        let candidates = ["unrelated words", "Patch notes for v3.0.0 ", "Patch notes for v3.0.0"];
        let m = find_match("Patch notes for v3.0.0", &candidates).unwrap();
        assert_eq!((m.index, m.exact), (2, true));

        let m = find_match("Patch notes for v3.0.0", &candidates[..2]).unwrap();
        assert_eq!((m.index, m.exact), (1, false));

        assert_eq!(find_match("abcdeXXXXX", &["abcdefghij"]), None);
        assert_eq!(find_match::<&str>("anything", &[]), None);
    }

    #[test]
    fn title_drops_line_breaks() {
        assert_eq!(derive_title("line one\nline two"), "line oneline two...");
    }
}
