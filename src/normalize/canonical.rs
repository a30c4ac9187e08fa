//! URL canonicalization.
//!
//! Produces the comparison key every record URL is stored under: `https`
//! scheme, lower-cased host, no fragment, no trailing slash on non-root
//! paths, and no tracking or blank query parameters.

use url::Url;
use url::form_urlencoded;

/// Query keys removed during canonicalization (matched case-insensitively).
pub const TRACKING_PARAMS: [&str; 7] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
];

/// Normalize a raw URL string into its canonical form.
///
/// Remaining query parameters keep their relative order and are re-encoded
/// as `application/x-www-form-urlencoded`. Input that cannot be parsed as an
/// absolute URL, or whose scheme cannot become `https`, is returned
/// unchanged.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(canonicalize("https://ex.com/a?utm_source=x&y=1"), "https://ex.com/a?y=1");
/// assert_eq!(canonicalize("HTTP://Ex.COM"), "https://ex.com/");
/// ```
pub fn canonicalize(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.to_string();
    };
    if url.set_scheme("https").is_err() || url.cannot_be_a_base() {
        return raw.to_string();
    }

    url.set_fragment(None);

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(if path.is_empty() { "/" } else { &path });

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, value)| !value.is_empty() && !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        url.set_query(Some(&query));
    }

    url.to_string()
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS
        .iter()
        .any(|tracked| tracked.eq_ignore_ascii_case(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tracking_params() {
        assert_eq!(
            canonicalize("https://ex.com/a?utm_source=x&y=1"),
            "https://ex.com/a?y=1"
        );
        assert_eq!(
            canonicalize("https://ex.com/a?UTM_Medium=m&fbclid=abc&gclid=1"),
            "https://ex.com/a"
        );
    }

    #[test]
    fn test_forces_https_and_lowercases_host() {
        assert_eq!(
            canonicalize("http://News.Example.COM/Politics/Story"),
            "https://news.example.com/Politics/Story"
        );
    }

    #[test]
    fn test_path_and_fragment() {
        assert_eq!(canonicalize("https://ex.com"), "https://ex.com/");
        assert_eq!(canonicalize("https://ex.com/"), "https://ex.com/");
        assert_eq!(canonicalize("https://ex.com/news/"), "https://ex.com/news");
        assert_eq!(canonicalize("https://ex.com/news//"), "https://ex.com/news");
        assert_eq!(canonicalize("https://ex.com/a#comments"), "https://ex.com/a");
    }

    #[test]
    fn test_keeps_param_order_and_drops_blank_values() {
        assert_eq!(
            canonicalize("https://ex.com/s?b=2&empty=&a=1&flag"),
            "https://ex.com/s?b=2&a=1"
        );
        assert_eq!(
            canonicalize("https://ex.com/s?q=hello world"),
            "https://ex.com/s?q=hello+world"
        );
    }

    #[test]
    fn test_unparseable_input_is_returned_unchanged() {
        assert_eq!(canonicalize("not a url"), "not a url");
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("/relative/path"), "/relative/path");
        assert_eq!(canonicalize("mailto:desk@ex.com"), "mailto:desk@ex.com");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "http://Ex.com/a/b/?utm_campaign=z&x=1#top",
            "https://ex.com",
            "https://ex.com/s?q=hello world&blank=",
            "https://ex.com/%7Euser/",
            "https://user:pw@Ex.com:8443/p?a=%26b",
            "garbage",
        ];
        for input in inputs {
            let once = canonicalize(input);
            assert_eq!(canonicalize(&once), once, "not idempotent for {input}");
        }
    }
}
