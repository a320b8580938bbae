use thiserror::Error;
use url::Url;

/// Tracking parameters to strip from URLs.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_cid",
    "utm_reader",
    "utm_name",
    "fbclid",
    "gclid",
    "gclsrc",
    "dclid",
    "zanpid",
    "igshid",
    "ref_src",
    "ref_url",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("malformed URL '{input}': {source}")]
    Malformed {
        input: String,
        #[source]
        source: url::ParseError,
    },
}

/// Options controlling URL normalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Remove tracking query parameters and the fragment.
    pub strip_tracking: bool,
}

/// Normalize a URL into its canonical text form.
///
/// Scheme and host are lowercased, default ports dropped, dot segments
/// resolved and percent-encoding made consistent. Input without a scheme is
/// read as `https://`.
///
/// # Errors
///
/// Returns [`NormalizeError::Malformed`] if the input cannot be parsed.
pub fn normalize_url(raw: &str, options: &NormalizeOptions) -> Result<String, NormalizeError> {
    let raw = raw.trim();
    let mut normalized = match Url::parse(raw) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) if !raw.contains("://") => {
            Url::parse(&format!("https://{raw}")).map_err(|source| NormalizeError::Malformed {
                input: raw.to_string(),
                source,
            })?
        }
        Err(source) => {
            return Err(NormalizeError::Malformed {
                input: raw.to_string(),
                source,
            })
        }
    };

    if options.strip_tracking && !normalized.cannot_be_a_base() {
        strip_tracking(&mut normalized);
    }

    Ok(normalized.to_string())
}

fn strip_tracking(url: &mut Url) {
    url.set_fragment(None);

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(key, _)| !is_tracking_param(key))
        .collect();

    // Leave the query untouched unless something was removed.
    if kept.len() == pairs.len() {
        return;
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
}

/// Check if a query parameter is a tracking parameter.
fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_lowercase();
    TRACKING_PARAMS.contains(&lower.as_str()) || lower.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(url: &str) -> String {
        normalize_url(url, &NormalizeOptions::default()).unwrap()
    }

    fn strip(url: &str) -> String {
        normalize_url(
            url,
            &NormalizeOptions {
                strip_tracking: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_lowercase_scheme_and_host() {
        assert_eq!(norm("HTTPS://EXAMPLE.COM/Path"), "https://example.com/Path");
    }

    #[test]
    fn test_keeps_http_scheme() {
        assert_eq!(norm("http://example.com/path"), "http://example.com/path");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        assert_eq!(norm("https://example.com"), "https://example.com/");
    }

    #[test]
    fn test_remove_default_port() {
        assert_eq!(norm("https://example.com:443/path"), "https://example.com/path");
        assert_eq!(norm("http://example.com:80/"), "http://example.com/");
        assert_eq!(
            norm("https://example.com:8443/"),
            "https://example.com:8443/"
        );
    }

    #[test]
    fn test_resolves_dot_segments() {
        assert_eq!(norm("https://example.com/a/./b/../c"), "https://example.com/a/c");
    }

    #[test]
    fn test_consistent_encoding() {
        assert_eq!(
            norm("https://example.com/a b?q=x y"),
            "https://example.com/a%20b?q=x%20y"
        );
    }

    #[test]
    fn test_keeps_query_and_fragment_by_default() {
        assert_eq!(
            norm("https://example.com/p?utm_source=x&id=1#top"),
            "https://example.com/p?utm_source=x&id=1#top"
        );
    }

    #[test]
    fn test_missing_scheme_assumes_https() {
        assert_eq!(norm("example.com/page"), "https://example.com/page");
    }

    #[test]
    fn test_strip_tracking_params() {
        assert_eq!(
            strip("https://example.com/path?utm_source=test&id=123#frag"),
            "https://example.com/path?id=123"
        );
        assert_eq!(
            strip("https://example.com/path?utm_source=test&fbclid=abc"),
            "https://example.com/path"
        );
    }

    #[test]
    fn test_strip_tracking_leaves_other_queries_alone() {
        assert_eq!(
            strip("https://example.com/path?page=2&sort=new"),
            "https://example.com/path?page=2&sort=new"
        );
    }

    #[test]
    fn test_malformed_url() {
        let err = normalize_url("https://exa mple.com/", &NormalizeOptions::default());
        assert!(matches!(err, Err(NormalizeError::Malformed { .. })));
        assert!(normalize_url("http://", &NormalizeOptions::default()).is_err());
    }

    #[test]
    fn test_non_http_scheme_passthrough() {
        assert_eq!(norm("mailto:test@example.com"), "mailto:test@example.com");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "HTTP://Example.COM:80/a/../b/?x=1&y=%7e#F",
            "https://example.com/a b/ü?q=ä ö",
            "example.org",
            "https://example.com/path?utm_source=a&keep=b c&fbclid=z#x",
            "mailto:Someone@Example.com",
        ];
        for options in [
            NormalizeOptions::default(),
            NormalizeOptions {
                strip_tracking: true,
            },
        ] {
            for input in inputs {
                let once = normalize_url(input, &options).unwrap();
                let twice = normalize_url(&once, &options).unwrap();
                assert_eq!(once, twice, "not idempotent for {input}");
            }
        }
    }
}
