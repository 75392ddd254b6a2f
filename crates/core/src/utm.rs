//! UTM tagging for short-link destinations.

use url::{form_urlencoded, Url};

use crate::{TlxError, TlxResult};

/// UTM parameters to stamp onto a destination URL.
#[derive(Debug, Clone, Default)]
pub struct UtmParams<'a> {
    pub source: &'a str,
    pub medium: &'a str,
    pub campaign: &'a str,
    pub content: Option<&'a str>,
    pub term: Option<&'a str>,
}

/// Set the `utm_*` query parameters on `url`, keeping every other parameter
/// and the fragment. Existing `utm_*` values are overwritten in place.
pub fn add_utm(url: &str, utm: &UtmParams<'_>) -> String {
    let (without_fragment, fragment) = match url.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (url, None),
    };
    let (base, query) = match without_fragment.split_once('?') {
        Some((b, q)) => (b, q),
        None => (without_fragment, ""),
    };

    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut set = |key: &str, value: &str| {
        if let Some(pair) = pairs.iter_mut().find(|(k, _)| k == key) {
            pair.1 = value.to_string();
        } else {
            pairs.push((key.to_string(), value.to_string()));
        }
    };
    set("utm_source", utm.source);
    set("utm_medium", utm.medium);
    set("utm_campaign", utm.campaign);
    if let Some(content) = utm.content.filter(|c| !c.is_empty()) {
        set("utm_content", content);
    }
    if let Some(term) = utm.term.filter(|t| !t.is_empty()) {
        set("utm_term", term);
    }

    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();

    let mut out = format!("{base}?{encoded}");
    if let Some(frag) = fragment {
        out.push('#');
        out.push_str(frag);
    }
    out
}

/// Accept only absolute http(s) URLs that can go verbatim into a
/// `Location` header. The URL parser silently drops tabs, newlines and
/// surrounding spaces, so whitespace and control characters are rejected
/// before parsing.
pub fn check_destination(url: &str) -> TlxResult<()> {
    if url.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(TlxError::bad_request("destination_url contains whitespace or control characters"));
    }
    let parsed = Url::parse(url).map_err(|e| TlxError::bad_request(format!("Invalid destination_url: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(TlxError::bad_request("destination_url must be an http or https URL"));
    }
    Ok(())
}
