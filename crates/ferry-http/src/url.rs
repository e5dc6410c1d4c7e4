//! URL construction

use ferry_core::{ProviderError, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Escaped inside a path segment; `/` survives so a segment may carry a subpath
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Append `segments` to the path of `base` and set the query to `query`.
///
/// Segments are stripped of surrounding slashes and percent-encoded; empty
/// ones are dropped. Segments already on `base` are kept.
pub fn build_url<S: AsRef<str>>(base: &str, segments: &[S], query: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| ProviderError::InvalidPath(format!("invalid base url {base:?}: {e}")))?;

    let existing: Vec<String> = url
        .path_segments()
        .map(|parts| {
            parts
                .map(|part| percent_decode_str(part).decode_utf8_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    let path = existing
        .iter()
        .map(String::as_str)
        .chain(segments.iter().map(AsRef::as_ref))
        .map(|segment| segment.trim_matches('/'))
        .filter(|segment| !segment.is_empty())
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");

    url.set_path(&format!("/{path}"));
    url.set_query(None);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    Ok(url.into())
}
