//! HTTP-backed item processors and work sources

pub mod identifiers;
pub mod integrity;

pub use identifiers::HttpIdentifierSource;
pub use integrity::{HttpIntegrityProcessor, ReadRequest};

use darceo_domain::{DarceoError, Result};
use reqwest::Url;

/// Append `segments` to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| DarceoError::Config(format!("base url cannot carry a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parse and check a configured base URL.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|err| DarceoError::Config(format!("invalid base url '{raw}': {err}")))?;
    if url.cannot_be_a_base() {
        return Err(DarceoError::Config(format!("base url cannot carry a path: {raw}")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_identifiers() {
        let base = parse_base_url("http://zmd.local/api/").unwrap();
        let url = endpoint(&base, &["objects", "ark:/1234 x"]).unwrap();
        assert_eq!(url.as_str(), "http://zmd.local/api/objects/ark:%2F1234%20x");
    }

    #[test]
    fn rejects_non_hierarchical_urls() {
        assert!(matches!(parse_base_url("mailto:ops@zmd.local"), Err(DarceoError::Config(_))));
        assert!(matches!(parse_base_url("not a url"), Err(DarceoError::Config(_))));
    }
}
