use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use url::Url;

/// Bytes left unencoded in episode file names: ASCII alphanumerics and `-_.~`.
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors that can occur while validating the public base URL.
///
/// The base URL is the prefix every enclosure URL in the feed is built
/// from, so a malformed value would silently produce a feed full of dead
/// links. These are reported at startup instead.
#[derive(Error, Debug)]
pub enum UrlError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL path does not end with `/`.
    #[error("Base URL must end with '/': {0}")]
    MissingTrailingSlash(String),
    /// The URL carries a query or fragment that episode names would be appended after.
    #[error("Base URL must not contain a query or fragment: {0}")]
    HasQueryOrFragment(String),
}

/// Validates the base URL episodes are published under.
///
/// On success the input is returned as given, not re-serialized, so the
/// published prefix keeps its exact spelling (host case, explicit port).
///
/// # Errors
///
/// Returns [`UrlError`] if:
/// - The URL cannot be parsed ([`UrlError::InvalidUrl`])
/// - The scheme is not `http` or `https` ([`UrlError::UnsupportedScheme`])
/// - The raw string does not end with `/` ([`UrlError::MissingTrailingSlash`])
/// - A query or fragment is present ([`UrlError::HasQueryOrFragment`])
///
/// # Examples
///
/// ```
/// use podserve::util::validate_base_url;
///
/// let url = validate_base_url("https://pod.example.com/audio/").unwrap();
/// assert_eq!(url, "https://pod.example.com/audio/");
///
/// assert!(validate_base_url("https://pod.example.com/audio").is_err());
/// assert!(validate_base_url("ftp://pod.example.com/").is_err());
/// ```
pub fn validate_base_url(raw: &str) -> Result<String, UrlError> {
    let url = Url::parse(raw)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(UrlError::HasQueryOrFragment(raw.to_owned()));
    }

    // `Url::parse` appends `/` to a bare host, so check the input as given.
    if !raw.ends_with('/') {
        return Err(UrlError::MissingTrailingSlash(raw.to_owned()));
    }

    Ok(raw.to_owned())
}

/// Builds the public URL of an episode file.
///
/// The base URL is used verbatim and the file name is appended with every
/// byte outside `A-Z a-z 0-9 - _ . ~` percent-encoded, so names containing
/// spaces, `#`, `?`, `&` or `/` stay inside one path segment.
///
/// # Examples
///
/// ```
/// use podserve::util::{episode_url, validate_base_url};
///
/// let base = validate_base_url("http://pod.example.com/").unwrap();
/// assert_eq!(
///     episode_url(&base, "My Show #1.mp3"),
///     "http://pod.example.com/My%20Show%20%231.mp3"
/// );
/// ```
pub fn episode_url(base: &str, file_name: &str) -> String {
    format!("{}{}", base, utf8_percent_encode(file_name, FILE_NAME))
}

/// Joins a path relative to the base URL, e.g. `rss.xml` for the self link.
pub fn join_base(base: &str, path: &str) -> String {
    format!("{}{}", base, path)
}
