//! Utility functions shared by the feed renderer and the configuration layer.
//!
//! - **URL handling**: base URL validation and percent-encoded episode URLs
//! - **XML text**: CDATA wrapping, escaping and invalid-character stripping
//!
//! # Examples
//!
//! ```
//! use podserve::util::{cdata, episode_url, validate_base_url};
//!
//! let base = validate_base_url("https://pod.example.com/").unwrap();
//! let url = episode_url(&base, "Episode 1.mp3");
//! assert_eq!(url, "https://pod.example.com/Episode%201.mp3");
//! assert_eq!(cdata("Episode 1"), "<![CDATA[Episode 1]]>");
//! ```

mod url;
mod xml;

pub use self::url::{episode_url, join_base, validate_base_url, UrlError};
pub use self::xml::{cdata, escape, strip_invalid_xml_chars};
