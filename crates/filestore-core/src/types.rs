//! Core type definitions shared by all backends

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// A URI identifying where a key's object can be retrieved
///
/// For the local backend this is a scheme-less filesystem path such as
/// `bucket/key`; for S3 it is an absolute presigned `https://` (or `http://`)
/// URL. Construction never fails. Absolute URLs with a host are parsed with
/// [`url::Url`]; anything else is treated as a plain path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Locator {
    raw: String,
    url: Option<Url>,
}

impl Locator {
    /// Wrap a URI or path string
    pub fn new(uri: impl Into<String>) -> Self {
        let raw = uri.into();
        // Drive letters and other host-less forms stay plain paths
        let url = Url::parse(&raw).ok().filter(Url::has_host);
        Self { raw, url }
    }

    /// The full locator string, exactly as it was produced
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn into_string(self) -> String {
        self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Parsed form of an absolute locator
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// URI scheme (`https`, `http`, ...) if present
    pub fn scheme(&self) -> Option<&str> {
        self.url.as_ref().map(Url::scheme)
    }

    /// Authority (`host[:port]`) of an absolute URI
    pub fn authority(&self) -> Option<&str> {
        self.url.as_ref().map(Url::authority)
    }

    /// Path component; a plain-path locator is all path
    pub fn path(&self) -> &str {
        match &self.url {
            Some(url) => url.path(),
            None => &self.raw,
        }
    }

    /// Query string (without the leading `?`) of an absolute URI
    pub fn query(&self) -> Option<&str> {
        self.url.as_ref().and_then(Url::query)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Locator {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.raw
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}
