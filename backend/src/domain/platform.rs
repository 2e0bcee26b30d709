//! Portfolio platforms, link URL normalisation, and profile handles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Portfolio platform a link or a profile handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Behance,
    Dribbble,
    Artstation,
    Dprofile,
}

impl Platform {
    pub const ALL: [Self; 4] = [
        Self::Behance,
        Self::Dribbble,
        Self::Artstation,
        Self::Dprofile,
    ];

    /// Stable storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Behance => "behance",
            Self::Dribbble => "dribbble",
            Self::Artstation => "artstation",
            Self::Dprofile => "dprofile",
        }
    }

    /// Registrable domain serving the platform.
    pub const fn domain(self) -> &'static str {
        match self {
            Self::Behance => "behance.net",
            Self::Dribbble => "dribbble.com",
            Self::Artstation => "artstation.com",
            Self::Dprofile => "dprofile.ru",
        }
    }

    fn owns_host(self, host: &str) -> bool {
        let domain = self.domain();
        host == domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// Detect the platform serving `url`, if any.
    pub fn detect(url: &LinkUrl) -> Option<Self> {
        Self::ALL.into_iter().find(|platform| platform.owns_host(url.host()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown platform name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str() == raw)
            .ok_or_else(|| UnknownPlatform(raw.to_owned()))
    }
}

/// Validation errors for submitted link URLs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkUrlError {
    #[error("link URL must not be empty")]
    Empty,
    #[error("link URL is not a valid URL: {0}")]
    Malformed(String),
    #[error("link URL must use http or https")]
    UnsupportedScheme,
    #[error("link URL must name a host")]
    MissingHost,
}

/// Normalised link URL used for every anti-farm comparison.
///
/// Two submissions of the same page compare equal regardless of scheme,
/// letter case in the host, a `www.` prefix, query strings, fragments, or a
/// trailing slash. The stored form always uses `https`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkUrl {
    value: String,
    host_end: usize,
    host_start: usize,
}

impl LinkUrl {
    /// Parse and normalise a submitted URL. `http` and `https` inputs, and
    /// inputs without a scheme, all normalise to `https`.
    pub fn parse(raw: &str) -> Result<Self, LinkUrlError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LinkUrlError::Empty);
        }
        let parsed = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse(&format!("https://{trimmed}"))
                    .map_err(|err| LinkUrlError::Malformed(err.to_string()))?
            }
            Err(err) => return Err(LinkUrlError::Malformed(err.to_string())),
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LinkUrlError::UnsupportedScheme);
        }
        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or(LinkUrlError::MissingHost)?;
        let host = host.strip_prefix("www.").unwrap_or(host);

        let mut value = String::from("https://");
        let host_start = value.len();
        value.push_str(host);
        let host_end = value.len();
        if let Some(port) = parsed.port() {
            value.push_str(&format!(":{port}"));
        }
        value.push_str(parsed.path().trim_end_matches('/'));

        Ok(Self {
            value,
            host_start,
            host_end,
        })
    }

    /// Normalised string form.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Lower-cased host without any `www.` prefix.
    pub fn host(&self) -> &str {
        &self.value[self.host_start..self.host_end]
    }

    /// First non-empty path segment, if any.
    pub fn first_segment(&self) -> Option<&str> {
        self.value[self.host_end..]
            .split('/')
            .skip(1)
            .find(|segment| !segment.is_empty())
    }
}

impl fmt::Display for LinkUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl TryFrom<String> for LinkUrl {
    type Error = LinkUrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LinkUrl> for String {
    fn from(value: LinkUrl) -> Self {
        value.value
    }
}

/// Validation errors for profile handles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    #[error("profile URL belongs to {found}, expected {expected}")]
    WrongPlatform { expected: Platform, found: String },
    #[error("profile URL does not name a profile")]
    MissingHandle,
    #[error("handle contains invalid characters: {0}")]
    InvalidCharacters(String),
}

/// Extract a profile handle from a bare handle or a profile URL.
///
/// Empty input yields `Ok(None)`, which clears the stored handle.
pub fn extract_handle(platform: Platform, input: &str) -> Result<Option<String>, HandleError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let looks_like_url = trimmed.contains("://") || trimmed.contains(platform.domain());
    if looks_like_url {
        let url = LinkUrl::parse(trimmed).map_err(|_| HandleError::MissingHandle)?;
        if !platform.owns_host(url.host()) {
            return Err(HandleError::WrongPlatform {
                expected: platform,
                found: url.host().to_owned(),
            });
        }
        let handle = url.first_segment().ok_or(HandleError::MissingHandle)?;
        return Ok(Some(handle.to_owned()));
    }

    let handle = trimmed.trim_start_matches('@');
    if handle.is_empty() {
        return Err(HandleError::MissingHandle);
    }
    if handle
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
    {
        return Err(HandleError::InvalidCharacters(handle.to_owned()));
    }
    Ok(Some(handle.to_owned()))
}
