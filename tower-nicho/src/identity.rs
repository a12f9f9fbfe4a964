use std::borrow::Cow;
use std::sync::Arc;

use http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Key used when a request carries no forwarding headers.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derives the rate limit key for a request from its forwarding headers.
///
/// Priority: the first entry of `x-forwarded-for`, then `x-real-ip`, then
/// [`UNKNOWN_CLIENT`]. Both headers are trusted as sent, which is only sound
/// behind a single reverse proxy that overwrites them.
///
/// A header whose value is empty, blank or not visible ASCII is skipped as if
/// it were absent (see [`header_value`]), so a client sending only such values
/// is keyed as [`UNKNOWN_CLIENT`].
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_value(headers, X_FORWARDED_FOR) {
        let first = forwarded.split(',').next().unwrap_or_default();
        return first.trim().to_string();
    }
    if let Some(real_ip) = header_value(headers, X_REAL_IP) {
        return real_ip.to_string();
    }
    UNKNOWN_CLIENT.to_string()
}

/// The trimmed value of header `name`.
///
/// Absent, blank and non-ASCII values all read as `None`.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Where the gate takes the key for each request from.
#[derive(Debug, Clone, Default)]
pub enum Identifier {
    /// Per client, see [`client_identifier`].
    #[default]
    ClientIp,
    /// One key for every request through the gate.
    Fixed(Arc<str>),
}

impl Identifier {
    pub fn fixed(key: impl Into<Arc<str>>) -> Self {
        Self::Fixed(key.into())
    }

    pub fn resolve<'a>(&'a self, headers: &HeaderMap) -> Cow<'a, str> {
        match self {
            Self::ClientIp => Cow::Owned(client_identifier(headers)),
            Self::Fixed(key) => Cow::Borrowed(key.as_ref()),
        }
    }
}
