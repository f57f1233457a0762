//! HTTP method as a typed enum.
//!
//! Only the verbs a route can be registered for are modelled. A request
//! carrying any other verb can never match a route and is answered with
//! `404 Not Found` before a context is built for it.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP method.
///
/// [`Method::All`] is a registration wildcard: a route registered under it
/// answers every other method for the same path unless a method-specific
/// route exists. Requests never carry it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    All,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl Method {
    /// Returns the lower-case name used for routing (e.g. `"get"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All     => "all",
            Self::Delete  => "delete",
            Self::Get     => "get",
            Self::Head    => "head",
            Self::Options => "options",
            Self::Patch   => "patch",
            Self::Post    => "post",
            Self::Put     => "put",
        }
    }

    /// Maps a wire method onto a routable one. `None` for anything else.
    pub fn from_http(method: &http::Method) -> Option<Self> {
        method.as_str().parse().ok()
    }

    /// Methods whose requests never carry a body worth parsing.
    pub(crate) fn is_bodyless(self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }
}

/// Parses a method name case-insensitively (`"GET"`, `"get"`, `"Get"`).
///
/// `"all"` is rejected: it names a registration wildcard, not a verb.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "delete"  => Ok(Self::Delete),
            "get"     => Ok(Self::Get),
            "head"    => Ok(Self::Head),
            "options" => Ok(Self::Options),
            "patch"   => Ok(Self::Patch),
            "post"    => Ok(Self::Post),
            "put"     => Ok(Self::Put),
            _         => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
