//! Canonical `scheme://account/absolute-path` addresses.
//!
//! The store client only ever sees the absolute-path component; the scheme
//! and account are carried so that URIs handed back to callers are stable
//! and self-describing.

use std::fmt;
use std::str::FromStr;

use crate::error::FsError;

/// Scheme used for every URI this crate constructs.
pub const SCHEME: &str = "adl";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteUri {
    scheme: String,
    account: String,
    path: String,
}

impl RemoteUri {
    /// Build a canonical URI for `path` under `account`.
    ///
    /// Leading slashes are collapsed so that `"d/f"`, `"/d/f"` and `"//d/f"`
    /// all address `/d/f`. Dot segments are resolved, see [`absolute_path`].
    pub fn new(account: &str, path: &str) -> Self {
        Self {
            scheme: SCHEME.to_string(),
            account: account.to_string(),
            path: absolute_path(path),
        }
    }

    /// Parse a URI string. Any scheme is accepted; only the path is ever
    /// sent to a store client.
    pub fn parse(s: &str) -> Result<Self, FsError> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| FsError::InvalidArgument(format!("Missing scheme in URI: {}", s)))?;

        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(FsError::InvalidArgument(format!("Invalid scheme in URI: {}", s)));
        }

        // Query and fragment are not part of the addressed path.
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (account, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, "/"),
        };
        if account.is_empty() {
            return Err(FsError::InvalidArgument(format!("Missing account in URI: {}", s)));
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            account: account.to_string(),
            path: absolute_path(path),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// The raw path handed to the store client. Always starts with `/`.
    pub fn absolute_path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RemoteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.account, self.path)
    }
}

impl FromStr for RemoteUri {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Re-root `path` at `/`, resolving `.` and `..` segments.
///
/// `..` never climbs above the root. Leading slashes are dropped; interior
/// empty segments and a trailing `/` are kept as given.
pub fn absolute_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                segments.pop();
            }
            "" if segments.is_empty() => {}
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}
