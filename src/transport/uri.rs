//! Logical transport addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::TransportError;

/// A parsed logical URI: `scheme://connection-name/path`.
///
/// The connection name selects a configured endpoint; the path (possibly
/// empty) names a queue or topic on that endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransportUri {
    scheme: String,
    connection_name: String,
    path: String,
}

impl TransportUri {
    /// Parse `scheme://connection/path`. The scheme is lowercased and empty
    /// path segments are dropped, so `loopback://a//b/` has path `b`.
    pub fn parse(uri: &str) -> Result<Self, TransportError> {
        let invalid = || TransportError::InvalidUri(uri.to_string());
        let url = Url::parse(uri).map_err(|_| invalid())?;

        let connection_name = url.host_str().filter(|host| !host.is_empty()).ok_or_else(invalid)?;
        if url.port().is_some()
            || url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
            || url.password().is_some()
        {
            return Err(invalid());
        }

        let path = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/"))
            .unwrap_or_default();

        Ok(Self {
            scheme: url.scheme().to_string(),
            connection_name: connection_name.to_string(),
            path,
        })
    }

    pub fn new(
        scheme: impl Into<String>,
        connection_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            connection_name: connection_name.into(),
            path: path.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for TransportUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}://{}", self.scheme, self.connection_name)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.connection_name, self.path)
        }
    }
}

impl FromStr for TransportUri {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TransportUri {
    type Error = TransportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TransportUri> for String {
    fn from(uri: TransportUri) -> Self {
        uri.to_string()
    }
}
