//! Release identifiers: artifact kinds, networks, commits and APVs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::MAIN_NETWORK;

/// Which client binary a release run publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// The game client, taken from CI workflow artifacts.
    Player,
    /// The launcher, taken from the artifact bucket and re-configured per network.
    Launcher,
}

impl ArtifactKind {
    /// Path segment for this kind (`player` / `launcher`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Launcher => "launcher",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "player" => Ok(Self::Player),
            "launcher" => Ok(Self::Launcher),
            _ => Err(format!("Unknown artifact kind: {s}")),
        }
    }
}

/// Errors that can occur when validating identifiers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The identifier is empty.
    #[error("Empty {0}")]
    Empty(&'static str),

    /// The identifier contains a character outside its allowed set.
    #[error("Invalid character {found:?} in {what} {value:?}")]
    InvalidChar {
        /// Kind of identifier being validated.
        what: &'static str,
        /// The rejected value.
        value: String,
        /// First offending character.
        found: char,
    },
}

fn validate_segment(
    what: &'static str,
    value: &str,
    allowed: impl Fn(char) -> bool,
) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty(what));
    }
    if let Some(found) = value.chars().find(|c| !allowed(*c)) {
        return Err(IdentifierError::InvalidChar {
            what,
            value: value.to_string(),
            found,
        });
    }
    Ok(())
}

/// A deployment network name (`main`, `internal`, `preview`, ...).
///
/// Restricted to ASCII alphanumerics, `-` and `_` so that it is always a
/// single storage path segment.
///
/// # Example
///
/// ```
/// use toolbelt_schema::Network;
///
/// let net: Network = "internal".parse().unwrap();
/// assert!(!net.is_main());
/// assert!("a/b".parse::<Network>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Network(String);

impl Network {
    /// Create a validated network name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] if the name is empty or contains characters
    /// other than ASCII alphanumerics, `-` and `_`.
    pub fn new(name: impl Into<String>) -> Result<Self, IdentifierError> {
        let name = name.into();
        validate_segment("network", &name, |c| {
            c.is_ascii_alphanumeric() || c == '-' || c == '_'
        })?;
        Ok(Self(name))
    }

    /// The production network.
    pub fn main() -> Self {
        Self(MAIN_NETWORK.to_string())
    }

    /// Whether this is the production network.
    pub fn is_main(&self) -> bool {
        self.0 == MAIN_NETWORK
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Network {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Network {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Network> for String {
    fn from(value: Network) -> Self {
        value.0
    }
}

/// A source commit identifier (hex SHA or other ASCII-alphanumeric ref).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitHash(String);

impl CommitHash {
    /// Create a validated commit identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] if the value is empty or not ASCII alphanumeric.
    pub fn new(hash: impl Into<String>) -> Result<Self, IdentifierError> {
        let hash = hash.into();
        validate_segment("commit", &hash, |c| c.is_ascii_alphanumeric())?;
        Ok(Self(hash))
    }

    /// Get the commit as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommitHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CommitHash {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CommitHash {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommitHash> for String {
    fn from(value: CommitHash) -> Self {
        value.0
    }
}

/// App protocol version: the version marker embedded into client config.
///
/// `raw` is the signed token and is copied into config untouched. `extra`
/// carries auxiliary metadata; `timestamp` names the network-scoped store
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apv {
    version: u64,
    raw: String,
    #[serde(default)]
    extra: BTreeMap<String, String>,
}

impl Apv {
    /// Extra metadata key holding the build timestamp.
    pub const TIMESTAMP: &'static str = "timestamp";

    /// Create an APV with no extra metadata.
    pub fn new(version: u64, raw: impl Into<String>) -> Self {
        Self {
            version,
            raw: raw.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach the build timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.extra.insert(Self::TIMESTAMP.to_string(), timestamp.into());
        self
    }

    /// Numeric protocol version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Opaque encoded token.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Build timestamp, if present.
    pub fn timestamp(&self) -> Option<&str> {
        self.extra.get(Self::TIMESTAMP).map(String::as_str)
    }

    /// Version encoded in the leading segment of a signed token
    /// (`<version>/<signer>/<signature>[/<extra>]`), if it has one.
    pub fn token_version(raw: &str) -> Option<u64> {
        raw.split('/').next()?.parse().ok()
    }
}
