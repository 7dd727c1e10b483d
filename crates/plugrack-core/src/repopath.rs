use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Host assumed when a repository is given as bare `user/name`.
pub const DEFAULT_HOST: &str = "github.com";

const LOCAL_HOST: &str = "localhost";
const LOCAL_USER: &str = "local";

/// Canonical `host/user/name` identifier for a plugin source.
///
/// Values only come out of [`RepoPath::normalize`], [`RepoPath::normalize_local`]
/// or [`RepoPath::decode_from_flat_name`]; raw user input is never wrapped
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoPath(String);

impl RepoPath {
    /// Normalizes a repository location into `host/user/name`.
    ///
    /// Accepted shapes are `user/name` and `host/user/name`, each optionally
    /// prefixed with `git://`, `http://` or `https://` and optionally
    /// suffixed with `.git` and/or a trailing slash. A trailing slash is only
    /// legal when an explicit scheme was given.
    pub fn normalize(raw: &str) -> Result<Self> {
        let (rest, had_scheme) = match raw.split_once("://") {
            Some((scheme, rest)) => {
                if !matches!(scheme, "git" | "http" | "https") {
                    bail!("invalid-format: unsupported scheme '{scheme}' in repository path '{raw}'");
                }
                (rest, true)
            }
            None => (raw, false),
        };

        let rest = match rest.strip_suffix('/') {
            Some(stripped) if had_scheme => stripped,
            Some(_) => {
                bail!("invalid-format: trailing slash requires an explicit scheme: '{raw}'")
            }
            None => rest,
        };
        let rest = rest.strip_suffix(".git").unwrap_or(rest);

        let segments: Vec<&str> = rest.split('/').collect();
        let (host, user, name) = match segments.as_slice() {
            [user, name] => (DEFAULT_HOST, *user, *name),
            [host, user, name] => (*host, *user, *name),
            _ => bail!(
                "invalid-format: repository path must be 'user/name' or 'host/user/name': '{raw}'"
            ),
        };
        for segment in [host, user, name] {
            validate_segment(segment, raw)?;
        }

        Ok(Self(format!("{host}/{user}/{name}")))
    }

    /// Normalizes a local-only repository name.
    ///
    /// A bare single-segment name maps to the synthetic
    /// `localhost/local/{name}` identifier; anything containing a separator
    /// goes through [`RepoPath::normalize`].
    pub fn normalize_local(raw: &str) -> Result<Self> {
        if raw.contains('/') {
            return Self::normalize(raw);
        }
        validate_segment(raw, raw)?;
        Ok(Self(format!("{LOCAL_HOST}/{LOCAL_USER}/{raw}")))
    }

    /// Reversible transform embedding the hierarchical identifier into a
    /// single filesystem path segment: literal `_` doubles to `__`, then `/`
    /// becomes `_`.
    pub fn encode_to_flat_name(&self) -> String {
        self.0.replace('_', "__").replace('/', "_")
    }

    /// Inverse of [`RepoPath::encode_to_flat_name`].
    ///
    /// Separator reconstruction must run before de-escaping, otherwise a
    /// literal underscore next to a reconstructed separator becomes
    /// ambiguous.
    pub fn decode_from_flat_name(flat: &str) -> Self {
        Self(flat.replace('_', "/").replace("//", "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.components().0
    }

    pub fn user(&self) -> &str {
        self.components().1
    }

    pub fn name(&self) -> &str {
        self.components().2
    }

    fn components(&self) -> (&str, &str, &str) {
        let mut parts = self.0.splitn(3, '/');
        let host = parts.next().unwrap_or_default();
        let user = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        (host, user, name)
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_segment(segment: &str, raw: &str) -> Result<()> {
    if segment.is_empty() {
        bail!("invalid-format: empty segment in repository path '{raw}'");
    }
    if !segment
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' || ch == '_')
    {
        bail!("invalid-format: invalid segment '{segment}' in repository path '{raw}'");
    }
    Ok(())
}
