//! Resolved paths: content-identifier paths and nested name paths.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use super::name::{Multihash, NameError, NAME_PREFIX};

/// Prefix marking a path as a content-identifier path.
pub const CONTENT_PREFIX: &str = "/data/";

#[derive(thiserror::Error, Debug)]
/// Errors parsing a path.
pub enum PathError {
    #[error("paths must begin with /data/ or /name/")]
    UnknownNamespace,

    #[error("empty path segment")]
    EmptySegment,

    #[error("invalid path root: {0}")]
    Root(#[from] NameError),
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
/// A validated path, either `/data/<base58-multihash>[/...]` pointing at
/// content, or `/name/<base58-multihash>` pointing at another name.
pub struct Path(String);

impl Path {
    /// Parse and validate a path string.
    ///
    /// The root segment must be a valid base58 multihash; no segment may be
    /// empty.
    pub fn parse(string: &str) -> Result<Path, PathError> {
        let rest = string
            .strip_prefix(CONTENT_PREFIX)
            .or_else(|| string.strip_prefix(NAME_PREFIX))
            .ok_or(PathError::UnknownNamespace)?;

        let mut segments = rest.split('/');

        let root = segments.next().unwrap_or_default();
        if root.is_empty() {
            return Err(PathError::EmptySegment);
        }
        Multihash::from_base58(root)?;

        for segment in segments {
            if segment.is_empty() {
                return Err(PathError::EmptySegment);
            }
        }

        Ok(Path(string.to_string()))
    }

    /// Wrap a bare content hash as a content-identifier path
    /// (version-0 style records carry one).
    pub fn from_multihash(hash: &Multihash) -> Path {
        Path(format!("{}{}", CONTENT_PREFIX, hash.to_base58()))
    }

    /// Whether this path is a name in the naming scheme, i.e. another
    /// resolution hop.
    pub fn is_name(&self) -> bool {
        self.0.starts_with(NAME_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Path, PathError> {
        Path::parse(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_content_path() {
        let hash = Multihash::sha2_256(b"some content");
        let string = format!("/data/{}/docs/readme", hash.to_base58());

        let path = Path::parse(&string).unwrap();

        assert_eq!(path.as_str(), string);
        assert!(!path.is_name());
    }

    #[test]
    fn parse_name_path() {
        let hash = Multihash::sha2_256(b"a public key");
        let path = Path::parse(&format!("/name/{}", hash.to_base58())).unwrap();

        assert!(path.is_name());
    }

    #[test]
    fn from_multihash_is_parseable() {
        let hash = Multihash::sha2_256(b"legacy record");
        let path = Path::from_multihash(&hash);

        assert_eq!(path.as_str(), Path::parse(path.as_str()).unwrap().as_str());
        assert!(!path.is_name());
    }

    #[test]
    fn reject_bad_paths() {
        let hash = Multihash::sha2_256(b"x").to_base58();

        assert!(matches!(
            Path::parse("relative/path"),
            Err(PathError::UnknownNamespace)
        ));
        assert!(matches!(
            Path::parse("/data/"),
            Err(PathError::EmptySegment)
        ));
        assert!(matches!(
            Path::parse(&format!("/data/{}//x", hash)),
            Err(PathError::EmptySegment)
        ));
        assert!(matches!(
            Path::parse("/data/not!base58"),
            Err(PathError::Root(_))
        ));
    }
}
