//! Slash-separated store locations such as `messages/alice/bob/-Nabc`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StoreError};

const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']', '/'];

/// A validated, non-empty sequence of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// Parse a `/`-separated path. Leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(StoreError::InvalidPath {
                path: raw.to_string(),
                reason: "path is empty",
            });
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            check_segment(segment).map_err(|reason| StoreError::InvalidPath {
                path: raw.to_string(),
                reason,
            })?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Path with `segment` appended.
    pub fn child(&self, segment: &str) -> Result<Self> {
        check_segment(segment).map_err(|reason| StoreError::InvalidPath {
            path: format!("{self}/{segment}"),
            reason,
        })?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Path without its last segment; `None` for a top-level path.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment.
    pub fn key(&self) -> &str {
        // Construction guarantees at least one segment.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether `self` equals `other` or lies underneath it.
    pub fn starts_with(&self, other: &StorePath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }
}

fn check_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if segment.contains(FORBIDDEN) {
        return Err("segment contains one of . # $ [ ] /");
    }
    if segment.chars().any(char::is_control) {
        return Err("segment contains a control character");
    }
    Ok(())
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for StorePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let p = StorePath::parse("/messages/alice/bob/").unwrap();
        assert_eq!(p.to_string(), "messages/alice/bob");
        assert_eq!(p.depth(), 3);
        assert_eq!(p.key(), "bob");
    }

    #[test]
    fn test_rejects_bad_segments() {
        assert!(StorePath::parse("").is_err());
        assert!(StorePath::parse("///").is_err());
        assert!(StorePath::parse("messages//bob").is_err());
        assert!(StorePath::parse("users/a.b").is_err());
        assert!(StorePath::parse("users/$x").is_err());

        let root = StorePath::parse("users").unwrap();
        assert!(root.child("a/b").is_err());
        assert!(root.child("").is_err());
    }

    #[test]
    fn test_parent_child() {
        let root = StorePath::parse("messages").unwrap();
        assert!(root.parent().is_none());

        let leaf = root.child("alice").unwrap().child("-Nk").unwrap();
        assert_eq!(leaf.parent().unwrap().to_string(), "messages/alice");
        assert!(leaf.starts_with(&root));
        assert!(!root.starts_with(&leaf));
    }
}
