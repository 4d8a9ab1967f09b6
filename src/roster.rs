//! Roster display
//!
//! The endpoint answers liveness probes with the names of everyone
//! connected, joined by `;`. The session loops hand the payload over as raw
//! bytes; this is where it gets interpreted.

use std::fmt;

use crate::protocol::ROSTER_DELIMITER;

/// Names currently connected to the endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    names: Vec<String>,
}

impl Roster {
    /// Parse a NowConnected payload. Invalid UTF-8 is replaced, empty names
    /// are skipped.
    pub fn parse(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        let names = text
            .split(ROSTER_DELIMITER)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

impl fmt::Display for Roster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "now connected: {:?}", self.names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        let roster = Roster::parse(b"alice;bob;carol");
        assert_eq!(roster.names(), &["alice", "bob", "carol"]);
        assert!(roster.contains("bob"));
        assert!(!roster.contains("dave"));
    }

    #[test]
    fn test_placeholder_and_blanks() {
        assert_eq!(Roster::parse(b"?").names(), &["?"]);
        assert!(Roster::parse(b"").is_empty());
        assert_eq!(Roster::parse(b"alice;;bob;").len(), 2);
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let roster = Roster::parse(&[b'a', 0xff, b';', b'b']);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.names()[1], "b");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Roster::parse(b"alice;bob").to_string(),
            r#"now connected: ["alice", "bob"]"#
        );
    }
}
