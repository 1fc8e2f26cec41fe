//! Cache Node Module
//!
//! Defines a single cached entry and its link in a bucket's collision chain.

use std::time::Duration;

use chrono::{DateTime, Utc};

// == Node ==
/// One cached entry. Each node exclusively owns its successor.
#[derive(Debug)]
pub(crate) struct Node {
    /// The cache key
    pub(crate) key: String,
    /// The stored bytes
    pub(crate) value: Vec<u8>,
    /// Expiration instant, None = never expires
    pub(crate) expires_at: Option<DateTime<Utc>>,
    /// Next node in the collision chain
    pub(crate) next: Option<Box<Node>>,
}

impl Node {
    // == Constructor ==
    pub(crate) fn new(key: &str, value: &[u8], expires_at: Option<DateTime<Utc>>) -> Box<Self> {
        Box::new(Self {
            key: key.to_owned(),
            value: value.to_vec(),
            expires_at,
            next: None,
        })
    }

    // == Is Valid ==
    /// A node is valid while `now <= expires_at`.
    pub(crate) fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now <= expires,
            None => true,
        }
    }

    pub(crate) fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_valid_at(now)
    }

    // == Overwrite ==
    /// Replaces the stored bytes, reallocating only when the length changes.
    pub(crate) fn overwrite(&mut self, value: &[u8], expires_at: Option<DateTime<Utc>>) {
        if self.value.len() == value.len() {
            self.value.copy_from_slice(value);
        } else {
            self.value = value.to_vec();
        }
        self.expires_at = expires_at;
    }

    // == Copy Into ==
    /// Copies as much of the value as fits into `dst`; returns bytes copied.
    pub(crate) fn copy_into(&self, dst: &mut [u8]) -> usize {
        let len = dst.len().min(self.value.len());
        dst[..len].copy_from_slice(&self.value[..len]);
        len
    }
}

// == Utility Functions ==
/// Returns the instant `ttl` from `now`, or None for entries that never expire.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    let ttl = ttl?;
    let expires = chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta));
    Some(expires.unwrap_or(DateTime::<Utc>::MAX_UTC))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Option<Duration> {
        Some(Duration::from_secs(n))
    }

    #[test]
    fn test_node_without_expiry_never_expires() {
        let node = Node::new("k", b"v", None);
        assert!(node.is_valid_at(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Utc::now();
        let node = Node::new("k", b"v", Some(now));

        // Still valid at the expiry instant, expired right after
        assert!(node.is_valid_at(now));
        assert!(node.is_expired_at(now + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_overwrite_same_length_in_place() {
        let mut node = Node::new("k", b"hehe", None);
        let before = node.value.as_ptr();
        node.overwrite(b"haha", None);

        assert_eq!(node.value, b"haha");
        assert_eq!(node.value.as_ptr(), before);
    }

    #[test]
    fn test_overwrite_different_length() {
        let mut node = Node::new("k", b"hehe", None);
        let expiry = expiry_after(Utc::now(), secs(5));
        node.overwrite(b"hohoho", expiry);

        assert_eq!(node.value, b"hohoho");
        assert_eq!(node.expires_at, expiry);
    }

    #[test]
    fn test_copy_into_truncates() {
        let node = Node::new("k", b"hohoho", None);
        let mut buf = [0u8; 4];

        assert_eq!(node.copy_into(&mut buf), 4);
        assert_eq!(&buf, b"hoho");
    }

    #[test]
    fn test_copy_into_larger_buffer() {
        let node = Node::new("k", b"hi", None);
        let mut buf = [0xFFu8; 4];

        assert_eq!(node.copy_into(&mut buf), 2);
        assert_eq!(&buf, &[b'h', b'i', 0xFF, 0xFF]);
    }

    #[test]
    fn test_expiry_after() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, None), None);
        assert_eq!(
            expiry_after(now, secs(60)),
            Some(now + chrono::Duration::seconds(60))
        );
        assert_eq!(
            expiry_after(now, Some(Duration::MAX)),
            Some(DateTime::<Utc>::MAX_UTC)
        );
    }
}
