//! Public email hashes
//!
//! Accounts are matched against the federated provider by a one-way hash of
//! their email address, so raw addresses never leave the site.

use sha2::{Digest, Sha256};

/// Normalize an email address for hashing: trimmed and lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash an email address, `None` for an empty address
pub fn email_hash(email: &str) -> Option<String> {
    let normalized = normalize_email(email);
    if normalized.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Some(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_case_and_whitespace_insensitive() {
        assert_eq!(
            email_hash("Alice@Example.com "),
            email_hash("alice@example.com")
        );
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = email_hash("alice@example.com").unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_empty_email_has_no_hash() {
        assert_eq!(email_hash(""), None);
        assert_eq!(email_hash("   "), None);
    }

    #[test]
    fn test_different_emails_differ() {
        assert_ne!(email_hash("a@example.com"), email_hash("b@example.com"));
    }
}
