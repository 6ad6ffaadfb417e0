//! Password hashing policy.
//!
//! Hashes are PBKDF2-HMAC-SHA256 PHC strings, e.g.
//! `$pbkdf2-sha256$i=600000,l=32$<salt>$<hash>`. Algorithm, rounds and salt
//! travel inside the string, so verification needs no external state and the
//! work factor can be raised without touching stored rows.

use super::error::AuthError;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Algorithm, Params, Pbkdf2};
use rand::Rng;
use std::fmt;

/// Default work factor (OWASP guidance for PBKDF2-HMAC-SHA256).
pub const RECOMMENDED_ROUNDS: u32 = 600_000;

/// Stored hashes claiming more rounds than this are treated as hostile.
pub const MAX_ROUNDS: u32 = 10_000_000;

/// Salt byte length before base64 encoding.
const SALT_BYTES: usize = 16;

/// Derived key length in bytes.
const OUTPUT_BYTES: usize = 32;

/// An opaque, self-describing password hash as persisted by the store.
///
/// `Debug` is redacted so hashes never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredHash(String);

impl StoredHash {
    /// Wrap a value read back from storage. Whether it parses is decided by
    /// [`HashingPolicy::verify`].
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoredHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoredHash(<redacted>)")
    }
}

/// Result of checking a plaintext attempt against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Match,
    /// Wrong password, or a hash that parses but cannot be used.
    Mismatch,
    /// The stored value is not a PHC string at all.
    Corrupt,
}

/// Salted, adaptive one-way transform for passwords.
#[derive(Debug, Clone, Copy)]
pub struct HashingPolicy {
    rounds: u32,
}

impl Default for HashingPolicy {
    fn default() -> Self {
        Self::new(RECOMMENDED_ROUNDS)
    }
}

impl HashingPolicy {
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds: rounds.clamp(1, MAX_ROUNDS),
        }
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Hash `plaintext` with a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<StoredHash, AuthError> {
        let mut salt_bytes = [0u8; SALT_BYTES];
        rand::rng().fill(&mut salt_bytes[..]);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AuthError::Hashing(format!("salt encoding: {e}")))?;

        let params = Params {
            rounds: self.rounds,
            output_length: OUTPUT_BYTES,
        };
        let hash = Pbkdf2
            .hash_password_customized(plaintext.as_bytes(), None, None, params, &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        Ok(StoredHash(hash.to_string()))
    }

    /// Recompute with the parameters embedded in `stored` and compare the
    /// derived output in constant time.
    pub fn verify(&self, plaintext: &str, stored: &StoredHash) -> Verification {
        if let Some(verdict) = self.unusable_verdict(stored) {
            return verdict;
        }
        let Ok(parsed) = PasswordHash::new(stored.as_str()) else {
            return Verification::Corrupt;
        };

        match Pbkdf2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Verification::Match,
            Err(_) => Verification::Mismatch,
        }
    }

    /// Verdict for a stored hash that cannot be verified at all, decided
    /// without deriving anything. `None` means [`verify`](Self::verify) will
    /// run the full key derivation.
    pub fn unusable_verdict(&self, stored: &StoredHash) -> Option<Verification> {
        let Ok(parsed) = PasswordHash::new(stored.as_str()) else {
            return Some(Verification::Corrupt);
        };
        if Algorithm::try_from(parsed.algorithm).is_err() || parsed.hash.is_none() {
            return Some(Verification::Mismatch);
        }
        match Params::try_from(&parsed) {
            Ok(params) if params.rounds <= MAX_ROUNDS => None,
            _ => Some(Verification::Mismatch),
        }
    }

    /// True when `stored` was produced with fewer rounds than this policy uses.
    pub fn needs_rehash(&self, stored: &StoredHash) -> bool {
        PasswordHash::new(stored.as_str())
            .ok()
            .and_then(|parsed| Params::try_from(&parsed).ok())
            .is_some_and(|params| params.rounds < self.rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> HashingPolicy {
        HashingPolicy::new(1_000)
    }

    #[test]
    fn hash_is_self_describing() {
        let hash = fast_policy().hash("s3cr3t").unwrap();
        assert!(hash.as_str().starts_with("$pbkdf2-sha256$"));
        assert!(hash.as_str().contains("i=1000"));
        assert!(!hash.as_str().contains("s3cr3t"));
    }

    #[test]
    fn same_plaintext_gets_fresh_salt_each_time() {
        let policy = fast_policy();
        let h1 = policy.hash("s3cr3t").unwrap();
        let h2 = policy.hash("s3cr3t").unwrap();
        assert_ne!(h1, h2);
        assert_eq!(policy.verify("s3cr3t", &h1), Verification::Match);
        assert_eq!(policy.verify("s3cr3t", &h2), Verification::Match);
    }

    #[test]
    fn wrong_password_is_mismatch() {
        let policy = fast_policy();
        let hash = policy.hash("s3cr3t").unwrap();
        assert_eq!(policy.verify("wrong", &hash), Verification::Mismatch);
        assert_eq!(policy.verify("", &hash), Verification::Mismatch);
    }

    #[test]
    fn verification_uses_embedded_rounds() {
        let old = HashingPolicy::new(1_000).hash("s3cr3t").unwrap();
        let newer = HashingPolicy::new(2_000);
        assert_eq!(newer.verify("s3cr3t", &old), Verification::Match);
        assert!(newer.needs_rehash(&old));
        assert!(!HashingPolicy::new(1_000).needs_rehash(&old));
    }

    #[test]
    fn unparseable_hash_is_corrupt() {
        let policy = fast_policy();
        for garbage in ["", "not-a-hash", "plaintext-password", "$$$"] {
            assert_eq!(
                policy.verify("anything", &StoredHash::from_stored(garbage)),
                Verification::Corrupt,
                "{garbage:?}"
            );
        }
    }

    #[test]
    fn parseable_but_unusable_hash_is_mismatch() {
        let policy = fast_policy();
        // Foreign algorithm.
        let argon = StoredHash::from_stored(
            "$argon2id$v=19$m=65536,t=3,p=4$c29tZXNhbHRzb21lc2FsdA$RdescudvJCsgt3ub+b+dWRWJTmaaJObG",
        );
        assert_eq!(policy.verify("anything", &argon), Verification::Mismatch);

        // Missing hash output.
        let truncated = StoredHash::from_stored("$pbkdf2-sha256$i=1000,l=32$c29tZXNhbHRzb21lc2FsdA");
        assert_eq!(policy.verify("anything", &truncated), Verification::Mismatch);
    }

    #[test]
    fn absurd_round_counts_are_refused() {
        let policy = fast_policy();
        let hostile = StoredHash::from_stored(
            "$pbkdf2-sha256$i=4000000000,l=32$c29tZXNhbHRzb21lc2FsdA$RdescudvJCsgt3ub+b+dWRWJTmaaJObGqhLqAfA2Cts",
        );
        assert_eq!(policy.verify("anything", &hostile), Verification::Mismatch);
    }

    #[test]
    fn unusable_verdict_needs_no_derivation() {
        let policy = fast_policy();
        let good = policy.hash("s3cr3t").unwrap();
        assert_eq!(policy.unusable_verdict(&good), None);

        assert_eq!(
            policy.unusable_verdict(&StoredHash::from_stored("not-a-hash")),
            Some(Verification::Corrupt)
        );
        for unusable in [
            "$argon2id$v=19$m=65536,t=3,p=4$c29tZXNhbHRzb21lc2FsdA$RdescudvJCsgt3ub+b+dWRWJTmaaJObG",
            "$pbkdf2-sha256$i=1000,l=32$c29tZXNhbHRzb21lc2FsdA",
            "$pbkdf2-sha256$i=4000000000,l=32$c29tZXNhbHRzb21lc2FsdA$RdescudvJCsgt3ub+b+dWRWJTmaaJObGqhLqAfA2Cts",
        ] {
            assert_eq!(
                policy.unusable_verdict(&StoredHash::from_stored(unusable)),
                Some(Verification::Mismatch),
                "{unusable}"
            );
        }
    }

    #[test]
    fn debug_output_is_redacted() {
        let hash = fast_policy().hash("s3cr3t").unwrap();
        let shown = format!("{hash:?}");
        assert_eq!(shown, "StoredHash(<redacted>)");
    }

    #[test]
    fn rounds_are_clamped_to_sane_range() {
        assert_eq!(HashingPolicy::new(0).rounds(), 1);
        assert_eq!(HashingPolicy::new(u32::MAX).rounds(), MAX_ROUNDS);
        assert_eq!(HashingPolicy::default().rounds(), RECOMMENDED_ROUNDS);
    }
}
