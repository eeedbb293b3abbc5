//! Password hashing.
//!
//! Hashes are Argon2id PHC strings (`$argon2id$v=19$...`) with a random
//! per-password salt. The parameters travel inside the string, so hashes made
//! with older parameters keep verifying.
use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_same_password() {
        let stored = hash_password("johnd@02041995").expect("hash");
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("johnd@02041995", &stored));
        assert!(!verify_password("johnd@02041996", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(
            hash_password("secret").expect("hash"),
            hash_password("secret").expect("hash")
        );
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("secret", ""));
        assert!(!verify_password("secret", "md5$00$00"));
        assert!(!verify_password("secret", "sha256$00$00"));
        assert!(!verify_password("secret", "$argon2id$v=19$garbage"));
    }

    #[test]
    fn tampered_hash_is_rejected() {
        let stored = hash_password("secret").expect("hash");
        let (head, digest) = stored.rsplit_once('$').expect("phc digest");
        let mut bytes = digest.as_bytes().to_vec();
        bytes[0] = if bytes[0] == b'A' { b'B' } else { b'A' };
        let tampered = format!("{head}${}", String::from_utf8(bytes).expect("ascii"));
        assert_ne!(tampered, stored);
        assert!(!verify_password("secret", &tampered));

        let weaker = stored.replacen("t=2", "t=1", 1);
        assert_ne!(weaker, stored);
        assert!(!verify_password("secret", &weaker));
    }
}
