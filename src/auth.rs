use crate::error::Result;

#[cfg(not(test))]
const COST: u32 = bcrypt::DEFAULT_COST;
// bcrypt's minimum, so unit tests that register users stay fast
#[cfg(test)]
const COST: u32 = 4;

pub fn hash_password(password: &str) -> Result<String> {
    Ok(bcrypt::hash(password, COST)?)
}

/// False for malformed or empty stored hashes; chat-only users have none.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.is_empty() {
        return false;
    }
    bcrypt::verify(password, stored).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let stored = hash_password("hunter22").unwrap();
        assert!(stored.starts_with("$2"));
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hashes_never_verify() {
        assert!(!verify_password("", ""));
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "sha256$00$00"));
        assert!(!verify_password("x", "$2b$04$short"));
    }
}
