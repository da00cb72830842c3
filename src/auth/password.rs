use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_LENGTH: usize = 32;
pub const HASH_LENGTH: usize = 32;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Well-formed stored hash that matches no password. Verified against when
/// the account does not exist, so both login failures cost one derivation.
pub const DUMMY_HASH: &str = concat!(
    "6d6564636865636b2d6e6f2d737563682d6163636f756e742d73616c742d2d2d",
    ":",
    "0000000000000000000000000000000000000000000000000000000000000000",
);

/// PBKDF2-HMAC-SHA256 hash stored as `salt_hex:hash_hex`.
pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let hash = derive(password, &salt, iterations);
    format!("{}:{}", to_hex(&salt), to_hex(&hash))
}

/// Constant-time check of `password` against a stored hash.
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored: &str, iterations: u32) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once(':') else {
        return false;
    };
    let (Some(salt), Some(expected)) = (from_hex(salt_hex), from_hex(hash_hex)) else {
        return false;
    };
    if expected.len() != HASH_LENGTH {
        return false;
    }
    let actual = derive(password, &salt, iterations);
    actual.ct_eq(expected.as_slice()).into()
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn hash_then_verify() {
        let stored = hash_password("correct horse", FAST);
        assert!(verify_password("correct horse", &stored, FAST));
        assert!(!verify_password("wrong horse", &stored, FAST));
    }

    #[test]
    fn stored_format_is_salt_and_hash_hex() {
        let stored = hash_password("pw", FAST);
        let (salt, hash) = stored.split_once(':').unwrap();
        assert_eq!(salt.len(), SALT_LENGTH * 2);
        assert_eq!(hash.len(), HASH_LENGTH * 2);
    }

    #[test]
    fn dummy_hash_runs_full_verification() {
        let (salt, hash) = DUMMY_HASH.split_once(':').unwrap();
        assert_eq!(from_hex(salt).unwrap().len(), SALT_LENGTH);
        assert_eq!(from_hex(hash).unwrap().len(), HASH_LENGTH);
        assert!(!verify_password("", DUMMY_HASH, FAST));
        assert!(!verify_password("correct horse", DUMMY_HASH, FAST));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("pw", FAST), hash_password("pw", FAST));
    }

    #[test]
    fn iteration_count_matters() {
        let stored = hash_password("pw", FAST);
        assert!(!verify_password("pw", &stored, FAST + 1));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("pw", "", FAST));
        assert!(!verify_password("pw", "zz:zz", FAST));
        assert!(!verify_password("pw", "00:00", FAST));
        assert!(!verify_password("pw", "no-separator", FAST));
    }
}
