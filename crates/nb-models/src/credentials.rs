//! Salted password digests and random tokens.
//!
//! Formula: `saltedhash = hex(sha512(utf8(plaintext) || salt))` where `salt`
//! is the 32-character hex encoding of 128 random bits. The digest is 128
//! hex characters, the width of the `saltedhash` column.
//!
//! Accounts created before UTF-8 hashing were hashed with every non-ASCII
//! character replaced by a `&#NNN;` character reference. That form is only
//! consulted through [`legacy_digest`].

use sha2::{Digest, Sha512};

/// Random bytes in a password salt.
pub const SALT_BYTES: usize = 16;

/// Random bytes in invite keys, confirmation keys and session tokens.
pub const TOKEN_BYTES: usize = 16;

/// Fresh random salt, hex-encoded.
pub fn generate_salt() -> String {
    let bytes: [u8; SALT_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Fresh random token, hex-encoded.
pub fn random_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Digest of `plaintext` under `salt`.
pub fn salted_digest(plaintext: &str, salt: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(plaintext.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest of `plaintext` as the pre-UTF-8 scheme computed it.
pub fn legacy_digest(plaintext: &str, salt: &str) -> String {
    salted_digest(&escape_non_ascii(plaintext), salt)
}

fn escape_non_ascii(plaintext: &str) -> String {
    let mut out = String::with_capacity(plaintext.len());
    for ch in plaintext.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            out.push_str(&format!("&#{};", u32::from(ch)));
        }
    }
    out
}

/// Compares two digests without short-circuiting on the first difference.
pub fn digests_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salt_is_128_bits_of_hex() {
        let salt = generate_salt();
        assert_eq!(salt.len(), 32);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(salt, generate_salt());
    }

    const SALT: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn digest_is_sha512_of_password_then_salt() {
        // sha512("abc")
        assert_eq!(
            salted_digest("ab", "c"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
        assert_eq!(salted_digest("secret", SALT).len(), 128);
    }

    #[test]
    fn stored_digests_match_existing_accounts() {
        // Produced by the deployed hashing code for the same salt.
        let secret = "1c8b415178b469e0ae9e080d72aab423862955f330ece914dfe64ede44742610\
                      4dc8cd27a509ff66289246c20ed2e791e25c22d3d0cd971900470f34c47ec2e5";
        let cafe = "9cec679b32ddbf285551e97cb900f0b54aa6ca5120f680628f569fa6cb3bca11\
                    cea04fdbb2cab7e6196632e20f85c5611e528c697488c92310685192e5808607";

        assert_eq!(salted_digest("secret", SALT), secret);
        assert_eq!(legacy_digest("secret", SALT), secret);
        assert_eq!(legacy_digest("caf\u{e9}", SALT), cafe);
        assert_eq!(
            salted_digest("caf\u{e9}", SALT),
            "753be51f831686bd7793c05c18627e76caf4920d2d8a98960f21de634ec37eff\
             555e36ec8f79a3fbfb3bd3030654846d00907b04c6cf07b441e368c5aac178bc"
        );
    }

    #[test]
    fn legacy_form_escapes_only_non_ascii() {
        assert_eq!(escape_non_ascii("caf\u{e9}!"), "caf&#233;!");
        assert_eq!(legacy_digest("plain", "s"), salted_digest("plain", "s"));
        assert_ne!(legacy_digest("caf\u{e9}", "s"), salted_digest("caf\u{e9}", "s"));
    }

    #[test]
    fn digest_comparison() {
        assert!(digests_match("abcd", "abcd"));
        assert!(!digests_match("abcd", "abce"));
        assert!(!digests_match("abcd", "abc"));
    }
}
