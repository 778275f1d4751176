//! RSA-4096/OAEP-SHA256 handshake crypto: proves a claimed identity owns the
//! private key matching the public key it registered with, via an
//! encrypt/decrypt challenge rather than a shared secret.

use rand::Rng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;

pub const RSA_MODULUS_BITS: usize = 4096;
pub const CHALLENGE_LEN: usize = 128;
const CHALLENGE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz#$%&*+-?!";

#[derive(Debug)]
pub struct CryptoError;

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handshake crypto failure")
    }
}

impl std::error::Error for CryptoError {}

/// Parses a public key from its PEM encoding (as stored by `Persistence` /
/// supplied on `REG`).
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|_| CryptoError)
}

pub fn public_key_to_pem(key: &RsaPublicKey) -> Result<String, CryptoError> {
    key.to_public_key_pem(LineEnding::LF).map_err(|_| CryptoError)
}

/// Generates 128 random bytes drawn from the challenge charset
/// (`A-Za-z#$%&*+-?!`).
pub fn generate_challenge() -> Vec<u8> {
    let mut rng = rand::rng();
    (0..CHALLENGE_LEN).map(|_| CHALLENGE_CHARSET[rng.random_range(0..CHALLENGE_CHARSET.len())]).collect()
}

/// Encrypts the challenge under the user's public key for transmission as
/// `VERIF(ciphertext)`.
pub fn encrypt_challenge(public_key: &RsaPublicKey, challenge: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut rng = rand::rng();
    public_key.encrypt(&mut rng, Oaep::new::<Sha256>(), challenge).map_err(|_| CryptoError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    fn test_keypair() -> (RsaPrivateKey, RsaPublicKey) {
        // A short modulus keeps these tests fast; production keys use
        // RSA_MODULUS_BITS.
        let private = RsaPrivateKey::new(&mut rand::rng(), 1024).expect("key generation");
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn challenge_has_expected_length_and_charset() {
        let challenge = generate_challenge();
        assert_eq!(challenge.len(), CHALLENGE_LEN);
        assert!(challenge.iter().all(|b| CHALLENGE_CHARSET.contains(b)));
    }

    #[test]
    fn challenges_are_not_constant() {
        let a = generate_challenge();
        let b = generate_challenge();
        assert_ne!(a, b);
    }

    #[test]
    fn public_key_pem_roundtrips() {
        let (_, public) = test_keypair();
        let pem = public_key_to_pem(&public).expect("encode");
        let parsed = parse_public_key_pem(&pem).expect("parse");
        assert_eq!(parsed, public);
    }

    #[test]
    fn rejects_garbage_pem() {
        assert!(parse_public_key_pem("not a pem").is_err());
    }

    #[test]
    fn challenge_decrypts_back_to_plaintext() {
        let (private, public) = test_keypair();
        let challenge = b"a fixed verification challenge".to_vec();
        let ciphertext = encrypt_challenge(&public, &challenge).expect("encrypt");

        let decrypted = private.decrypt(Oaep::new::<Sha256>(), &ciphertext).expect("decrypt");

        assert_eq!(decrypted, challenge);
    }
}
