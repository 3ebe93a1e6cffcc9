use argon2::Argon2;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config;

#[derive(Error, Debug, PartialEq)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// Generate a cryptographically random salt.
pub fn generate_salt() -> [u8; config::SALT_SIZE] {
    let mut salt = [0u8; config::SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 32-byte encryption key from a password and salt using Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8; config::SALT_SIZE],
) -> Result<[u8; config::ARGON2_OUTPUT_LEN], CryptoError> {
    let params = argon2::Params::new(
        config::ARGON2_MEM_COST,
        config::ARGON2_TIME_COST,
        config::ARGON2_PARALLELISM,
        Some(config::ARGON2_OUTPUT_LEN),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = [0u8; config::ARGON2_OUTPUT_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(key)
}

/// The key is unique per salt, so the nonce is simply the salt zero-extended.
fn build_nonce(salt: &[u8; config::SALT_SIZE]) -> [u8; config::NONCE_SIZE] {
    let mut nonce = [0u8; config::NONCE_SIZE];
    nonce[..config::SALT_SIZE].copy_from_slice(salt);
    nonce
}

/// Encrypt a whole payload under a password.
/// Returns: [salt (16 bytes)] || [ciphertext + tag]
pub fn seal(password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let salt = generate_salt();
    let mut key = derive_key(password, &salt)?;

    let cipher = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key));
    let nonce_bytes = build_nonce(&salt);
    let result = cipher
        .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()));
    secure_zero(&mut key);
    let ciphertext = result?;

    let mut sealed = Vec::with_capacity(config::SALT_SIZE + ciphertext.len());
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a payload produced by [`seal`]. A wrong password fails authentication.
pub fn open(password: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < config::ENCRYPTION_OVERHEAD {
        return Err(CryptoError::Decryption("data too short".into()));
    }

    let mut salt = [0u8; config::SALT_SIZE];
    salt.copy_from_slice(&sealed[..config::SALT_SIZE]);
    let mut key = derive_key(password, &salt)?;

    let cipher = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key));
    let nonce_bytes = build_nonce(&salt);
    let result = cipher
        .decrypt(XNonce::from_slice(&nonce_bytes), &sealed[config::SALT_SIZE..])
        .map_err(|e| CryptoError::Decryption(e.to_string()));
    secure_zero(&mut key);
    result
}

/// Securely zero a key buffer.
pub fn secure_zero(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        unsafe {
            std::ptr::write_volatile(byte, 0);
        }
    }
    std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
}
