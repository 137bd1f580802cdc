//! Password hashing and one-time tokens.
//!
//! Argon2 기본 설정 + 랜덤 salt. 일회용 토큰은 32자리 hex.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use pyrite_foundation::{Error, Result};
use rand::RngCore;

/// 새 비밀번호 최소 길이
pub const MIN_PASSWORD_LEN: usize = 8;

/// 비밀번호 해시 생성
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
}

/// 저장된 해시와 비교. 빈 해시나 잘못된 형식은 항상 불일치.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.is_empty() {
        return false;
    }
    match PasswordHash::new(stored) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// 일회용 토큰 생성 (CSPRNG, 128 bit)
pub fn generate_onetime() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
