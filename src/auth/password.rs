use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

/// Argon2id with the crate's default cost parameters.
fn argon2() -> Argon2<'static> {
    Argon2::default()
}

/// PHC-encoded digest of `plain` under a fresh OS-random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2()
        .hash_password(plain.as_bytes(), &salt)
        .map(|digest| digest.to_string())
        .map_err(|e| anyhow::anyhow!("hash password: {}", e))
}

/// Whether `plain` produced `digest`. The digest carries its own salt and
/// parameters; argon2 compares the recomputed output in constant time.
///
/// A `digest` that is not a PHC string is an error rather than `false`.
pub fn verify_password(plain: &str, digest: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(digest)
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .context("parse stored password hash")?;
    Ok(argon2().verify_password(plain.as_bytes(), &parsed).is_ok())
}
