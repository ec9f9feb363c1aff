use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Checks a subject's secret. Hashing lives behind this boundary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Result<(), CredentialError>;

    async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), CredentialError>;
}

pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(hash).map_err(|e| CredentialError::Hash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CredentialError::Hash(e.to_string())),
    }
}

/// A single account whose argon2 hash is held in memory.
pub struct StaticCredentials {
    username: String,
    password_hash: RwLock<String>,
}

impl StaticCredentials {
    /// Fails when `password_hash` is not a PHC string, so a bad hash surfaces at startup.
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let password_hash = password_hash.into();
        PasswordHash::new(&password_hash).map_err(|e| CredentialError::Hash(e.to_string()))?;
        Ok(Self {
            username: username.into(),
            password_hash: RwLock::new(password_hash),
        })
    }

    pub fn from_plaintext(username: impl Into<String>, password: &str) -> Result<Self, CredentialError> {
        Self::new(username, hash_password(password)?)
    }

    fn check(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        // Verify the hash before comparing usernames; both paths cost one argon2 run.
        let hash = self.password_hash.read().clone();
        let matches = verify_password(password, &hash)?;
        if matches && username == self.username {
            Ok(())
        } else {
            Err(CredentialError::InvalidCredentials)
        }
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentials {
    async fn verify(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        self.check(username, password)
    }

    async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), CredentialError> {
        self.check(username, current_password)?;
        let new_hash = hash_password(new_password)?;
        *self.password_hash.write() = new_hash;
        tracing::info!(username, "password changed");
        Ok(())
    }
}
