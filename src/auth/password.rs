use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::config::HasherConfig;

const DUMMY_PASSWORD: &str = "not-a-real-password";

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
    #[error("argon2 hash_password error: {0}")]
    Hash(String),
    #[error("hasher pool closed")]
    Closed,
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Argon2id hasher with a fixed cost. All hashing runs on the blocking pool;
/// at most `max_concurrency` jobs run at once and the rest wait for a permit.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    permits: Arc<Semaphore>,
    dummy_hash: Arc<str>,
    verifications: Arc<AtomicU64>,
}

impl PasswordHasher {
    /// Validates the cost parameters and precomputes the hash used by
    /// [`PasswordHasher::dummy_verify`]. Blocks for one hash.
    pub fn new(cfg: &HasherConfig) -> Result<Self, HashError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| HashError::Params(e.to_string()))?;
        let dummy_hash = hash_blocking(&params, DUMMY_PASSWORD)?;
        Ok(Self {
            params,
            permits: Arc::new(Semaphore::new(cfg.max_concurrency.max(1))),
            dummy_hash: dummy_hash.into(),
            verifications: Arc::new(AtomicU64::new(0)),
        })
    }

    pub async fn hash(&self, plain: &str) -> Result<String, HashError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| HashError::Closed)?;
        let params = self.params.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            hash_blocking(&params, &plain)
        })
        .await?
    }

    /// `false` for a mismatch and for any hash that cannot be parsed or was
    /// produced by an unsupported algorithm.
    pub async fn verify(&self, plain: &str, hash: &str) -> bool {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                error!("hasher pool closed during verify");
                return false;
            }
        };
        self.verifications.fetch_add(1, Ordering::Relaxed);
        let plain = plain.to_owned();
        let hash = hash.to_owned();
        let res = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            verify_blocking(&plain, &hash)
        })
        .await;
        match res {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, "verify task failed");
                false
            }
        }
    }

    /// Burns one verification against a throwaway hash so that a lookup miss
    /// costs about as much as a wrong password.
    pub async fn dummy_verify(&self, plain: &str) {
        let dummy = Arc::clone(&self.dummy_hash);
        let _ = self.verify(plain, &dummy).await;
    }

    /// Verifications dispatched so far, real and dummy alike. Shared by clones.
    #[cfg(test)]
    pub(crate) fn verifications(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }
}

fn hash_blocking(params: &Params, plain: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            HashError::Hash(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

// Cost parameters are read from the PHC string, so hashes made under an
// older configuration still verify.
fn verify_blocking(plain: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "stored password hash is malformed");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
pub(crate) fn test_hasher(max_concurrency: usize) -> PasswordHasher {
    PasswordHasher::new(&HasherConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
        max_concurrency,
    })
    .expect("cheap test params are valid")
}
