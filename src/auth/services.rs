use std::{future::Future, sync::Arc};

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    dto::PublicUser,
    password::PasswordHasher,
    repo::{CredentialStore, StoreError},
    repo_types::{NewUser, UserChanges},
};
use crate::error::AppError;

const MAX_PASSWORD_BYTES: usize = 1024;

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Runs a store mutation on its own task. If the caller's request is
/// dropped, the write still completes and only its result is lost.
async fn run_to_completion<T, F>(fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
    T: Send + 'static,
{
    let outcome = tokio::spawn(fut).await.context("store task failed")?;
    Ok(outcome?)
}

/// Registration, login and user management over a [`CredentialStore`].
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    password_min_length: usize,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        password_min_length: usize,
    ) -> Self {
        Self {
            store,
            hasher,
            password_min_length: password_min_length.max(1),
        }
    }

    fn validate_email(&self, email: &str) -> Result<(), AppError> {
        if email.is_empty() {
            return Err(AppError::Validation("email is required".into()));
        }
        if !is_valid_email(email) {
            return Err(AppError::Validation("invalid email".into()));
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<(), AppError> {
        if password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }
        if password.chars().count() < self.password_min_length {
            return Err(AppError::Validation(format!(
                "password must be at least {} characters",
                self.password_min_length
            )));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Validation("password too long".into()));
        }
        Ok(())
    }

    /// Hashes first, then lets the store decide uniqueness in one atomic
    /// insert. A duplicate email therefore still pays for one hash.
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<PublicUser, AppError> {
        let email = normalize_email(email);
        self.validate_email(&email)?;
        self.validate_password(password)?;

        let password_hash = self.hasher.hash(password).await?;

        let store = Arc::clone(&self.store);
        let new_user = NewUser { email, password_hash };
        let user = run_to_completion(async move { store.insert_if_absent(new_user).await }).await?;

        info!(
            user_id = %user.id,
            email = %user.email,
            created_at = %user.created_at,
            "user registered"
        );
        Ok(user.into())
    }

    /// Unknown email and wrong password fail identically.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser, AppError> {
        let email = normalize_email(email);

        let Some(user) = self.store.find_by_email(&email).await? else {
            self.hasher.dummy_verify(password).await;
            warn!("login unknown email");
            return Err(AppError::AuthenticationFailed);
        };

        if !self.hasher.verify(password, &user.password_hash).await {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::AuthenticationFailed);
        }

        info!(user_id = %user.id, "user logged in");
        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> Result<PublicUser, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .map(PublicUser::from)
            .ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<PublicUser>, AppError> {
        let users = self.store.list().await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    /// Applies only the supplied fields. A new password goes through the
    /// hasher before it reaches the store.
    #[instrument(skip(self, password))]
    pub async fn update_user(
        &self,
        id: Uuid,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<PublicUser, AppError> {
        let mut changes = UserChanges::default();
        if let Some(email) = email {
            let email = normalize_email(email);
            self.validate_email(&email)?;
            changes.email = Some(email);
        }
        if let Some(password) = password {
            self.validate_password(password)?;
            changes.password_hash = Some(self.hasher.hash(password).await?);
        }

        if changes.is_empty() {
            return self.get_user(id).await;
        }

        let store = Arc::clone(&self.store);
        let user = run_to_completion(async move { store.update(id, changes).await }).await?;
        info!(user_id = %user.id, updated_at = %user.updated_at, "user updated");
        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), AppError> {
        let store = Arc::clone(&self.store);
        run_to_completion(async move { store.delete(id).await }).await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}
