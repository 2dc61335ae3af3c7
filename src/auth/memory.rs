//! `CredentialStore` fakes for tests. The in-memory store keeps the whole
//! map behind one mutex, so the uniqueness check and the write happen under
//! a single guard.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{CredentialStore, StoreError};
use super::repo_types::{NewUser, User, UserChanges};

#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<Uuid, User>>, // key: user id
}

impl InMemoryCredentialStore {
    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut all: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|u| (u.created_at, u.id));
        Ok(all)
    }

    async fn insert_if_absent(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if !users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if let Some(email) = &changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.users
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

/// Every call fails with a pool timeout, as a store whose database is gone.
#[derive(Default)]
pub struct FailingCredentialStore;

fn unavailable() -> StoreError {
    StoreError::Storage(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl CredentialStore for FailingCredentialStore {
    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Err(unavailable())
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
        Err(unavailable())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Err(unavailable())
    }

    async fn insert_if_absent(&self, _user: NewUser) -> Result<User, StoreError> {
        Err(unavailable())
    }

    async fn update(&self, _id: Uuid, _changes: UserChanges) -> Result<User, StoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _id: Uuid) -> Result<(), StoreError> {
        Err(unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(email: &str, hash: &str) -> NewUser {
        NewUser { email: email.into(), password_hash: hash.into() }
    }

    #[tokio::test]
    async fn update_preserves_unspecified_fields() {
        let store = InMemoryCredentialStore::default();
        let user = store.insert_if_absent(new_user("a@b.com", "hash-1")).await.unwrap();

        let updated = store
            .update(user.id, UserChanges { email: Some("c@d.com".into()), password_hash: None })
            .await
            .unwrap();
        assert_eq!(updated.email, "c@d.com");
        assert_eq!(updated.password_hash, "hash-1");
        assert_eq!(updated.created_at, user.created_at);
    }

    #[tokio::test]
    async fn update_rejects_email_of_another_user() {
        let store = InMemoryCredentialStore::default();
        store.insert_if_absent(new_user("a@b.com", "h")).await.unwrap();
        let other = store.insert_if_absent(new_user("c@d.com", "h")).await.unwrap();

        let res = store
            .update(other.id, UserChanges { email: Some("a@b.com".into()), password_hash: None })
            .await;
        assert!(matches!(res, Err(StoreError::DuplicateEmail)));

        // Re-setting one's own email is not a collision.
        let same = store
            .update(other.id, UserChanges { email: Some("c@d.com".into()), password_hash: None })
            .await;
        assert!(same.is_ok());
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let store = InMemoryCredentialStore::default();
        let id = Uuid::new_v4();
        assert!(matches!(store.delete(id).await, Err(StoreError::NotFound)));
        assert!(matches!(
            store.update(id, UserChanges::default()).await,
            Err(StoreError::NotFound)
        ));
        assert!(store.find_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_of_missing_id_is_not_found_even_with_taken_email() {
        let store = InMemoryCredentialStore::default();
        store.insert_if_absent(new_user("a@b.com", "h")).await.unwrap();

        let res = store
            .update(Uuid::new_v4(), UserChanges { email: Some("a@b.com".into()), password_hash: None })
            .await;
        assert!(matches!(res, Err(StoreError::NotFound)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_yield_one_winner() {
        let store = Arc::new(InMemoryCredentialStore::default());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.insert_if_absent(new_user("race@b.com", &format!("h{}", i))).await
                })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::DuplicateEmail) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.len(), 1);
    }
}
