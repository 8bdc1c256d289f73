// src/auth/mod.rs — AuthController: local user directory

pub mod mailer;
pub mod token;

use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

use crate::data::{Database, Store};
use crate::infra::errors::RengloError;

/// A user record as returned to callers (no secret material).
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
}

#[derive(Clone)]
pub struct AuthController {
    store: Arc<Mutex<Store>>,
}

impl AuthController {
    pub fn new(db: &Database) -> Self {
        Self { store: db.store() }
    }

    /// Look a user up by email.
    pub fn check_user_by_email(&self, email: &str) -> Result<UserRecord, RengloError> {
        if email.trim().is_empty() {
            return Err(RengloError::Config("email is required".into()));
        }
        let store = self.store.lock().expect("store lock poisoned");
        store
            .get_user_by_email(email)?
            .map(|u| UserRecord {
                id: u.id,
                email: u.email,
                first_name: u.first_name,
                last_name: u.last_name,
                status: u.status,
            })
            .ok_or_else(|| RengloError::UserNotFound {
                email: email.to_string(),
            })
    }

    /// Create a user in pending state. A permanent password is assigned in a
    /// second step, mirroring the original create-then-confirm flow.
    pub fn create_user(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<UserRecord, RengloError> {
        let store = self.store.lock().expect("store lock poisoned");
        if store.get_user_by_email(email)?.is_some() {
            return Err(RengloError::UserExists {
                email: email.to_string(),
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        store.insert_user(&id, email, first_name, last_name)?;
        Ok(UserRecord {
            id,
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            status: "pending".to_string(),
        })
    }

    /// Assign a permanent password and confirm the user.
    pub fn assign_permanent_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), RengloError> {
        let salt = uuid::Uuid::new_v4().to_string();
        let hash = hash_password(&salt, password);

        let store = self.store.lock().expect("store lock poisoned");
        if store.set_user_password(email, &hash, &salt)? {
            Ok(())
        } else {
            Err(RengloError::UserNotFound {
                email: email.to_string(),
            })
        }
    }

    pub fn verify_password(&self, email: &str, password: &str) -> Result<bool, RengloError> {
        let store = self.store.lock().expect("store lock poisoned");
        let user = store
            .get_user_by_email(email)?
            .ok_or_else(|| RengloError::UserNotFound {
                email: email.to_string(),
            })?;

        match (user.password_hash, user.password_salt) {
            (Some(hash), Some(salt)) => Ok(hash_password(&salt, password) == hash),
            _ => Ok(false),
        }
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> AuthController {
        AuthController::new(&Database::in_memory().unwrap())
    }

    #[test]
    fn test_check_user_not_found() {
        let auc = auth();
        let err = auc.check_user_by_email("nobody@renglo.com").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_create_then_check() {
        let auc = auth();
        let created = auc.create_user("ada@renglo.com", "Ada", "Lovelace").unwrap();
        assert_eq!(created.status, "pending");

        let found = auc.check_user_by_email("ada@renglo.com").unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.first_name, "Ada");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let auc = auth();
        auc.create_user("ada@renglo.com", "Ada", "Lovelace").unwrap();
        let err = auc.create_user("ada@renglo.com", "A", "L").unwrap_err();
        assert!(matches!(err, RengloError::UserExists { .. }));
    }

    #[test]
    fn test_password_lifecycle() {
        let auc = auth();
        auc.create_user("ada@renglo.com", "Ada", "Lovelace").unwrap();

        // No password assigned yet
        assert!(!auc.verify_password("ada@renglo.com", "hunter2").unwrap());

        auc.assign_permanent_password("ada@renglo.com", "hunter2")
            .unwrap();
        assert!(auc.verify_password("ada@renglo.com", "hunter2").unwrap());
        assert!(!auc.verify_password("ada@renglo.com", "wrong").unwrap());

        let user = auc.check_user_by_email("ada@renglo.com").unwrap();
        assert_eq!(user.status, "confirmed");
    }

    #[test]
    fn test_assign_password_unknown_user() {
        let auc = auth();
        let err = auc
            .assign_permanent_password("ghost@renglo.com", "pw")
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
