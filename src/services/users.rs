//! User management service

use chrono::Utc;
use indexmap::IndexSet;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{CreateUser, UserPatch, UserQuery},
        User,
    },
    repository::Repository,
};

use super::auth::{hash_password, is_password_hash, verify_password};

/// Collapse duplicate ids, first occurrence wins
fn dedup_favorites(favorites: Vec<String>) -> Vec<String> {
    favorites
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Submitted passwords are hashed unless they already are
fn prepare_password(password: &str) -> AppResult<String> {
    if is_password_hash(password) {
        Ok(password.to_string())
    } else {
        hash_password(password)
    }
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List users. With an email and a password only the accounts whose
    /// password matches are returned.
    pub async fn query(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        let email = query.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
        let password = query.password.as_deref().filter(|p| !p.trim().is_empty());

        match (email, password) {
            (Some(email), Some(password)) => {
                let mut matching = Vec::new();
                for user in self.repository.users.find_by_email(email).await? {
                    if verify_password(user.password.as_deref(), password)? {
                        matching.push(user);
                    }
                }
                Ok(matching)
            }
            (Some(email), None) => self.repository.users.find_by_email(email).await,
            (None, _) => self.repository.users.find_all().await,
        }
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<User> {
        self.repository
            .users
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn create_user(&self, input: CreateUser) -> AppResult<User> {
        input.validate()?;

        let password = input
            .password
            .as_deref()
            .map(prepare_password)
            .transpose()?;

        let user = User {
            id: input
                .id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
            password,
            role: input.role.unwrap_or_default(),
            favorites: dedup_favorites(input.favorites),
        };

        let created = self.repository.users.save(&user).await?;
        tracing::info!("Created user {} ({})", created.id, created.role);
        Ok(created)
    }

    pub async fn update_user(&self, id: &str, patch: UserPatch) -> AppResult<User> {
        patch.validate()?;
        let mut user = self.get_by_id(id).await?;

        if let Some(name) = patch.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = patch.email {
            user.email = email.trim().to_string();
        }
        if let Some(password) = patch.password {
            if password.trim().is_empty() {
                return Err(AppError::Validation("Password must not be empty".to_string()));
            }
            user.password = Some(prepare_password(&password)?);
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(favorites) = patch.favorites {
            user.favorites = dedup_favorites(favorites);
        }

        self.repository.users.save(&user).await
    }

    /// Delete a user with their rentals, releasing every book they held
    pub async fn delete_user(&self, id: &str) -> AppResult<()> {
        let removed = self.repository.orders.delete_by_user(id).await?;

        let held = self.repository.books.find_rented_by(id).await?;
        for mut book in held {
            book.rented_by = None;
            book.updated_at = Some(Utc::now());
            self.repository.books.save(&book).await?;
        }

        self.repository.users.delete(id).await?;
        tracing::info!("Deleted user {} and {} order(s)", id, removed);
        Ok(())
    }
}
