use std::collections::HashMap;

use rand::Rng;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::services::{hash_password, is_valid_email};
use crate::config::CodeFormat;
use crate::error::ApiError;
use crate::users::dto::{CreateUserRequest, PublicUser};
use crate::users::repo::{Role, Status, User, UserStore};

const DEFAULT_PASSWORD: &str = "123456";

/// Human-shareable member code, `#`-prefixed.
pub fn generate_unique_code(format: CodeFormat) -> String {
    let mut rng = rand::thread_rng();
    let mut code = String::from("#");
    match format {
        CodeFormat::Alnum => {
            const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
            for _ in 0..6 {
                code.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
            }
        }
        CodeFormat::LettersDigits => {
            const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
            const DIGITS: &[u8] = b"0123456789";
            for _ in 0..3 {
                code.push(LETTERS[rng.gen_range(0..LETTERS.len())] as char);
            }
            for _ in 0..3 {
                code.push(DIGITS[rng.gen_range(0..DIGITS.len())] as char);
            }
        }
    }
    code
}

pub fn avatar_url(name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background=random&color=fff",
        name.replace(' ', "+")
    )
}

fn dummy_email(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    format!("{slug}@dummy.local")
}

pub async fn require_user(store: &dyn UserStore, id: Uuid) -> Result<User, ApiError> {
    Ok(store.get(id).await?.ok_or(ApiError::NotFound("User"))?)
}

/// Create a real account or a placeholder member. Placeholders are always
/// persisted through the store so every viewer resolves them identically;
/// they carry no credential and cannot log in.
pub async fn create_user(
    store: &dyn UserStore,
    code_format: CodeFormat,
    req: CreateUserRequest,
) -> Result<User, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("Name and email are required".into()));
    }

    let (email, password_hash) = if req.is_dummy {
        (dummy_email(&name), None)
    } else {
        let email = req
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_default();
        if email.is_empty() {
            return Err(ApiError::Validation("Name and email are required".into()));
        }
        if !is_valid_email(&email) {
            return Err(ApiError::Validation("Invalid email".into()));
        }
        if let Some(existing) = store.find_by_email(&email).await? {
            if existing.status == Status::Active {
                return Err(ApiError::DuplicateEmail);
            }
        }
        let password = req.password.as_deref().unwrap_or(DEFAULT_PASSWORD);
        (email, Some(hash_password(password)?))
    };

    let user = User {
        id: Uuid::new_v4(),
        avatar: avatar_url(&name),
        name,
        email,
        password_hash,
        role: req.role.unwrap_or(Role::Member),
        status: Status::Active,
        unique_code: generate_unique_code(code_format),
        is_dummy: req.is_dummy,
        last_login: None,
        created_at: OffsetDateTime::now_utc(),
    };
    store.insert(user.clone()).await?;
    Ok(user)
}

/// Resolve a kuri's member list to display identities. Ids the store does
/// not know (deleted users, placeholders that were never persisted) come
/// back as synthesized placeholder entries; this is best-effort and always
/// succeeds.
pub async fn resolve_roster(
    store: &dyn UserStore,
    member_ids: &[Uuid],
) -> anyhow::Result<Vec<PublicUser>> {
    let users = store.list().await?;
    let by_id: HashMap<Uuid, User> = users.into_iter().map(|u| (u.id, u)).collect();
    Ok(member_ids
        .iter()
        .map(|id| match by_id.get(id) {
            Some(user) => PublicUser::from(user.clone()),
            None => PublicUser::placeholder(*id),
        })
        .collect())
}
