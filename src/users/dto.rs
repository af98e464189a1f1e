use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::{Role, Status, User};

/// The projection of a user that leaves the service: everything except the
/// credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: Status,
    pub unique_code: String,
    pub avatar: String,
    pub is_dummy: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            status: user.status,
            unique_code: user.unique_code,
            avatar: user.avatar,
            is_dummy: user.is_dummy,
            last_login: user.last_login,
        }
    }
}

impl PublicUser {
    /// Display identity for a member id the store no longer knows about.
    /// Roster resolution must never fail on these.
    pub fn placeholder(id: Uuid) -> Self {
        let fragment: String = id.to_string().chars().take(8).collect();
        Self {
            id,
            name: format!("Member {fragment}"),
            email: format!("placeholder_{id}@dummy.local"),
            role: Role::Member,
            status: Status::Inactive,
            unique_code: "#PENDING".into(),
            avatar: "https://ui-avatars.com/api/?name=Placeholder&background=94a3b8&color=fff"
                .into(),
            is_dummy: true,
            last_login: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_dummy: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<Status>,
}
