use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::repo_types::{Role, User};

/// Body of `PATCH /users/updateMe`. Password fields are accepted only so
/// they can be refused; anything else unknown is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// Body of the admin `PATCH /users/:id`. Passwords are refused here too;
/// they only change through the reset and update-password flows.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserOne {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<Value>,
}
