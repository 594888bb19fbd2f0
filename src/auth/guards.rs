//! Ordered authorization checks run after a user has been authenticated.
use crate::{
    auth::repo_types::{Role, User},
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Copy)]
pub enum Guard {
    Active,
    RoleIn(&'static [Role]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Guard {
    pub fn check(&self, user: &User) -> Decision {
        match self {
            Guard::Active if !user.active => Decision::Deny("This account has been deactivated".into()),
            Guard::RoleIn(roles) if !roles.contains(&user.role) => {
                Decision::Deny("You do not have permission to perform this action".into())
            }
            _ => Decision::Allow,
        }
    }
}

/// First denial wins.
pub fn evaluate(guards: &[Guard], user: &User) -> AppResult<()> {
    for guard in guards {
        if let Decision::Deny(reason) = guard.check(user) {
            return Err(AppError::Authorization(reason));
        }
    }
    Ok(())
}

pub fn restrict_to(user: &User, roles: &'static [Role]) -> AppResult<()> {
    evaluate(&[Guard::RoleIn(roles)], user)
}
