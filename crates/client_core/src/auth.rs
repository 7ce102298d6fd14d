//! Hardcoded operator login. There is no credential store behind it.

use shared::domain::{User, UserId};
use thiserror::Error;
use tracing::{info, warn};

const MOCK_USERNAME: &str = "admin";
const MOCK_PASSWORD: &str = "123456";
const MOCK_USER_ID: i64 = 1;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("current password is incorrect")]
    WrongCurrentPassword,
    #[error("new passwords do not match")]
    PasswordMismatch,
    #[error("new password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
}

pub fn login(username: &str, password: &str) -> Result<User, AuthError> {
    if username.trim().eq_ignore_ascii_case(MOCK_USERNAME) && password == MOCK_PASSWORD {
        info!(username = MOCK_USERNAME, "login succeeded");
        Ok(User {
            id: UserId(MOCK_USER_ID),
            username: MOCK_USERNAME.to_string(),
        })
    } else {
        warn!(username = username.trim(), "login failed: invalid credentials");
        Err(AuthError::InvalidCredentials)
    }
}

/// Validates the form locally; nothing is persisted.
pub fn change_password(current: &str, new: &str, confirm: &str) -> Result<(), AuthError> {
    if new != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }
    if current != MOCK_PASSWORD {
        return Err(AuthError::WrongCurrentPassword);
    }
    info!("password change accepted");
    Ok(())
}
