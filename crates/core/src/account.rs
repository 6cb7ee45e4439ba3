//! Login and registration form validation.
//!
//! The limits mirror what the backend enforces so obvious mistakes are
//! reported before a round trip.

use core::fmt;

use crate::types::{Email, EmailError};

pub const MAX_USERNAME_CHARS: usize = 50;
pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("Username is required.")]
    UsernameEmpty,
    #[error("Username must be at most 50 characters.")]
    UsernameTooLong,
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),
    #[error("Password must be at least 6 characters.")]
    PasswordTooShort,
}

/// Validated login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: Email,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// # Errors
    ///
    /// Returns [`CredentialsError`] for a malformed email or short password.
    pub fn parse(email: &str, password: &str) -> Result<Self, CredentialsError> {
        let email = Email::parse(email)?;
        check_password(password)?;
        Ok(Self {
            email,
            password: password.to_string(),
        })
    }
}

/// Validated account registration.
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub credentials: Credentials,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl Registration {
    /// # Errors
    ///
    /// Returns [`CredentialsError`] describing the first invalid field.
    pub fn parse(username: &str, email: &str, password: &str) -> Result<Self, CredentialsError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CredentialsError::UsernameEmpty);
        }
        if username.chars().count() > MAX_USERNAME_CHARS {
            return Err(CredentialsError::UsernameTooLong);
        }
        Ok(Self {
            username: username.to_string(),
            credentials: Credentials::parse(email, password)?,
        })
    }
}

fn check_password(password: &str) -> Result<(), CredentialsError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(CredentialsError::PasswordTooShort);
    }
    Ok(())
}
