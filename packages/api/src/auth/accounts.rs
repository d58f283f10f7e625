//! Sign-up and sign-in with email and password.

use tracing::info;

use super::password::{hash_password, verify_password};
use super::session::Identity;
use crate::error::{Error, Result};
use store::models::is_valid_username;
use store::{Backend, NewAccount};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Emails are compared trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register an account and its profile.
///
/// The username is checked against existing profiles before anything is written.
pub async fn sign_up(
    backend: &dyn Backend,
    email: &str,
    password: &str,
    username: &str,
) -> Result<Identity> {
    let email = normalize_email(email);
    let username = username.trim();

    if email.is_empty() || !email.contains('@') {
        return Err(Error::invalid("Invalid email address"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::invalid(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !is_valid_username(username) {
        return Err(Error::invalid(
            "Username may only contain letters, digits and underscores",
        ));
    }

    if backend.fetch_profile_by_username(username).await?.is_some() {
        return Err(Error::UsernameTaken);
    }

    let password_hash = hash_password(password)?;
    let profile = backend
        .create_account(NewAccount {
            email,
            username: username.to_string(),
            password_hash,
        })
        .await?;

    info!("Registered {} ({})", profile.username, profile.id);
    Ok(Identity::from(&profile))
}

/// Check an email and password pair.
pub async fn sign_in(backend: &dyn Backend, email: &str, password: &str) -> Result<Identity> {
    let email = normalize_email(email);

    let Some(credentials) = backend.fetch_credentials(&email).await? else {
        return Err(Error::InvalidCredentials);
    };

    if !verify_password(password, &credentials.password_hash)? {
        return Err(Error::InvalidCredentials);
    }

    Ok(Identity {
        id: credentials.id,
        email: credentials.email,
    })
}
