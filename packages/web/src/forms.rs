//! URL-encoded form bodies. Every field is optional at the type level so that a
//! missing field is reported as 400 by [`required`].

use serde::Deserialize;

use crate::error::AppError;

/// Take a field that must be present.
pub fn required(value: Option<String>, name: &'static str) -> Result<String, AppError> {
    value.ok_or(AppError::MissingField(name))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignUpForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    #[serde(rename = "profile-id")]
    pub profile_id: Option<String>,
    #[serde(rename = "first-name")]
    pub first_name: Option<String>,
    #[serde(rename = "last-name")]
    pub last_name: Option<String>,
    #[serde(rename = "public-fields")]
    pub public_fields: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SlugForm {
    pub slug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenameForm {
    #[serde(rename = "institution-id")]
    pub institution_id: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailForm {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginQuery {
    pub error: Option<String>,
}
