//! # Domain models for profiles and institutions
//!
//! Defines the records a [`crate::Backend`] reads and writes. The entities mirror
//! the three backend collections one to one; the `*With*` types are read-only
//! projections that bundle an entity with rows joined from the membership table.
//!
//! ## Entities
//!
//! | Struct | Collection | Notes |
//! |--------|-----------|-------|
//! | [`Profile`] | `profiles` | `id` equals the account id. `username` is unique and never updated. |
//! | [`Institution`] | `institutions` | `slug` is unique and can be renamed by a privileged member. |
//! | [`Membership`] | `institution_members` | At most one row per `(institution_id, member_id)`. |
//!
//! ## Projections
//!
//! - [`ProfileWithInstitutions`]: a profile plus the slugs of every institution it belongs to.
//! - [`InstitutionWithMembers`]: an institution plus its ordered member list.
//!
//! ## Write inputs
//!
//! [`NewAccount`] and [`ProfileUpdate`] carry the arguments of the two writes that
//! touch profiles. [`Credentials`] is what sign-in reads back.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A profile field the owner can expose to other viewers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicField {
    FirstName,
    LastName,
}

impl PublicField {
    pub const ALL: [PublicField; 2] = [PublicField::FirstName, PublicField::LastName];

    /// Column name as stored in `profiles.public_fields`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicField::FirstName => "first_name",
            PublicField::LastName => "last_name",
        }
    }
}

impl fmt::Display for PublicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known [`PublicField`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown profile field `{0}`")]
pub struct UnknownField(pub String);

impl FromStr for PublicField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_name" => Ok(PublicField::FirstName),
            "last_name" => Ok(PublicField::LastName),
            other => Err(UnknownField(other.to_string())),
        }
    }
}

/// Full profile record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub public_fields: BTreeSet<PublicField>,
}

impl Profile {
    /// Value of a field that can be made public.
    pub fn field(&self, field: PublicField) -> Option<&str> {
        match field {
            PublicField::FirstName => self.first_name.as_deref(),
            PublicField::LastName => self.last_name.as_deref(),
        }
    }

    pub fn is_public(&self, field: PublicField) -> bool {
        self.public_fields.contains(&field)
    }
}

/// Institution record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub id: Uuid,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Row of the `institution_members` join table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub institution_id: Uuid,
    pub member_id: Uuid,
    pub is_privileged: bool,
    pub created_at: DateTime<Utc>,
}

/// A member as listed on an institution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: Uuid,
    pub username: String,
    pub is_privileged: bool,
}

/// An institution a profile belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affiliation {
    pub institution_id: Uuid,
    pub slug: String,
    pub is_privileged: bool,
}

/// Institution joined with its members, ordered by the time they joined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstitutionWithMembers {
    pub institution: Institution,
    pub members: Vec<Member>,
}

/// Profile joined with the institutions it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileWithInstitutions {
    pub profile: Profile,
    pub institutions: Vec<Affiliation>,
}

/// Arguments for creating an account together with its profile.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Stored sign-in data for one account.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// New values for the owner-editable part of a profile.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileUpdate {
    pub profile_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub public_fields: BTreeSet<PublicField>,
}

/// Usernames are ASCII letters, digits and underscores.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse the comma-joined `public-fields` form value. Empty input is the empty set.
pub fn parse_public_fields(value: &str) -> Result<BTreeSet<PublicField>, UnknownField> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::parse)
        .collect()
}
