//! # Backend: the data access contract
//!
//! [`Backend`] is the only way the rest of the workspace reaches stored data. Every
//! method is one remote round trip that either succeeds, reports an [`Error`], or (for
//! single-row reads) yields `None` when nothing matched. Implementations must be
//! stateless between calls apart from their connection handle, so one instance can be
//! shared by every request.
//!
//! | Method | Not found |
//! |--------|-----------|
//! | `fetch_profile_by_*`, `fetch_institution_*` | `Ok(None)` |
//! | `update_profile`, `update_institution_slug` | `Err(Error::Missing)` |
//! | `create_*`, `update_institution_slug` on a taken name | `Err(Error::Conflict)` |
//!
//! Single-row reads go through [`at_most_one`], so two matching rows surface as
//! [`Error::Integrity`] instead of one being picked silently.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Credentials, Institution, InstitutionWithMembers, Membership, NewAccount, Profile,
    ProfileUpdate, ProfileWithInstitutions,
};

#[async_trait]
pub trait Backend: Send + Sync {
    /// Create an account and its profile in one step.
    async fn create_account(&self, account: NewAccount) -> Result<Profile>;

    async fn fetch_credentials(&self, email: &str) -> Result<Option<Credentials>>;

    async fn fetch_profile_by_username(&self, username: &str) -> Result<Option<Profile>>;

    async fn fetch_profile_by_id(&self, id: Uuid) -> Result<Option<Profile>>;

    async fn fetch_profile_by_email(&self, email: &str) -> Result<Option<Profile>>;

    async fn fetch_profile_with_institutions(
        &self,
        username: &str,
    ) -> Result<Option<ProfileWithInstitutions>>;

    async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile>;

    /// Create an institution and make `creator` its first, privileged member.
    async fn create_institution(&self, slug: &str, creator: Uuid) -> Result<Institution>;

    async fn fetch_institution_by_slug(&self, slug: &str) -> Result<Option<Institution>>;

    async fn fetch_institution_with_members(
        &self,
        slug: &str,
    ) -> Result<Option<InstitutionWithMembers>>;

    async fn update_institution_slug(&self, institution_id: Uuid, slug: &str)
        -> Result<Institution>;

    /// Insert an unprivileged membership unless one exists.
    ///
    /// Returns `None` when the pair was already a member. The check and the insert are a
    /// single operation.
    async fn add_membership(&self, institution_id: Uuid, member_id: Uuid)
        -> Result<Option<Membership>>;

    async fn has_membership(&self, institution_id: Uuid, member_id: Uuid) -> Result<bool>;
}

/// Collapse the rows of a single-row query.
pub fn at_most_one<T>(rows: Vec<T>, what: &str) -> Result<Option<T>> {
    let count = rows.len();
    let mut rows = rows.into_iter();
    match (rows.next(), count) {
        (None, _) => Ok(None),
        (Some(row), 1) => Ok(Some(row)),
        (Some(_), n) => Err(Error::Integrity(format!(
            "expected at most one {what}, found {n}"
        ))),
    }
}
