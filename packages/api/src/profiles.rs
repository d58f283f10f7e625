//! Profile flows: landing page, profile page and owner edits.

use tracing::{info, warn};
use uuid::Uuid;

use store::models::parse_public_fields;
use store::{Backend, Profile, ProfileUpdate};

use crate::auth::Identity;
use crate::error::{Error, Result};
use crate::settings::EmailVisibility;
use crate::views::{IndexView, ProfileView};

/// Raw values of the profile edit form.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub profile_id: String,
    pub first_name: String,
    pub last_name: String,
    /// Comma-joined field names.
    pub public_fields: String,
}

impl ProfileEdit {
    /// Validate the form. Blank names are stored as absent.
    pub fn parse(&self) -> Result<ProfileUpdate> {
        let profile_id = Uuid::parse_str(self.profile_id.trim())
            .map_err(|_| Error::invalid("profile-id is not a valid id"))?;
        let public_fields =
            parse_public_fields(&self.public_fields).map_err(|e| Error::invalid(e.to_string()))?;

        Ok(ProfileUpdate {
            profile_id,
            first_name: non_blank(&self.first_name),
            last_name: non_blank(&self.last_name),
            public_fields,
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub async fn index(backend: &dyn Backend, identity: Option<&Identity>) -> Result<IndexView> {
    let Some(identity) = identity else {
        return Ok(IndexView {
            is_authenticated: false,
            username: None,
        });
    };

    let profile = backend.fetch_profile_by_id(identity.id).await?;
    Ok(IndexView {
        is_authenticated: true,
        username: profile.map(|p| p.username),
    })
}

pub async fn view_profile(
    backend: &dyn Backend,
    identity: Option<&Identity>,
    username: &str,
    email_policy: EmailVisibility,
) -> Result<ProfileView> {
    let loaded = backend
        .fetch_profile_with_institutions(username)
        .await?
        .ok_or(Error::NotFound("profile"))?;

    Ok(ProfileView::new(loaded, identity, email_policy))
}

/// Apply an edit submitted by the profile owner.
pub async fn update_profile(
    backend: &dyn Backend,
    identity: Option<&Identity>,
    edit: &ProfileEdit,
) -> Result<Profile> {
    let identity = identity.ok_or(Error::Unauthenticated)?;
    let update = edit.parse()?;

    if update.profile_id != identity.id {
        warn!(
            "{} tried to edit profile {}",
            identity.id, update.profile_id
        );
        return Err(Error::Forbidden);
    }

    let profile = backend.update_profile(update).await.map_err(|e| match e {
        store::Error::Missing(what) => Error::NotFound(what),
        other => Error::Store(other),
    })?;

    info!("Updated profile {}", profile.username);
    Ok(profile)
}
