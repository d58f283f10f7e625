//! # Viewer-specific projections
//!
//! What a given caller is allowed to see of a profile or an institution. These are
//! the bodies of successful `GET` responses; they are built from the store projections
//! by applying the rules in [`crate::access`] and never written back.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use store::{Affiliation, InstitutionWithMembers, Member, ProfileWithInstitutions, PublicField};

use crate::access;
use crate::auth::Identity;
use crate::settings::EmailVisibility;

/// Landing page state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexView {
    pub is_authenticated: bool,
    pub username: Option<String>,
}

/// Login page state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginView {
    pub error: Option<String>,
}

/// Institution creation page state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateInstitutionView {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Only reported to the owner.
    pub public_fields: Option<Vec<PublicField>>,
    pub is_owner: bool,
    pub is_authenticated: bool,
    /// Only reported to signed-in viewers.
    pub institutions: Option<Vec<Affiliation>>,
}

impl ProfileView {
    pub fn new(
        loaded: ProfileWithInstitutions,
        identity: Option<&Identity>,
        email_policy: EmailVisibility,
    ) -> Self {
        let ProfileWithInstitutions {
            profile,
            institutions,
        } = loaded;
        let is_owner = access::is_owner(identity, &profile);
        let is_authenticated = identity.is_some();

        // Non-owners never see blank values, even for public fields
        let visible = |field: PublicField| {
            profile
                .field(field)
                .filter(|value| is_owner || !value.is_empty())
                .filter(|_| access::can_see_field(identity, &profile, field))
                .map(str::to_string)
        };

        Self {
            id: profile.id,
            username: profile.username.clone(),
            email: access::can_see_email(identity, &profile, email_policy)
                .then(|| profile.email.clone()),
            first_name: visible(PublicField::FirstName),
            last_name: visible(PublicField::LastName),
            public_fields: is_owner.then(|| profile.public_fields.iter().copied().collect()),
            is_owner,
            is_authenticated,
            institutions: is_authenticated.then_some(institutions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionView {
    pub id: Uuid,
    pub slug: String,
    pub is_authenticated: bool,
    pub is_member: bool,
    pub is_privileged: bool,
    /// Username of the viewer, for navigation.
    pub username: Option<String>,
    pub members: Option<Vec<Member>>,
}

impl InstitutionView {
    pub fn new(
        loaded: InstitutionWithMembers,
        identity: Option<&Identity>,
        username: Option<String>,
    ) -> Self {
        let InstitutionWithMembers {
            institution,
            members,
        } = loaded;
        let is_member = access::is_member(identity, &members);
        let is_privileged = access::is_privileged(identity, &members);
        let can_see_members = access::can_see_members(identity);

        Self {
            id: institution.id,
            slug: institution.slug,
            is_authenticated: identity.is_some(),
            is_member,
            is_privileged,
            username,
            members: can_see_members.then_some(members),
        }
    }
}
