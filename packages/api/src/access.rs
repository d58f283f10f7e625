//! # Authorization gate
//!
//! Pure decisions over data that is already loaded. Nothing here performs I/O.
//!
//! | Function | True when |
//! |----------|-----------|
//! | [`is_owner`] | the caller's id is the profile's id |
//! | [`is_member`] | the caller appears in the member list |
//! | [`is_privileged`] | the caller appears in the member list with `is_privileged` |
//! | [`can_see_field`] | the caller owns the profile, or the field is public |
//! | [`can_see_email`] | the configured [`EmailVisibility`] admits the caller |
//! | [`can_see_members`] | the caller is signed in |

use store::{Member, Profile, PublicField};

use crate::auth::Identity;
use crate::settings::EmailVisibility;

pub fn is_owner(identity: Option<&Identity>, profile: &Profile) -> bool {
    identity.is_some_and(|identity| identity.id == profile.id)
}

pub fn is_member(identity: Option<&Identity>, members: &[Member]) -> bool {
    identity.is_some_and(|identity| members.iter().any(|m| m.member_id == identity.id))
}

pub fn is_privileged(identity: Option<&Identity>, members: &[Member]) -> bool {
    identity.is_some_and(|identity| {
        members
            .iter()
            .any(|m| m.member_id == identity.id && m.is_privileged)
    })
}

pub fn can_see_field(identity: Option<&Identity>, profile: &Profile, field: PublicField) -> bool {
    is_owner(identity, profile) || profile.is_public(field)
}

pub fn can_see_email(
    identity: Option<&Identity>,
    profile: &Profile,
    policy: EmailVisibility,
) -> bool {
    match policy {
        EmailVisibility::Public => true,
        EmailVisibility::Authenticated => identity.is_some(),
        EmailVisibility::Owner => is_owner(identity, profile),
    }
}

/// Member lists are shown to any signed-in viewer, members included.
pub fn can_see_members(identity: Option<&Identity>) -> bool {
    identity.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn identity(id: Uuid) -> Identity {
        Identity {
            id,
            email: "viewer@example.com".to_string(),
        }
    }

    fn profile(public_fields: &[PublicField]) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            public_fields: public_fields.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn member(id: Uuid, is_privileged: bool) -> Member {
        Member {
            member_id: id,
            username: "m".to_string(),
            is_privileged,
        }
    }

    #[test]
    fn test_is_owner() {
        let profile = profile(&[]);
        assert!(is_owner(Some(&identity(profile.id)), &profile));
        assert!(!is_owner(Some(&identity(Uuid::new_v4())), &profile));
        assert!(!is_owner(None, &profile));
    }

    #[test]
    fn test_membership_checks() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let members = vec![member(a, true), member(b, false)];

        assert!(is_member(Some(&identity(a)), &members));
        assert!(is_member(Some(&identity(b)), &members));
        assert!(!is_member(Some(&identity(c)), &members));
        assert!(!is_member(None, &members));

        assert!(is_privileged(Some(&identity(a)), &members));
        assert!(!is_privileged(Some(&identity(b)), &members));
        assert!(!is_privileged(Some(&identity(c)), &members));
        assert!(!is_privileged(None, &members));
    }

    #[test]
    fn test_field_visibility() {
        let profile = profile(&[PublicField::LastName]);
        let stranger = identity(Uuid::new_v4());
        let owner = identity(profile.id);

        for viewer in [None, Some(&stranger)] {
            assert!(!can_see_field(viewer, &profile, PublicField::FirstName));
            assert!(can_see_field(viewer, &profile, PublicField::LastName));
        }
        for field in PublicField::ALL {
            assert!(can_see_field(Some(&owner), &profile, field));
        }
    }

    #[test]
    fn test_email_policy() {
        let profile = profile(&[]);
        let stranger = identity(Uuid::new_v4());
        let owner = identity(profile.id);

        assert!(can_see_email(None, &profile, EmailVisibility::Public));
        assert!(!can_see_email(None, &profile, EmailVisibility::Authenticated));
        assert!(can_see_email(Some(&stranger), &profile, EmailVisibility::Authenticated));
        assert!(!can_see_email(Some(&stranger), &profile, EmailVisibility::Owner));
        assert!(can_see_email(Some(&owner), &profile, EmailVisibility::Owner));
    }
}
