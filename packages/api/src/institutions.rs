//! # Institution flows
//!
//! Creation, the institution page, slug renames and adding members.
//!
//! ## Join flow
//!
//! A membership goes from *unseen* to *joined* and stays there: nothing here removes a
//! member or changes privilege.
//!
//! 1. Resolve the institution by slug and the profile by email; either missing is
//!    [`Error::NotFound`].
//! 2. Already a member: success, no second row.
//! 3. Otherwise insert an unprivileged membership. The insert is conditional, so two
//!    concurrent joins of the same pair still leave exactly one row.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use store::{Backend, Institution, Profile};

use crate::access;
use crate::auth::{normalize_email, Identity};
use crate::error::{Error, Result};
use crate::views::{CreateInstitutionView, InstitutionView};

/// Slug that would shadow the creation route.
const RESERVED_SLUG: &str = "create";

/// Result of adding a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
}

/// Slugs are non-empty ASCII letters, digits, `-` and `_`.
pub fn validate_slug(slug: &str) -> Result<&str> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(Error::invalid("slug is required"));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::invalid(
            "slug may only contain letters, digits, '-' and '_'",
        ));
    }
    if slug == RESERVED_SLUG {
        return Err(Error::invalid(format!("slug `{RESERVED_SLUG}` is reserved")));
    }
    Ok(slug)
}

/// State for the creation page. Only signed-in callers with a profile get one.
pub async fn create_page(
    backend: &dyn Backend,
    identity: Option<&Identity>,
) -> Result<CreateInstitutionView> {
    let identity = identity.ok_or(Error::Unauthenticated)?;
    let profile = backend.fetch_profile_by_id(identity.id).await?.ok_or_else(|| {
        store::Error::Integrity(format!("account {} has no profile", identity.id))
    })?;

    Ok(CreateInstitutionView {
        username: profile.username,
    })
}

/// Create an institution with the caller as its privileged member.
pub async fn create_institution(
    backend: &dyn Backend,
    identity: Option<&Identity>,
    slug: &str,
) -> Result<Institution> {
    let identity = identity.ok_or(Error::Unauthenticated)?;
    let slug = validate_slug(slug)?;

    let institution = backend.create_institution(slug, identity.id).await?;
    info!("{} created institution {}", identity.id, institution.slug);
    Ok(institution)
}

pub async fn view_institution(
    backend: &dyn Backend,
    identity: Option<&Identity>,
    slug: &str,
) -> Result<InstitutionView> {
    let loaded = backend
        .fetch_institution_with_members(slug)
        .await?
        .ok_or(Error::NotFound("institution"))?;

    let username = match identity {
        Some(identity) => backend
            .fetch_profile_by_id(identity.id)
            .await?
            .map(|p| p.username),
        None => None,
    };

    Ok(InstitutionView::new(loaded, identity, username))
}

/// Rename the institution at `slug`. Only privileged members may do this.
pub async fn rename_institution(
    backend: &dyn Backend,
    identity: Option<&Identity>,
    slug: &str,
    institution_id: &str,
    new_slug: &str,
) -> Result<Institution> {
    let identity = identity.ok_or(Error::Unauthenticated)?;
    let institution_id = Uuid::parse_str(institution_id.trim())
        .map_err(|_| Error::invalid("institution-id is not a valid id"))?;
    let new_slug = validate_slug(new_slug)?;

    let loaded = backend
        .fetch_institution_with_members(slug)
        .await?
        .ok_or(Error::NotFound("institution"))?;
    if loaded.institution.id != institution_id {
        return Err(Error::invalid("institution-id does not match the slug"));
    }
    if !access::is_privileged(Some(identity), &loaded.members) {
        warn!("{} may not rename {}", identity.id, slug);
        return Err(Error::Forbidden);
    }

    let renamed = backend
        .update_institution_slug(institution_id, new_slug)
        .await
        .map_err(|e| match e {
            store::Error::Missing(what) => Error::NotFound(what),
            other => Error::Store(other),
        })?;

    info!("Renamed institution {} to {}", slug, renamed.slug);
    Ok(renamed)
}

/// Add the profile registered under `email` to the institution at `slug`.
///
/// The caller must be a privileged member.
pub async fn add_member(
    backend: &dyn Backend,
    identity: Option<&Identity>,
    slug: &str,
    email: &str,
) -> Result<JoinOutcome> {
    let identity = identity.ok_or(Error::Unauthenticated)?;
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(Error::invalid("email is required"));
    }

    let loaded = backend
        .fetch_institution_with_members(slug)
        .await?
        .ok_or(Error::NotFound("institution"))?;
    if !access::is_privileged(Some(identity), &loaded.members) {
        warn!("{} may not add members to {}", identity.id, slug);
        return Err(Error::Forbidden);
    }

    let profile = backend
        .fetch_profile_by_email(&email)
        .await?
        .ok_or(Error::NotFound("profile"))?;

    join(backend, &loaded.institution, &profile).await
}

/// Make `profile` a member of `institution` unless it already is one.
pub async fn join(
    backend: &dyn Backend,
    institution: &Institution,
    profile: &Profile,
) -> Result<JoinOutcome> {
    if backend
        .has_membership(institution.id, profile.id)
        .await?
    {
        return Ok(JoinOutcome::AlreadyMember);
    }

    match backend.add_membership(institution.id, profile.id).await? {
        Some(_) => {
            info!("{} joined {}", profile.username, institution.slug);
            Ok(JoinOutcome::Joined)
        }
        None => Ok(JoinOutcome::AlreadyMember),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::sign_up;
    use store::{Member, MemoryBackend};

    async fn two_users(backend: &MemoryBackend) -> (Identity, Identity) {
        let ada = sign_up(backend, "ada@example.com", "correct horse", "ada")
            .await
            .unwrap();
        let bob = sign_up(backend, "bob@example.com", "correct horse", "bob")
            .await
            .unwrap();
        (ada, bob)
    }

    #[test]
    fn test_validate_slug() {
        assert_eq!(validate_slug(" acme ").unwrap(), "acme");
        assert_eq!(validate_slug("acme-corp_2").unwrap(), "acme-corp_2");
        assert!(validate_slug("").is_err());
        assert!(validate_slug("acme corp").is_err());
        assert!(validate_slug("a/b").is_err());
        assert!(validate_slug("create").is_err());
    }

    #[tokio::test]
    async fn test_create_then_add_member() {
        let backend = MemoryBackend::new();
        let (ada, bob) = two_users(&backend).await;

        let acme = create_institution(&backend, Some(&ada), "acme").await.unwrap();
        let outcome = add_member(&backend, Some(&ada), "acme", "bob@example.com")
            .await
            .unwrap();
        assert_eq!(outcome, JoinOutcome::Joined);

        let loaded = backend
            .fetch_institution_with_members("acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.institution.id, acme.id);
        assert_eq!(
            loaded.members,
            vec![
                Member {
                    member_id: ada.id,
                    username: "ada".to_string(),
                    is_privileged: true,
                },
                Member {
                    member_id: bob.id,
                    username: "bob".to_string(),
                    is_privileged: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_join_twice_is_idempotent() {
        let backend = MemoryBackend::new();
        let (ada, bob) = two_users(&backend).await;
        let acme = create_institution(&backend, Some(&ada), "acme").await.unwrap();

        for expected in [JoinOutcome::Joined, JoinOutcome::AlreadyMember] {
            let outcome = add_member(&backend, Some(&ada), "acme", "BOB@example.com")
                .await
                .unwrap();
            assert_eq!(outcome, expected);
        }
        assert_eq!(backend.membership_rows(acme.id, bob.id), 1);
    }

    #[tokio::test]
    async fn test_add_member_requires_privilege() {
        let backend = MemoryBackend::new();
        let (ada, bob) = two_users(&backend).await;
        create_institution(&backend, Some(&ada), "acme").await.unwrap();
        add_member(&backend, Some(&ada), "acme", "bob@example.com")
            .await
            .unwrap();

        assert!(matches!(
            add_member(&backend, Some(&bob), "acme", "ada@example.com").await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            add_member(&backend, None, "acme", "bob@example.com").await,
            Err(Error::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_add_member_not_found() {
        let backend = MemoryBackend::new();
        let (ada, _) = two_users(&backend).await;
        create_institution(&backend, Some(&ada), "acme").await.unwrap();

        assert!(matches!(
            add_member(&backend, Some(&ada), "acme", "nobody@example.com").await,
            Err(Error::NotFound("profile"))
        ));
        assert!(matches!(
            add_member(&backend, Some(&ada), "globex", "bob@example.com").await,
            Err(Error::NotFound("institution"))
        ));
    }

    #[tokio::test]
    async fn test_unauthenticated_create_writes_nothing() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            create_institution(&backend, None, "acme").await,
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            create_page(&backend, None).await,
            Err(Error::Unauthenticated)
        ));
        assert_eq!(backend.institution_count(), 0);
    }

    #[tokio::test]
    async fn test_create_page_names_creator() {
        let backend = MemoryBackend::new();
        let (ada, _) = two_users(&backend).await;
        let view = create_page(&backend, Some(&ada)).await.unwrap();
        assert_eq!(view.username, "ada");
    }

    #[tokio::test]
    async fn test_rename() {
        let backend = MemoryBackend::new();
        let (ada, bob) = two_users(&backend).await;
        let acme = create_institution(&backend, Some(&ada), "acme").await.unwrap();
        create_institution(&backend, Some(&bob), "globex").await.unwrap();
        let id = acme.id.to_string();

        // Collision leaves the original slug in place
        let err = rename_institution(&backend, Some(&ada), "acme", &id, "globex")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(store::Error::Conflict(_))));
        assert!(backend.fetch_institution_by_slug("acme").await.unwrap().is_some());

        assert!(matches!(
            rename_institution(&backend, Some(&bob), "acme", &id, "acme2").await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            rename_institution(&backend, Some(&ada), "acme", "nope", "acme2").await,
            Err(Error::Invalid(_))
        ));

        let renamed = rename_institution(&backend, Some(&ada), "acme", &id, "acme2")
            .await
            .unwrap();
        assert_eq!(renamed.slug, "acme2");
    }

    #[tokio::test]
    async fn test_view_institution() {
        let backend = MemoryBackend::new();
        let (ada, bob) = two_users(&backend).await;
        create_institution(&backend, Some(&ada), "acme").await.unwrap();

        let view = view_institution(&backend, Some(&ada), "acme").await.unwrap();
        assert!(view.is_privileged);
        assert_eq!(view.username.as_deref(), Some("ada"));

        let view = view_institution(&backend, Some(&bob), "acme").await.unwrap();
        assert!(!view.is_member);
        assert_eq!(view.members.map(|m| m.len()), Some(1));

        assert!(matches!(
            view_institution(&backend, None, "globex").await,
            Err(Error::NotFound("institution"))
        ));
    }
}
