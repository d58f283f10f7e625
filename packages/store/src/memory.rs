use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::backend::{at_most_one, Backend};
use crate::error::{Error, Result};
use crate::models::{
    Affiliation, Credentials, Institution, InstitutionWithMembers, Member, Membership,
    NewAccount, Profile, ProfileUpdate, ProfileWithInstitutions,
};

/// In-memory Backend for tests and local runs without Postgres.
///
/// Enforces the same uniqueness rules as the SQL schema.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: Vec<Credentials>,
    profiles: Vec<Profile>,
    institutions: Vec<Institution>,
    memberships: Vec<Membership>,
}

impl Tables {
    fn username(&self, id: Uuid) -> Option<&str> {
        self.profiles
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.username.as_str())
    }

    fn slug(&self, id: Uuid) -> Option<&str> {
        self.institutions
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.slug.as_str())
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Backend("memory backend lock poisoned".to_string()))
    }

    /// Number of membership rows for a pair. Used to check that joins never duplicate.
    pub fn membership_rows(&self, institution_id: Uuid, member_id: Uuid) -> usize {
        self.tables()
            .map(|t| {
                t.memberships
                    .iter()
                    .filter(|m| m.institution_id == institution_id && m.member_id == member_id)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn institution_count(&self) -> usize {
        self.tables().map(|t| t.institutions.len()).unwrap_or(0)
    }

    /// Insert a profile row directly, bypassing the uniqueness checks.
    #[cfg(test)]
    pub(crate) fn insert_profile_unchecked(&self, profile: Profile) {
        if let Ok(mut tables) = self.tables() {
            tables.profiles.push(profile);
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create_account(&self, account: NewAccount) -> Result<Profile> {
        let mut tables = self.tables()?;
        if tables.accounts.iter().any(|a| a.email == account.email) {
            return Err(Error::Conflict(format!(
                "an account with email {} already exists",
                account.email
            )));
        }
        if tables.profiles.iter().any(|p| p.username == account.username) {
            return Err(Error::Conflict(format!(
                "username {} is taken",
                account.username
            )));
        }

        let id = Uuid::new_v4();
        tables.accounts.push(Credentials {
            id,
            email: account.email.clone(),
            password_hash: account.password_hash,
        });
        let profile = Profile {
            id,
            username: account.username,
            email: account.email,
            first_name: None,
            last_name: None,
            public_fields: BTreeSet::new(),
        };
        tables.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn fetch_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        let tables = self.tables()?;
        let rows = tables
            .accounts
            .iter()
            .filter(|a| a.email == email)
            .cloned()
            .collect();
        at_most_one(rows, "account")
    }

    async fn fetch_profile_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let tables = self.tables()?;
        let rows = tables
            .profiles
            .iter()
            .filter(|p| p.username == username)
            .cloned()
            .collect();
        at_most_one(rows, "profile")
    }

    async fn fetch_profile_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        let tables = self.tables()?;
        let rows = tables
            .profiles
            .iter()
            .filter(|p| p.id == id)
            .cloned()
            .collect();
        at_most_one(rows, "profile")
    }

    async fn fetch_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let tables = self.tables()?;
        let rows = tables
            .profiles
            .iter()
            .filter(|p| p.email == email)
            .cloned()
            .collect();
        at_most_one(rows, "profile")
    }

    async fn fetch_profile_with_institutions(
        &self,
        username: &str,
    ) -> Result<Option<ProfileWithInstitutions>> {
        let tables = self.tables()?;
        let rows = tables
            .profiles
            .iter()
            .filter(|p| p.username == username)
            .cloned()
            .collect();
        let Some(profile) = at_most_one(rows, "profile")? else {
            return Ok(None);
        };

        let institutions = tables
            .memberships
            .iter()
            .filter(|m| m.member_id == profile.id)
            .filter_map(|m| {
                tables.slug(m.institution_id).map(|slug| Affiliation {
                    institution_id: m.institution_id,
                    slug: slug.to_string(),
                    is_privileged: m.is_privileged,
                })
            })
            .collect();

        Ok(Some(ProfileWithInstitutions {
            profile,
            institutions,
        }))
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile> {
        let mut tables = self.tables()?;
        let profile = tables
            .profiles
            .iter_mut()
            .find(|p| p.id == update.profile_id)
            .ok_or(Error::Missing("profile"))?;

        profile.first_name = update.first_name;
        profile.last_name = update.last_name;
        profile.public_fields = update.public_fields;
        Ok(profile.clone())
    }

    async fn create_institution(&self, slug: &str, creator: Uuid) -> Result<Institution> {
        let mut tables = self.tables()?;
        if tables.institutions.iter().any(|i| i.slug == slug) {
            return Err(Error::Conflict(format!("slug {slug} is taken")));
        }
        if tables.username(creator).is_none() {
            return Err(Error::Missing("profile"));
        }

        let now = Utc::now();
        let institution = Institution {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            created_at: now,
        };
        tables.institutions.push(institution.clone());
        tables.memberships.push(Membership {
            institution_id: institution.id,
            member_id: creator,
            is_privileged: true,
            created_at: now,
        });
        Ok(institution)
    }

    async fn fetch_institution_by_slug(&self, slug: &str) -> Result<Option<Institution>> {
        let tables = self.tables()?;
        let rows = tables
            .institutions
            .iter()
            .filter(|i| i.slug == slug)
            .cloned()
            .collect();
        at_most_one(rows, "institution")
    }

    async fn fetch_institution_with_members(
        &self,
        slug: &str,
    ) -> Result<Option<InstitutionWithMembers>> {
        let tables = self.tables()?;
        let rows = tables
            .institutions
            .iter()
            .filter(|i| i.slug == slug)
            .cloned()
            .collect();
        let Some(institution) = at_most_one(rows, "institution")? else {
            return Ok(None);
        };

        let mut joined: Vec<(DateTime<Utc>, Member)> = tables
            .memberships
            .iter()
            .filter(|m| m.institution_id == institution.id)
            .filter_map(|m| {
                tables.username(m.member_id).map(|username| {
                    let member = Member {
                        member_id: m.member_id,
                        username: username.to_string(),
                        is_privileged: m.is_privileged,
                    };
                    (m.created_at, member)
                })
            })
            .collect();
        joined.sort_by(|(a_at, a), (b_at, b)| {
            a_at.cmp(b_at).then_with(|| a.username.cmp(&b.username))
        });

        let members = joined.into_iter().map(|(_, member)| member).collect();

        Ok(Some(InstitutionWithMembers {
            institution,
            members,
        }))
    }

    async fn update_institution_slug(
        &self,
        institution_id: Uuid,
        slug: &str,
    ) -> Result<Institution> {
        let mut tables = self.tables()?;
        if tables
            .institutions
            .iter()
            .any(|i| i.slug == slug && i.id != institution_id)
        {
            return Err(Error::Conflict(format!("slug {slug} is taken")));
        }
        let institution = tables
            .institutions
            .iter_mut()
            .find(|i| i.id == institution_id)
            .ok_or(Error::Missing("institution"))?;

        institution.slug = slug.to_string();
        Ok(institution.clone())
    }

    async fn add_membership(
        &self,
        institution_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<Membership>> {
        let mut tables = self.tables()?;
        if tables
            .memberships
            .iter()
            .any(|m| m.institution_id == institution_id && m.member_id == member_id)
        {
            return Ok(None);
        }
        if tables.slug(institution_id).is_none() {
            return Err(Error::Missing("institution"));
        }
        if tables.username(member_id).is_none() {
            return Err(Error::Missing("profile"));
        }

        let membership = Membership {
            institution_id,
            member_id,
            is_privileged: false,
            created_at: Utc::now(),
        };
        tables.memberships.push(membership.clone());
        Ok(Some(membership))
    }

    async fn has_membership(&self, institution_id: Uuid, member_id: Uuid) -> Result<bool> {
        let tables = self.tables()?;
        Ok(tables
            .memberships
            .iter()
            .any(|m| m.institution_id == institution_id && m.member_id == member_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublicField;

    fn account(email: &str, username: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_account_and_fetch() {
        let backend = MemoryBackend::new();
        let profile = backend
            .create_account(account("ada@example.com", "ada"))
            .await
            .unwrap();

        assert!(profile.public_fields.is_empty());
        assert_eq!(
            backend.fetch_profile_by_username("ada").await.unwrap(),
            Some(profile.clone())
        );
        assert_eq!(
            backend.fetch_profile_by_id(profile.id).await.unwrap(),
            Some(profile.clone())
        );
        assert_eq!(
            backend
                .fetch_profile_by_email("ada@example.com")
                .await
                .unwrap(),
            Some(profile.clone())
        );
        let credentials = backend
            .fetch_credentials("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(credentials.id, profile.id);

        // Absent rows are None, not errors
        assert!(backend.fetch_profile_by_username("bob").await.unwrap().is_none());
        assert!(backend
            .fetch_profile_by_id(Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_conflict() {
        let backend = MemoryBackend::new();
        backend
            .create_account(account("ada@example.com", "ada"))
            .await
            .unwrap();

        let err = backend
            .create_account(account("other@example.com", "ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let err = backend
            .create_account(account("ada@example.com", "ada2"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_profile_changes_only_editable_fields() {
        let backend = MemoryBackend::new();
        let before = backend
            .create_account(account("ada@example.com", "ada"))
            .await
            .unwrap();

        let update = ProfileUpdate {
            profile_id: before.id,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            public_fields: [PublicField::FirstName].into_iter().collect(),
        };
        backend.update_profile(update).await.unwrap();

        let after = backend.fetch_profile_by_id(before.id).await.unwrap().unwrap();
        assert_eq!(after.first_name.as_deref(), Some("Ada"));
        assert_eq!(after.last_name.as_deref(), Some("Lovelace"));
        assert!(after.is_public(PublicField::FirstName));
        assert!(!after.is_public(PublicField::LastName));
        assert_eq!(after.id, before.id);
        assert_eq!(after.username, before.username);
        assert_eq!(after.email, before.email);
    }

    #[tokio::test]
    async fn test_update_missing_profile_fails() {
        let backend = MemoryBackend::new();
        let update = ProfileUpdate {
            profile_id: Uuid::new_v4(),
            first_name: None,
            last_name: None,
            public_fields: BTreeSet::new(),
        };
        let err = backend.update_profile(update).await.unwrap_err();
        assert!(matches!(err, Error::Missing("profile")));
    }

    #[tokio::test]
    async fn test_creator_is_privileged_member() {
        let backend = MemoryBackend::new();
        let ada = backend
            .create_account(account("ada@example.com", "ada"))
            .await
            .unwrap();

        let acme = backend.create_institution("acme", ada.id).await.unwrap();
        assert!(backend.has_membership(acme.id, ada.id).await.unwrap());

        let loaded = backend
            .fetch_institution_with_members("acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.institution, acme);
        assert_eq!(
            loaded.members,
            vec![Member {
                member_id: ada.id,
                username: "ada".to_string(),
                is_privileged: true,
            }]
        );

        let err = backend.create_institution("acme", ada.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(backend.institution_count(), 1);
    }

    #[tokio::test]
    async fn test_add_membership_is_insert_if_absent() {
        let backend = MemoryBackend::new();
        let ada = backend
            .create_account(account("ada@example.com", "ada"))
            .await
            .unwrap();
        let bob = backend
            .create_account(account("bob@example.com", "bob"))
            .await
            .unwrap();
        let acme = backend.create_institution("acme", ada.id).await.unwrap();

        assert!(!backend.has_membership(acme.id, bob.id).await.unwrap());

        let first = backend.add_membership(acme.id, bob.id).await.unwrap();
        assert!(matches!(first, Some(ref m) if !m.is_privileged));
        let second = backend.add_membership(acme.id, bob.id).await.unwrap();
        assert!(second.is_none());
        assert_eq!(backend.membership_rows(acme.id, bob.id), 1);

        // Existing privileged row is left as it is
        assert!(backend.add_membership(acme.id, ada.id).await.unwrap().is_none());

        let with = backend
            .fetch_profile_with_institutions("bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with.institutions.len(), 1);
        assert_eq!(with.institutions[0].slug, "acme");
        assert!(!with.institutions[0].is_privileged);
    }

    #[tokio::test]
    async fn test_concurrent_add_membership_leaves_one_row() {
        let backend = MemoryBackend::new();
        let ada = backend
            .create_account(account("ada@example.com", "ada"))
            .await
            .unwrap();
        let bob = backend
            .create_account(account("bob@example.com", "bob"))
            .await
            .unwrap();
        let acme = backend.create_institution("acme", ada.id).await.unwrap();

        let (first, second) = tokio::join!(
            backend.add_membership(acme.id, bob.id),
            backend.add_membership(acme.id, bob.id)
        );
        let inserted = [first.unwrap(), second.unwrap()]
            .into_iter()
            .filter(Option::is_some)
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(backend.membership_rows(acme.id, bob.id), 1);
    }

    #[tokio::test]
    async fn test_rename_to_taken_slug_keeps_original() {
        let backend = MemoryBackend::new();
        let ada = backend
            .create_account(account("ada@example.com", "ada"))
            .await
            .unwrap();
        let acme = backend.create_institution("acme", ada.id).await.unwrap();
        backend.create_institution("globex", ada.id).await.unwrap();

        let err = backend
            .update_institution_slug(acme.id, "globex")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(backend.fetch_institution_by_slug("acme").await.unwrap().is_some());

        let renamed = backend
            .update_institution_slug(acme.id, "acme-corp")
            .await
            .unwrap();
        assert_eq!(renamed.slug, "acme-corp");
        assert!(backend.fetch_institution_by_slug("acme").await.unwrap().is_none());

        // Renaming to its own slug is not a collision
        backend
            .update_institution_slug(acme.id, "acme-corp")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_email_rows_are_integrity_errors() {
        let backend = MemoryBackend::new();
        for username in ["twin_a", "twin_b"] {
            backend.insert_profile_unchecked(Profile {
                id: Uuid::new_v4(),
                username: username.to_string(),
                email: "twin@example.com".to_string(),
                first_name: None,
                last_name: None,
                public_fields: BTreeSet::new(),
            });
        }

        let err = backend
            .fetch_profile_by_email("twin@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }
}
