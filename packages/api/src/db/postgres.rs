//! Postgres implementation of [`Backend`].
//!
//! Single-row reads use `fetch_all` followed by [`at_most_one`] rather than
//! `fetch_optional`, which would silently return the first of several rows.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use store::models::UnknownField;
use store::{
    at_most_one, Affiliation, Backend, Credentials, Error, Institution, InstitutionWithMembers,
    Member, Membership, NewAccount, Profile, ProfileUpdate, ProfileWithInstitutions, PublicField,
    Result,
};

/// Backend over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ProfileRow {
    id: Uuid,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    public_fields: Vec<String>,
}

impl ProfileRow {
    fn into_profile(self) -> Result<Profile> {
        let public_fields: BTreeSet<PublicField> = self
            .public_fields
            .iter()
            .map(|name| name.parse::<PublicField>())
            .collect::<std::result::Result<_, UnknownField>>()
            .map_err(|e| Error::Integrity(format!("profile {}: {}", self.id, e)))?;

        Ok(Profile {
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            public_fields,
        })
    }
}

#[derive(FromRow)]
struct InstitutionRow {
    id: Uuid,
    slug: String,
    created_at: DateTime<Utc>,
}

impl From<InstitutionRow> for Institution {
    fn from(row: InstitutionRow) -> Self {
        Institution {
            id: row.id,
            slug: row.slug,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct MembershipRow {
    institution_id: Uuid,
    member_id: Uuid,
    is_privileged: bool,
    created_at: DateTime<Utc>,
}

impl From<MembershipRow> for Membership {
    fn from(row: MembershipRow) -> Self {
        Membership {
            institution_id: row.institution_id,
            member_id: row.member_id,
            is_privileged: row.is_privileged,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct MemberRow {
    member_id: Uuid,
    username: String,
    is_privileged: bool,
}

#[derive(FromRow)]
struct AffiliationRow {
    institution_id: Uuid,
    slug: String,
    is_privileged: bool,
}

#[derive(FromRow)]
struct CredentialsRow {
    id: Uuid,
    email: String,
    password_hash: String,
}

/// Translate a sqlx error into the store's error kinds. Logging is left to the caller.
fn classify(err: sqlx::Error) -> Error {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return Error::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return Error::Missing("referenced row");
        }
    }
    Error::backend(err)
}

fn single_profile(rows: Vec<ProfileRow>) -> Result<Option<Profile>> {
    at_most_one(rows, "profile")?
        .map(ProfileRow::into_profile)
        .transpose()
}

#[async_trait]
impl Backend for PgBackend {
    async fn create_account(&self, account: NewAccount) -> Result<Profile> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(classify)?;

        sqlx::query("INSERT INTO accounts (id, email, password_hash) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(&account.email)
            .bind(&account.password_hash)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        let row: ProfileRow = sqlx::query_as(
            r#"
            INSERT INTO profiles (id, username, email)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, first_name, last_name, public_fields
            "#,
        )
        .bind(id)
        .bind(&account.username)
        .bind(&account.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)?;
        row.into_profile()
    }

    async fn fetch_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        let rows: Vec<CredentialsRow> =
            sqlx::query_as("SELECT id, email, password_hash FROM accounts WHERE email = $1")
                .bind(email)
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;

        Ok(at_most_one(rows, "account")?.map(|row| Credentials {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
        }))
    }

    async fn fetch_profile_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(
            "SELECT id, username, email, first_name, last_name, public_fields FROM profiles WHERE username = $1",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        single_profile(rows)
    }

    async fn fetch_profile_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(
            "SELECT id, username, email, first_name, last_name, public_fields FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        single_profile(rows)
    }

    async fn fetch_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(
            "SELECT id, username, email, first_name, last_name, public_fields FROM profiles WHERE email = $1",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        single_profile(rows)
    }

    async fn fetch_profile_with_institutions(
        &self,
        username: &str,
    ) -> Result<Option<ProfileWithInstitutions>> {
        let Some(profile) = self.fetch_profile_by_username(username).await? else {
            return Ok(None);
        };

        let rows: Vec<AffiliationRow> = sqlx::query_as(
            r#"
            SELECT m.institution_id, i.slug, m.is_privileged
            FROM institution_members m
            JOIN institutions i ON i.id = m.institution_id
            WHERE m.member_id = $1
            ORDER BY m.created_at, i.slug
            "#,
        )
        .bind(profile.id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        let institutions = rows
            .into_iter()
            .map(|row| Affiliation {
                institution_id: row.institution_id,
                slug: row.slug,
                is_privileged: row.is_privileged,
            })
            .collect();

        Ok(Some(ProfileWithInstitutions {
            profile,
            institutions,
        }))
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile> {
        let public_fields: Vec<String> = update
            .public_fields
            .iter()
            .map(|field| field.as_str().to_string())
            .collect();

        let rows: Vec<ProfileRow> = sqlx::query_as(
            r#"
            UPDATE profiles
            SET first_name = $2, last_name = $3, public_fields = $4
            WHERE id = $1
            RETURNING id, username, email, first_name, last_name, public_fields
            "#,
        )
        .bind(update.profile_id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&public_fields)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        single_profile(rows)?.ok_or(Error::Missing("profile"))
    }

    async fn create_institution(&self, slug: &str, creator: Uuid) -> Result<Institution> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let row: InstitutionRow = sqlx::query_as(
            "INSERT INTO institutions (id, slug) VALUES ($1, $2) RETURNING id, slug, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(slug)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        sqlx::query(
            "INSERT INTO institution_members (institution_id, member_id, is_privileged) VALUES ($1, $2, TRUE)",
        )
        .bind(row.id)
        .bind(creator)
        .execute(&mut *tx)
        .await
        .map_err(|e| match classify(e) {
            Error::Missing(_) => Error::Missing("profile"),
            other => other,
        })?;

        tx.commit().await.map_err(classify)?;
        Ok(row.into())
    }

    async fn fetch_institution_by_slug(&self, slug: &str) -> Result<Option<Institution>> {
        let rows: Vec<InstitutionRow> =
            sqlx::query_as("SELECT id, slug, created_at FROM institutions WHERE slug = $1")
                .bind(slug)
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;

        Ok(at_most_one(rows, "institution")?.map(Institution::from))
    }

    async fn fetch_institution_with_members(
        &self,
        slug: &str,
    ) -> Result<Option<InstitutionWithMembers>> {
        let Some(institution) = self.fetch_institution_by_slug(slug).await? else {
            return Ok(None);
        };

        let rows: Vec<MemberRow> = sqlx::query_as(
            r#"
            SELECT m.member_id, p.username, m.is_privileged
            FROM institution_members m
            JOIN profiles p ON p.id = m.member_id
            WHERE m.institution_id = $1
            ORDER BY m.created_at, p.username
            "#,
        )
        .bind(institution.id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        let members = rows
            .into_iter()
            .map(|row| Member {
                member_id: row.member_id,
                username: row.username,
                is_privileged: row.is_privileged,
            })
            .collect();

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
        let rows: Vec<InstitutionRow> = sqlx::query_as(
            "UPDATE institutions SET slug = $2 WHERE id = $1 RETURNING id, slug, created_at",
        )
        .bind(institution_id)
        .bind(slug)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        at_most_one(rows, "institution")?
            .map(Institution::from)
            .ok_or(Error::Missing("institution"))
    }

    async fn add_membership(
        &self,
        institution_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<Membership>> {
        let row: Option<MembershipRow> = sqlx::query_as(
            r#"
            INSERT INTO institution_members (institution_id, member_id, is_privileged)
            VALUES ($1, $2, FALSE)
            ON CONFLICT (institution_id, member_id) DO NOTHING
            RETURNING institution_id, member_id, is_privileged, created_at
            "#,
        )
        .bind(institution_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        Ok(row.map(Membership::from))
    }

    async fn has_membership(&self, institution_id: Uuid, member_id: Uuid) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM institution_members
                WHERE institution_id = $1 AND member_id = $2
            )
            "#,
        )
        .bind(institution_id)
        .bind(member_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(exists)
    }
}
