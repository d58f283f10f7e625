//! Session accessor: who, if anyone, is making this request.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use store::Profile;

/// Key for storing the caller's identity in the session.
pub const SESSION_IDENTITY_KEY: &str = "identity";

/// The authenticated caller. Only valid for the request it was read in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

impl From<&Profile> for Identity {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email.clone(),
        }
    }
}

/// Read the caller's identity. A missing or unreadable session is `None`.
pub async fn identify(session: &Session) -> Option<Identity> {
    match session.get::<Identity>(SESSION_IDENTITY_KEY).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Ignoring unreadable session: {}", e);
            None
        }
    }
}

/// Bind an identity to the session under a fresh session id.
pub async fn remember(session: &Session, identity: &Identity) -> Result<()> {
    session
        .cycle_id()
        .await
        .map_err(|e| Error::Session(e.to_string()))?;
    session
        .insert(SESSION_IDENTITY_KEY, identity)
        .await
        .map_err(|e| Error::Session(e.to_string()))
}

/// Drop everything stored in the session.
pub async fn forget(session: &Session) -> Result<()> {
    session
        .flush()
        .await
        .map_err(|e| Error::Session(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_anonymous_session_is_none() {
        assert!(identify(&session()).await.is_none());
    }

    #[tokio::test]
    async fn test_remember_and_forget() {
        let session = session();
        let identity = Identity {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
        };

        remember(&session, &identity).await.unwrap();
        assert_eq!(identify(&session).await, Some(identity));

        forget(&session).await.unwrap();
        assert!(identify(&session).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_value_is_none() {
        let session = session();
        session
            .insert(SESSION_IDENTITY_KEY, "not an identity")
            .await
            .unwrap();
        assert!(identify(&session).await.is_none());
    }
}
