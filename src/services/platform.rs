//! Seams to the surrounding study-group platform: authentication, group
//! membership, and document text retrieval all live behind traits because
//! other services of the platform own them.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{error::AppError, services::content::llm::DocumentAttachment, state::SharedState};

/// Identity of an authenticated platform user.
#[derive(Debug, Clone)]
pub struct UserProfile {
    /// Stable user identifier.
    pub id: Uuid,
    /// Display name.
    pub username: String,
}

/// Role of a user within a study group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    /// Regular group member.
    Member,
    /// Group administrator; may delete any game of the group.
    Admin,
}

/// Authentication and membership oracle of the platform.
pub trait Directory: Send + Sync {
    /// Resolve an access token to a user, if valid.
    fn authenticate(&self, token: String) -> BoxFuture<'static, Option<UserProfile>>;
    /// Role of `user_id` within `group_id`, or `None` for non-members.
    fn membership(&self, group_id: Uuid, user_id: Uuid) -> BoxFuture<'static, Option<GroupRole>>;
}

/// Access to extracted text of group documents for LLM grounding.
pub trait DocumentProvider: Send + Sync {
    /// Fetch the extracted text of the given group documents. Unknown ids are
    /// silently skipped; generation proceeds with whatever text is available.
    fn fetch_texts(
        &self,
        group_id: Uuid,
        document_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, Vec<DocumentAttachment>>;
}

/// Development stand-in for the platform directory.
///
/// Accepts tokens of the form `<user-uuid>:<username>` and treats every user
/// as an admin of every group. Deployments front this backend with the
/// platform's real auth service and swap in its directory implementation.
pub struct DevDirectory;

impl Directory for DevDirectory {
    fn authenticate(&self, token: String) -> BoxFuture<'static, Option<UserProfile>> {
        Box::pin(async move {
            let (id, username) = token.split_once(':')?;
            let id = Uuid::parse_str(id).ok()?;
            if username.is_empty() {
                return None;
            }
            Some(UserProfile {
                id,
                username: username.to_string(),
            })
        })
    }

    fn membership(&self, _group_id: Uuid, _user_id: Uuid) -> BoxFuture<'static, Option<GroupRole>> {
        Box::pin(async move { Some(GroupRole::Admin) })
    }
}

/// Document provider that never finds any documents.
pub struct NoDocuments;

impl DocumentProvider for NoDocuments {
    fn fetch_texts(
        &self,
        _group_id: Uuid,
        _document_ids: Vec<Uuid>,
    ) -> BoxFuture<'static, Vec<DocumentAttachment>> {
        Box::pin(async move { Vec::new() })
    }
}

/// Resolve the REST caller from an `Authorization: Bearer` header.
pub async fn authenticate_bearer(
    state: &SharedState,
    headers: &HeaderMap,
) -> Result<UserProfile, AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    state
        .directory()
        .authenticate(token.to_string())
        .await
        .ok_or_else(|| AppError::Unauthorized("invalid token".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dev_directory_parses_id_and_username() {
        let id = Uuid::new_v4();
        let profile = DevDirectory
            .authenticate(format!("{id}:ada"))
            .await
            .unwrap();
        assert_eq!(profile.id, id);
        assert_eq!(profile.username, "ada");
    }

    #[tokio::test]
    async fn dev_directory_rejects_malformed_tokens() {
        assert!(DevDirectory.authenticate("not-a-token".into()).await.is_none());
        assert!(
            DevDirectory
                .authenticate(format!("{}:", Uuid::new_v4()))
                .await
                .is_none()
        );
    }
}
