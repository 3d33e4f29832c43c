use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use linktrack_core::error::CoreError;
use linktrack_core::model::{Link, LinkId, NewLink, Session};
use linktrack_core::query::LinkFilter;
use linktrack_core::storage::{IdentityService, LinkStore};

use crate::codec::{self, GraphqlRequest};
use crate::error::ProtocolError;

/// Per-request timeout. Expiry surfaces as an ordinary transport failure.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Link store reached over the deep GraphQL endpoint.
///
/// Cloning is cheap; clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct GraphqlStore {
    http: reqwest::Client,
    endpoint: String,
    session: Option<Session>,
}

impl GraphqlStore {
    /// An anonymous handle for `endpoint` (full URL including scheme).
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProtocolError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            session: None,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Post one operation and return its `data`.
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, ProtocolError> {
        let mut request = self.http.post(&self.endpoint).json(&GraphqlRequest {
            query,
            variables,
        });
        if let Some(token) = self.session.as_ref().and_then(|s| s.token.as_deref()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        let body: Value = response.json().await?;
        codec::decode_envelope(body)
    }
}

#[async_trait]
impl LinkStore for GraphqlStore {
    async fn id(&self, namespace: &str, name: &str) -> Result<LinkId, CoreError> {
        let data = self
            .execute(
                codec::RESOLVE_NAME,
                json!({ "namespace": namespace, "name": name }),
            )
            .await?;
        codec::decode_resolved(&data)?.ok_or_else(|| CoreError::UnknownName {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    async fn select(&self, filter: &LinkFilter) -> Result<Vec<Link>, CoreError> {
        let data = self
            .execute(
                &codec::select_document(),
                json!({ "where": codec::bool_exp(filter) }),
            )
            .await?;
        let links = codec::decode_selected(&data)?;
        tracing::debug!(count = links.len(), "select");
        Ok(links)
    }

    async fn insert(&self, link: &NewLink) -> Result<Vec<Link>, CoreError> {
        let data = self
            .execute(
                &codec::insert_document(),
                json!({ "objects": [codec::insert_object(link)] }),
            )
            .await?;
        Ok(codec::decode_inserted(&data)?)
    }

    async fn delete(&self, filter: &LinkFilter) -> Result<u64, CoreError> {
        if filter.is_unrestricted() {
            return Err(CoreError::Rejected(
                "refusing to delete without a filter".to_string(),
            ));
        }
        let data = self
            .execute(codec::DELETE, json!({ "where": codec::bool_exp(filter) }))
            .await?;
        let deleted = codec::decode_deleted(&data)?;
        tracing::debug!(deleted, "delete");
        Ok(deleted)
    }
}

#[async_trait]
impl IdentityService for GraphqlStore {
    async fn guest(&self) -> Result<Session, CoreError> {
        let data = self.execute(codec::GUEST, json!({})).await?;
        Ok(codec::decode_session(&data, "guest")?)
    }

    async fn login(&self, link_id: LinkId) -> Result<Session, CoreError> {
        if self.session.is_none() {
            return Err(CoreError::Rejected("login requires a session".to_string()));
        }
        let data = self
            .execute(codec::LOGIN, json!({ "linkId": link_id }))
            .await?;
        Ok(codec::decode_session(&data, "jwt")?)
    }

    fn with_session(&self, session: &Session) -> Self {
        Self {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            session: Some(session.clone()),
        }
    }
}
