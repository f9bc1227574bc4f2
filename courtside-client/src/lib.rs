pub mod cache;
pub mod config;
pub mod error;
pub mod mutations;
pub mod queries;
pub mod remote;
pub mod viewer;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use cache::{QueryCache, QueryData, ViewerKey};
pub use config::ClientConfig;
pub use error::{ConnectionError, Result};
pub use mutations::{MutationOutcome, Mutations};
pub use queries::{DirectoryQuery, PendingQuery, Queries};
pub use remote::{HttpRemote, RemoteGraph};
pub use viewer::ViewerContext;

/// One call per endpoint of the connection graph. Every function takes the
/// other user's id, never a connection record id.
pub mod client {
    use reqwest::{Client, RequestBuilder, Response};
    use serde::de::DeserializeOwned;
    use tracing::debug;
    use courtside_common::{Direction, NetworkUser, PendingRequest, RelationshipRecord, UserId};
    use crate::config::ClientConfig;
    use crate::error::{ConnectionError, Result};
    use crate::viewer::ViewerContext;

    pub async fn send_connection(client: &Client, config: &ClientConfig, viewer: &ViewerContext, target: UserId) -> Result<RelationshipRecord> {
        let url = config.endpoint(&format!("/connections/{target}"));
        debug!(viewer = %viewer.user_id, %target, "POST {url}");
        read_json(authorized(client.post(url), viewer).send().await?).await
    }
    pub async fn accept_from_user(client: &Client, config: &ClientConfig, viewer: &ViewerContext, other: UserId) -> Result<RelationshipRecord> {
        let url = config.endpoint(&format!("/connections/user/{other}/accept"));
        debug!(viewer = %viewer.user_id, %other, "POST {url}");
        read_json(authorized(client.post(url), viewer).send().await?).await
    }
    pub async fn reject_from_user(client: &Client, config: &ClientConfig, viewer: &ViewerContext, other: UserId) -> Result<Option<RelationshipRecord>> {
        let url = config.endpoint(&format!("/connections/user/{other}/reject"));
        debug!(viewer = %viewer.user_id, %other, "POST {url}");
        read_optional(authorized(client.post(url), viewer).send().await?).await
    }
    pub async fn cancel_or_remove(client: &Client, config: &ClientConfig, viewer: &ViewerContext, target: UserId) -> Result<()> {
        let url = config.endpoint(&format!("/connections/{target}"));
        debug!(viewer = %viewer.user_id, %target, "DELETE {url}");
        check(authorized(client.delete(url), viewer).send().await?).await?;
        Ok(())
    }
    pub async fn get_pending(client: &Client, config: &ClientConfig, viewer: &ViewerContext, direction: Direction) -> Result<Vec<PendingRequest>> {
        let url = config.endpoint("/connections/pending");
        debug!(viewer = %viewer.user_id, %direction, "GET {url}");
        read_json(
            authorized(client.get(url), viewer)
                .query(&[("direction", direction.as_str())])
                .send()
                .await?,
        )
        .await
    }
    pub async fn get_network_users(client: &Client, config: &ClientConfig, viewer: &ViewerContext) -> Result<Vec<NetworkUser>> {
        let url = config.endpoint("/users/networking");
        debug!(viewer = %viewer.user_id, "GET {url}");
        read_json(authorized(client.get(url), viewer).send().await?).await
    }

    fn authorized(request: RequestBuilder, viewer: &ViewerContext) -> RequestBuilder {
        match viewer.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ConnectionError::from_status(status, body))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn read_optional<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
        let bytes = check(response).await?.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

/// Queries and mutations over HTTP sharing one cache. Cache entries are
/// kept apart per viewer, so one pair can serve several viewers.
pub fn http_stack(config: &ClientConfig) -> Result<(Queries<HttpRemote>, Mutations<HttpRemote>)> {
    let remote = Arc::new(HttpRemote::new(config)?);
    let cache = Arc::new(QueryCache::new());
    Ok((Queries::new(remote.clone(), cache.clone()), Mutations::new(remote, cache)))
}
