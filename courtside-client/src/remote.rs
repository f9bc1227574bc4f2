use async_trait::async_trait;
use reqwest::Client;
use courtside_common::{Direction, NetworkUser, PendingRequest, RelationshipRecord, UserId};

use crate::client;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::viewer::ViewerContext;

/// The remote connection graph as queries and mutations see it.
#[async_trait]
pub trait RemoteGraph: Send + Sync + 'static {
    async fn connect(&self, viewer: &ViewerContext, target: UserId) -> Result<RelationshipRecord>;
    async fn accept(&self, viewer: &ViewerContext, other: UserId) -> Result<RelationshipRecord>;
    async fn reject(&self, viewer: &ViewerContext, other: UserId) -> Result<Option<RelationshipRecord>>;
    /// Deletes an outgoing request or an accepted connection; the server
    /// decides which one exists.
    async fn cancel_or_remove(&self, viewer: &ViewerContext, target: UserId) -> Result<()>;
    async fn pending(&self, viewer: &ViewerContext, direction: Direction) -> Result<Vec<PendingRequest>>;
    async fn directory(&self, viewer: &ViewerContext) -> Result<Vec<NetworkUser>>;
}

#[derive(Clone, Debug)]
pub struct HttpRemote {
    client: Client,
    config: ClientConfig,
}

impl HttpRemote {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self { client: config.http_client()?, config: config.clone() })
    }
}

#[async_trait]
impl RemoteGraph for HttpRemote {
    async fn connect(&self, viewer: &ViewerContext, target: UserId) -> Result<RelationshipRecord> {
        client::send_connection(&self.client, &self.config, viewer, target).await
    }
    async fn accept(&self, viewer: &ViewerContext, other: UserId) -> Result<RelationshipRecord> {
        client::accept_from_user(&self.client, &self.config, viewer, other).await
    }
    async fn reject(&self, viewer: &ViewerContext, other: UserId) -> Result<Option<RelationshipRecord>> {
        client::reject_from_user(&self.client, &self.config, viewer, other).await
    }
    async fn cancel_or_remove(&self, viewer: &ViewerContext, target: UserId) -> Result<()> {
        client::cancel_or_remove(&self.client, &self.config, viewer, target).await
    }
    async fn pending(&self, viewer: &ViewerContext, direction: Direction) -> Result<Vec<PendingRequest>> {
        client::get_pending(&self.client, &self.config, viewer, direction).await
    }
    async fn directory(&self, viewer: &ViewerContext) -> Result<Vec<NetworkUser>> {
        client::get_network_users(&self.client, &self.config, viewer).await
    }
}
