//! Raw watch connections.

use crate::crd::ExternalSecret;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{AsyncBufReadExt, StreamExt};
use kube::api::WatchParams;
use kube::{Client, Resource};

/// Lines of one watch connection; ends when the connection ends
pub type LineStream = BoxStream<'static, Result<String>>;

/// Opens watch connections on the ExternalSecret collection
#[async_trait]
pub trait WatchSource: Send + Sync {
    async fn open_stream(&self) -> Result<LineStream>;
}

/// Watches ExternalSecrets in every namespace through the API server
#[derive(Clone)]
pub struct KubeWatchSource {
    client: Client,
}

impl std::fmt::Debug for KubeWatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeWatchSource").finish_non_exhaustive()
    }
}

impl KubeWatchSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WatchSource for KubeWatchSource {
    async fn open_stream(&self) -> Result<LineStream> {
        let request = kube::core::Request::new(ExternalSecret::url_path(&(), None))
            .watch(&WatchParams::default().disable_bookmarks(), "0")
            .context("Failed to build ExternalSecret watch request")?;

        let body = self
            .client
            .request_stream(request)
            .await
            .context("Failed to open ExternalSecret watch")?;

        Ok(Box::pin(body)
            .lines()
            .map(|line| line.context("ExternalSecret watch connection failed"))
            .boxed())
    }
}
