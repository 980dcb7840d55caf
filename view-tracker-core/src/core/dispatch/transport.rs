use crate::core::dispatch::{Result, UpdateRequest, UpdateResponse};
use async_trait::async_trait;
use std::fmt::Debug;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// The network transport which delivers the tracking updates to the collector.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait UpdateTransport: Debug + Send + Sync {
    /// Send the given update request to the collector.
    ///
    /// # Returns
    ///
    /// It returns the collector response on success, else the [crate::core::dispatch::TransportError].
    async fn send(&self, request: UpdateRequest) -> Result<UpdateResponse>;
}
