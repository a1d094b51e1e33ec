//! Network fetch seam used by the offline cache proxy.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{NetError, Request, Response};

/// Something that can perform a live network fetch.
///
/// Resolves to a [`Response`] for any HTTP status; only transport failures
/// (offline, DNS, refused connection, timeout) are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        (**self).fetch(request).await
    }
}
