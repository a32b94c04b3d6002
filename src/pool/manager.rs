//! Resource Manager Module
//!
//! The capability a pool uses to open and close the resources it hands out.

use async_trait::async_trait;

/// Creates and destroys pooled resources.
///
/// `create` may fail; the error is surfaced to the caller of
/// [`ResourcePool::acquire`](super::ResourcePool::acquire) and never retried.
/// `destroy` must tolerate resources that are already broken or closed.
#[async_trait]
pub trait ResourceManager: Send + Sync + 'static {
    /// The pooled resource, e.g. a database connection
    type Resource: Send + 'static;

    /// Error produced when a resource cannot be opened
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens one new resource.
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Closes one resource. Dropping it is enough for most resources.
    fn destroy(&self, resource: Self::Resource) {
        drop(resource);
    }
}
