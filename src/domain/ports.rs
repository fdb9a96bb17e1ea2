use crate::domain::model::{ListFilters, Page, PageDescriptor, ResourceKind};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Request-per-call access to a paginated remote API.
///
/// The pagination engine only relies on this contract, so tests and callers
/// can substitute a fake for the HTTP adapter.
#[async_trait]
pub trait RemoteCollection: Send + Sync + 'static {
    /// Total number of items matching `filters`, read from response metadata.
    async fn count_of(&self, kind: ResourceKind, filters: &ListFilters) -> Result<usize>;

    async fn list_page<T>(
        &self,
        kind: ResourceKind,
        page: PageDescriptor,
        filters: &ListFilters,
    ) -> Result<Page<T>>
    where
        T: DeserializeOwned + Send + 'static;

    /// `Ok(None)` when the resource does not exist.
    async fn get_single<T>(&self, kind: ResourceKind, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static;

    async fn create<B, T>(&self, kind: ResourceKind, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send + 'static;

    /// Host of the instance, as it appears in `web_url` fields.
    fn host(&self) -> &str;
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn token(&self) -> Option<&str>;
    fn page_size(&self) -> usize;
    fn max_in_flight(&self) -> usize;
    /// `None` disables the per-page deadline.
    fn page_timeout(&self) -> Option<Duration>;
    fn request_timeout(&self) -> Duration;
}
