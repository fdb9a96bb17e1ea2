use crate::domain::model::{ListFilters, Page, PageDescriptor, ResourceKind};
use crate::domain::ports::{ConfigProvider, RemoteCollection};
use crate::utils::error::{InventoryError, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const TOTAL_HEADER: &str = "x-total";
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// GitLab REST v4 client.
#[derive(Debug, Clone)]
pub struct GitlabClient {
    client: Client,
    api_root: Url,
    host: String,
    token: Option<String>,
}

impl GitlabClient {
    pub fn new(base_url: &str, token: Option<String>, request_timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        let host = match (base.host_str(), base.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(InventoryError::MalformedUrl {
                    url: base_url.to_string(),
                    reason: "URL has no host".to_string(),
                })
            }
        };

        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let api_root = base.join("api/v4/")?;

        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            api_root,
            host,
            token,
        })
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        Self::new(
            config.base_url(),
            config.token().map(str::to_string),
            config.request_timeout(),
        )
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    fn collection_url(&self, kind: ResourceKind) -> Result<Url> {
        Ok(self.api_root.join(&kind.path())?)
    }

    /// `id` may be numeric or a namespaced path; `/` is percent-encoded.
    pub fn single_url(&self, kind: ResourceKind, id: &str) -> Result<Url> {
        let mut url = self.collection_url(kind)?;
        url.path_segments_mut()
            .map_err(|_| InventoryError::MalformedUrl {
                url: self.api_root.to_string(),
                reason: "API root cannot be a base URL".to_string(),
            })?
            .push(id);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }
}

fn expect_success(status: StatusCode, expected: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(InventoryError::UnexpectedStatus {
            code: status.as_u16(),
            expected: expected.as_u16(),
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

fn total_count(headers: &HeaderMap, kind: ResourceKind) -> Result<usize> {
    let raw = header_str(headers, TOTAL_HEADER).ok_or_else(|| InventoryError::CountUnavailable {
        resource: kind.to_string(),
        reason: "X-Total header missing".to_string(),
    })?;

    raw.parse()
        .map_err(|_| InventoryError::CountUnavailable {
            resource: kind.to_string(),
            reason: format!("X-Total header is not a number: '{}'", raw),
        })
}

fn next_page(headers: &HeaderMap) -> u32 {
    header_str(headers, NEXT_PAGE_HEADER)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl RemoteCollection for GitlabClient {
    async fn count_of(&self, kind: ResourceKind, filters: &ListFilters) -> Result<usize> {
        let url = self.collection_url(kind)?;
        tracing::debug!("Counting {} via {}", kind, url);

        let mut query = vec![("per_page", "1".to_string())];
        query.extend(filters.query_pairs());

        let response = self
            .authorized(self.client.get(url).query(&query))
            .send()
            .await?;
        expect_success(response.status(), StatusCode::OK)?;

        let count = total_count(response.headers(), kind)?;
        tracing::debug!("{} reports {} items", kind, count);
        Ok(count)
    }

    async fn list_page<T>(
        &self,
        kind: ResourceKind,
        page: PageDescriptor,
        filters: &ListFilters,
    ) -> Result<Page<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.collection_url(kind)?;
        let mut query = vec![
            ("page", page.index.to_string()),
            ("per_page", page.size.to_string()),
        ];
        query.extend(filters.query_pairs());

        let response = self
            .authorized(self.client.get(url).query(&query))
            .send()
            .await?;
        tracing::debug!("{} page {} status: {}", kind, page.index, response.status());
        expect_success(response.status(), StatusCode::OK)?;

        let next_page = next_page(response.headers());
        let items: Vec<T> = response.json().await?;
        Ok(Page { items, next_page })
    }

    async fn get_single<T>(&self, kind: ResourceKind, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.single_url(kind, id)?;
        let response = self.authorized(self.client.get(url)).send().await?;
        tracing::debug!("{} {} status: {}", kind, id, response.status());

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        expect_success(response.status(), StatusCode::OK)?;

        Ok(Some(response.json().await?))
    }

    async fn create<B, T>(&self, kind: ResourceKind, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.collection_url(kind)?;
        let response = self
            .authorized(self.client.post(url).json(body))
            .send()
            .await?;
        tracing::debug!("POST {} status: {}", kind, response.status());
        expect_success(response.status(), StatusCode::CREATED)?;

        Ok(response.json().await?)
    }

    fn host(&self) -> &str {
        &self.host
    }
}
