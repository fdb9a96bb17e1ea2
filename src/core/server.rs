use crate::config::{DEFAULT_PAGE_SIZE, DEFAULT_PAGE_TIMEOUT_SECS};
use crate::core::concurrent::{ConcurrentFetcher, FetchOutcome};
use crate::core::hierarchy;
use crate::core::sequential::{fetch_all_sequential, find_sequential};
use crate::domain::model::{
    AccessLevel, AddMemberRequest, Commit, Group, Hook, HookOptions, ListFilters, Member, Page,
    PageDescriptor, Project, ResourceKind, User,
};
use crate::domain::ports::{ConfigProvider, RemoteCollection};
use crate::utils::error::{InventoryError, Result};
use serde::de::DeserializeOwned;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const ITEMS_PER_PAGE: NonZeroUsize = match NonZeroUsize::new(DEFAULT_PAGE_SIZE) {
    Some(size) => size,
    None => unreachable!(),
};

pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(DEFAULT_PAGE_TIMEOUT_SECS);

/// Read and write access to one GitLab instance.
pub struct GitlabServer<C: RemoteCollection> {
    client: Arc<C>,
    page_size: NonZeroUsize,
    fetcher: ConcurrentFetcher,
}

impl<C: RemoteCollection> GitlabServer<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            page_size: ITEMS_PER_PAGE,
            fetcher: ConcurrentFetcher::default().with_page_timeout(Some(DEFAULT_PAGE_TIMEOUT)),
        }
    }

    pub fn from_config<P: ConfigProvider>(client: Arc<C>, config: &P) -> Self {
        Self::new(client)
            .with_page_size(NonZeroUsize::new(config.page_size()).unwrap_or(ITEMS_PER_PAGE))
            .with_fetcher(
                ConcurrentFetcher::new(config.max_in_flight())
                    .with_page_timeout(config.page_timeout()),
            )
    }

    pub fn with_page_size(mut self, page_size: NonZeroUsize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_fetcher(mut self, fetcher: ConcurrentFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn page_size(&self) -> NonZeroUsize {
        self.page_size
    }

    pub async fn project_count(&self) -> Result<usize> {
        self.client
            .count_of(ResourceKind::Projects, &ListFilters::default())
            .await
    }

    pub async fn group_count(&self) -> Result<usize> {
        self.client
            .count_of(ResourceKind::Groups, &ListFilters::default())
            .await
    }

    pub async fn user_count(&self) -> Result<usize> {
        self.client
            .count_of(ResourceKind::Users, &ListFilters::default())
            .await
    }

    /// Every non-archived project, fetched concurrently.
    pub async fn projects(&self, cancel: &CancellationToken) -> Result<FetchOutcome<Project>> {
        let filters = ListFilters {
            archived: Some(false),
            ..ListFilters::default()
        };
        self.fetch_concurrently(ResourceKind::Projects, filters, cancel)
            .await
    }

    pub async fn users(&self, cancel: &CancellationToken) -> Result<FetchOutcome<User>> {
        self.fetch_concurrently(ResourceKind::Users, ListFilters::default(), cancel)
            .await
    }

    /// Every top-level group, following the next-page cursor.
    pub async fn groups(&self, cancel: &CancellationToken) -> Result<Vec<Group>> {
        let filters = ListFilters {
            top_level_only: Some(true),
            ..ListFilters::default()
        };
        let page_size = self.page_size;
        let client = &self.client;
        let filters = &filters;

        let groups = fetch_all_sequential(
            |index| async move {
                let page = PageDescriptor {
                    index,
                    size: page_size,
                };
                client
                    .list_page::<Group>(ResourceKind::Groups, page, filters)
                    .await
            },
            cancel,
        )
        .await?;

        tracing::info!("Fetched {} groups", groups.len());
        Ok(groups)
    }

    pub async fn projects_page(&self, index: u32) -> Result<Page<Project>> {
        let filters = ListFilters {
            archived: Some(false),
            ..ListFilters::default()
        };
        self.client
            .list_page(
                ResourceKind::Projects,
                PageDescriptor {
                    index: index.max(1),
                    size: self.page_size,
                },
                &filters,
            )
            .await
    }

    pub fn top_level_groups(&self, groups: &[Group]) -> Vec<String> {
        hierarchy::top_level_groups(groups, self.client.host())
    }

    pub fn parent_group(&self, project: &Project) -> Result<String> {
        hierarchy::parent_group(project, self.client.host())
    }

    /// Most recent commit on the project's default branch.
    pub async fn latest_commit(&self, project_id: u64) -> Result<Commit> {
        let page = self
            .client
            .list_page::<Commit>(
                ResourceKind::ProjectCommits(project_id),
                PageDescriptor {
                    index: 1,
                    size: NonZeroUsize::MIN,
                },
                &ListFilters::default(),
            )
            .await?;

        page.items
            .into_iter()
            .next()
            .ok_or_else(|| InventoryError::EmptyRepository {
                project: project_id.to_string(),
            })
    }

    /// True when a project named `name` (or with path `name`) exists.
    ///
    /// GitLab's search is a substring match, so every page of candidates is
    /// walked until an exact match turns up.
    pub async fn project_exists(&self, name: &str) -> Result<bool> {
        let filters = ListFilters {
            search: Some(name.to_string()),
            ..ListFilters::default()
        };
        let page_size = self.page_size;
        let client = &self.client;
        let filters = &filters;

        let found = find_sequential(
            |index| async move {
                let page = PageDescriptor {
                    index,
                    size: page_size,
                };
                client
                    .list_page::<Project>(ResourceKind::Projects, page, filters)
                    .await
            },
            |p: &Project| p.name == name || p.path_with_namespace == name,
            &CancellationToken::new(),
        )
        .await?;

        Ok(found.is_some())
    }

    /// True when a group with the given full path (e.g. `platform/backend`) exists.
    pub async fn group_exists(&self, full_path: &str) -> Result<bool> {
        let group: Option<Group> = self
            .client
            .get_single(ResourceKind::Groups, full_path)
            .await?;
        Ok(group.is_some())
    }

    pub async fn add_project_member(
        &self,
        project_id: u64,
        user_id: u64,
        access_level: AccessLevel,
    ) -> Result<Member> {
        let request = AddMemberRequest {
            user_id,
            access_level: access_level.value(),
        };
        let member: Member = self
            .client
            .create(ResourceKind::ProjectMembers(project_id), &request)
            .await?;

        tracing::info!(
            "Added {} to project {} with access level {}",
            member.username,
            project_id,
            member.access_level
        );
        Ok(member)
    }

    pub async fn add_project_hook(&self, project_id: u64, options: &HookOptions) -> Result<Hook> {
        let hook: Hook = self
            .client
            .create(ResourceKind::ProjectHooks(project_id), options)
            .await?;

        tracing::info!("Registered hook {} on project {}", hook.url, project_id);
        Ok(hook)
    }

    async fn fetch_concurrently<T>(
        &self,
        kind: ResourceKind,
        filters: ListFilters,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let total = self.client.count_of(kind, &filters).await?;
        tracing::info!("{} reports {} items", kind, total);

        let client = Arc::clone(&self.client);
        let filters = Arc::new(filters);
        let outcome = self
            .fetcher
            .fetch_all(
                total,
                self.page_size,
                move |page| {
                    let client = Arc::clone(&client);
                    let filters = Arc::clone(&filters);
                    async move {
                        client
                            .list_page::<T>(kind, page, &filters)
                            .await
                            .map(|page| page.items)
                    }
                },
                cancel,
            )
            .await;

        tracing::info!(
            "Fetched {} of {} {} ({} failed pages)",
            outcome.items.len(),
            total,
            kind,
            outcome.failures.len()
        );
        Ok(outcome)
    }
}
