use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Anything carrying a stable numeric identity. Concurrent listings come back
/// in completion order, so callers sort by this when they need stable output.
pub trait Identity {
    fn id(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path_with_namespace: String,
    pub web_url: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    pub full_path: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    #[serde(default)]
    pub short_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub username: String,
    pub access_level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub id: u64,
    pub url: String,
    #[serde(default)]
    pub push_events: bool,
    #[serde(default)]
    pub merge_requests_events: bool,
    #[serde(default)]
    pub tag_push_events: bool,
}

/// Request body for registering a project webhook.
#[derive(Debug, Clone, Serialize)]
pub struct HookOptions {
    pub url: String,
    pub push_events: bool,
    pub merge_requests_events: bool,
    pub tag_push_events: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub enable_ssl_verification: bool,
}

impl HookOptions {
    pub fn push(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            push_events: true,
            merge_requests_events: false,
            tag_push_events: false,
            token: None,
            enable_ssl_verification: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum AccessLevel {
    Guest,
    Reporter,
    Developer,
    Maintainer,
    Owner,
}

impl AccessLevel {
    pub fn value(self) -> u32 {
        match self {
            AccessLevel::Guest => 10,
            AccessLevel::Reporter => 20,
            AccessLevel::Developer => 30,
            AccessLevel::Maintainer => 40,
            AccessLevel::Owner => 50,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddMemberRequest {
    pub user_id: u64,
    pub access_level: u32,
}

impl Identity for Project {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identity for Group {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identity for User {
    fn id(&self) -> u64 {
        self.id
    }
}

/// Remote collections addressed by the accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Projects,
    Groups,
    Users,
    ProjectCommits(u64),
    ProjectMembers(u64),
    ProjectHooks(u64),
}

impl ResourceKind {
    /// Path relative to the API root.
    pub fn path(&self) -> String {
        match self {
            ResourceKind::Projects => "projects".to_string(),
            ResourceKind::Groups => "groups".to_string(),
            ResourceKind::Users => "users".to_string(),
            ResourceKind::ProjectCommits(id) => format!("projects/{}/repository/commits", id),
            ResourceKind::ProjectMembers(id) => format!("projects/{}/members", id),
            ResourceKind::ProjectHooks(id) => format!("projects/{}/hooks", id),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// One page of a remote collection, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDescriptor {
    pub index: u32,
    pub size: NonZeroUsize,
}

/// A fetched page plus the cursor for the next one (0 when exhausted).
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: u32,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilters {
    pub archived: Option<bool>,
    pub top_level_only: Option<bool>,
    pub search: Option<String>,
}

impl ListFilters {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(archived) = self.archived {
            pairs.push(("archived", archived.to_string()));
        }
        if let Some(top_level_only) = self.top_level_only {
            pairs.push(("top_level_only", top_level_only.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }
}
