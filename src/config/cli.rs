use crate::config::MAX_PAGE_SIZE;
use crate::core::ConfigProvider;
use crate::domain::model::AccessLevel;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "gitlab-inventory")]
#[command(about = "Enumerate projects, groups and users of a GitLab instance")]
pub struct CliConfig {
    #[arg(long, env = "GITLAB_URL", default_value = "https://gitlab.com")]
    pub url: String,

    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// TOML configuration file; replaces the connection and fetch flags
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, default_value = "100")]
    pub page_size: usize,

    /// Maximum number of page requests in flight
    #[arg(long, default_value = "8")]
    pub max_in_flight: usize,

    /// Per-page deadline in seconds, 0 disables it
    #[arg(long, default_value = "30")]
    pub page_timeout_secs: u64,

    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CountKind {
    Projects,
    Groups,
    Users,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the total number of items of a kind
    Count {
        #[arg(value_enum)]
        kind: CountKind,
    },
    /// List every non-archived project
    Projects {
        #[arg(long)]
        sorted: bool,
    },
    /// List one page of projects
    ProjectsPage {
        #[arg(default_value = "1")]
        page: u32,
    },
    /// List every user
    Users {
        #[arg(long)]
        sorted: bool,
    },
    /// List every top-level group
    Groups,
    /// Distinct top-level namespaces of all groups
    TopLevelGroups,
    /// Parent group of every project
    ParentGroups,
    /// Latest commit of a project
    LatestCommit { project_id: u64 },
    ProjectExists { name: String },
    GroupExists { full_path: String },
    /// Add a user to a project
    AddMember {
        project_id: u64,
        user_id: u64,
        #[arg(long, value_enum, default_value = "developer")]
        access_level: AccessLevel,
    },
    /// Register a webhook on a project
    AddHook {
        project_id: u64,
        url: String,
        #[arg(long)]
        merge_requests: bool,
        #[arg(long)]
        tag_push: bool,
        #[arg(long)]
        secret_token: Option<String>,
    },
}

impl ConfigProvider for CliConfig {
    fn base_url(&self) -> &str {
        &self.url
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    fn page_timeout(&self) -> Option<Duration> {
        (self.page_timeout_secs > 0).then(|| Duration::from_secs(self.page_timeout_secs))
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("--url", &self.url)?;
        validation::validate_range("--page-size", self.page_size, 1, MAX_PAGE_SIZE)?;
        validation::validate_positive_number("--max-in-flight", self.max_in_flight, 1)?;
        validation::validate_positive_number(
            "--request-timeout-secs",
            self.request_timeout_secs as usize,
            1,
        )?;
        if let Some(token) = &self.token {
            validation::validate_non_empty_string("--token", token)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["gitlab-inventory", "--url", "https://gitlab.example.com", "groups"]);

        assert_eq!(config.page_size(), 100);
        assert_eq!(config.max_in_flight(), 8);
        assert_eq!(config.page_timeout(), Some(Duration::from_secs(30)));
        assert!(matches!(config.command, Command::Groups));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_page_timeout_disables_deadline() {
        let config = parse(&[
            "gitlab-inventory",
            "--page-timeout-secs",
            "0",
            "projects",
            "--sorted",
        ]);

        assert_eq!(config.page_timeout(), None);
        assert!(matches!(config.command, Command::Projects { sorted: true }));
    }

    #[test]
    fn test_rejects_oversized_page() {
        let config = parse(&["gitlab-inventory", "--page-size", "500", "users"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_add_member_access_level() {
        let config = parse(&[
            "gitlab-inventory",
            "add-member",
            "12",
            "34",
            "--access-level",
            "maintainer",
        ]);

        match config.command {
            Command::AddMember {
                project_id,
                user_id,
                access_level,
            } => {
                assert_eq!((project_id, user_id), (12, 34));
                assert_eq!(access_level, AccessLevel::Maintainer);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
