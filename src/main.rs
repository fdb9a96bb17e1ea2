use clap::Parser;
use gitlab_inventory::config::cli::{Command, CountKind};
use gitlab_inventory::config::require_token;
use gitlab_inventory::core::{ConfigProvider, Identity};
use gitlab_inventory::domain::model::HookOptions;
use gitlab_inventory::utils::error::ErrorSeverity;
use gitlab_inventory::utils::{logger, validation::Validate};
use gitlab_inventory::{
    CliConfig, FetchOutcome, GitlabClient, GitlabServer, Result, TomlConfig,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting gitlab-inventory");

    let result = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            match TomlConfig::from_file(path) {
                Ok(config) => run(&config, &cli.command).await,
                Err(e) => Err(e),
            }
        }
        None => run(&cli, &cli.command).await,
    };

    if let Err(e) = result {
        tracing::error!("❌ {} (Severity: {:?})", e, e.severity());
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run<P: ConfigProvider + Validate>(config: &P, command: &Command) -> Result<()> {
    config.validate()?;

    let client = Arc::new(GitlabClient::from_config(config)?);
    tracing::debug!("API root: {}", client.api_root());
    let server = GitlabServer::from_config(client, config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding requests");
            on_interrupt.cancel();
        }
    });

    match command {
        Command::Count { kind } => {
            let count = match kind {
                CountKind::Projects => server.project_count().await?,
                CountKind::Groups => server.group_count().await?,
                CountKind::Users => server.user_count().await?,
            };
            println!("{}", count);
        }
        Command::Projects { sorted } => {
            emit_outcome(server.projects(&cancel).await?, *sorted)?;
        }
        Command::ProjectsPage { page } => {
            let page = server.projects_page(*page).await?;
            print_json(&page.items)?;
            tracing::info!("Next page: {}", page.next_page);
        }
        Command::Users { sorted } => {
            emit_outcome(server.users(&cancel).await?, *sorted)?;
        }
        Command::Groups => {
            print_json(&server.groups(&cancel).await?)?;
        }
        Command::TopLevelGroups => {
            let groups = server.groups(&cancel).await?;
            print_json(&server.top_level_groups(&groups))?;
        }
        Command::ParentGroups => {
            let outcome = server.projects(&cancel).await?;
            let mut parents = BTreeMap::new();
            for project in &outcome.items {
                match server.parent_group(project) {
                    Ok(group) => {
                        parents.insert(project.path_with_namespace.clone(), group);
                    }
                    Err(e) => tracing::warn!("Skipping project {}: {}", project.id, e),
                }
            }
            print_json(&parents)?;
            report_failures(&outcome);
            outcome.into_complete()?;
        }
        Command::LatestCommit { project_id } => {
            print_json(&server.latest_commit(*project_id).await?)?;
        }
        Command::ProjectExists { name } => {
            println!("{}", server.project_exists(name).await?);
        }
        Command::GroupExists { full_path } => {
            println!("{}", server.group_exists(full_path).await?);
        }
        Command::AddMember {
            project_id,
            user_id,
            access_level,
        } => {
            require_token(config)?;
            let member = server
                .add_project_member(*project_id, *user_id, *access_level)
                .await?;
            print_json(&member)?;
        }
        Command::AddHook {
            project_id,
            url,
            merge_requests,
            tag_push,
            secret_token,
        } => {
            require_token(config)?;
            let options = HookOptions {
                merge_requests_events: *merge_requests,
                tag_push_events: *tag_push,
                token: secret_token.clone(),
                ..HookOptions::push(url.clone())
            };
            print_json(&server.add_project_hook(*project_id, &options).await?)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_failures<T>(outcome: &FetchOutcome<T>) {
    for failure in &outcome.failures {
        tracing::error!("Page {} missing from output: {}", failure.page, failure.cause);
    }
}

/// Prints whatever was fetched, then fails if any page was lost.
fn emit_outcome<T: Serialize + Identity>(outcome: FetchOutcome<T>, sorted: bool) -> Result<()> {
    let outcome = if sorted {
        outcome.sorted_by_id()
    } else {
        outcome
    };

    print_json(&outcome.items)?;
    report_failures(&outcome);
    outcome.into_complete().map(|_| ())
}
