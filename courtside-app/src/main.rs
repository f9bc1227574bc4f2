use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use courtside_client::{http_stack, ClientConfig, ConnectionError, HttpRemote, Mutations, Queries, ViewerContext};
use courtside_common::non_api_structs::{find_entry, DirectoryFilter};
use courtside_common::{Action, Direction, UserId};

/// Browse the athlete network and manage connections.
#[derive(Parser, Debug)]
#[command(name = "courtside-app", version, about)]
struct Cli {
    /// JSON client config; the environment is used when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bearer token sent with every request.
    #[arg(long, global = true, env = "COURTSIDE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Id of the signed-in user.
    viewer: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// List users and your relationship to each.
    Network {
        /// Matches name, role, location or skills.
        filter: Vec<String>,
    },
    /// List requests waiting on one side.
    Pending {
        #[arg(value_enum, default_value_t = Direction::Incoming)]
        direction: Direction,
    },
    /// Count your connections by role.
    Summary,
    /// Connect, cancel, accept, reject or remove.
    Act {
        #[arg(value_enum)]
        action: Action,
        user: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::from_env(),
    };
    let mut viewer = ViewerContext::new(UserId(cli.viewer));
    if let Some(token) = cli.token {
        viewer = viewer.with_token(token);
    }

    let (queries, mutations) = http_stack(&config)?;
    if let Err(err) = run(&queries, &mutations, &viewer, &config, cli.command).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    queries: &Queries<HttpRemote>,
    mutations: &Mutations<HttpRemote>,
    viewer: &ViewerContext,
    config: &ClientConfig,
    command: Command,
) -> std::result::Result<(), ConnectionError> {
    match command {
        Command::Network { filter } => {
            let entries = queries.directory(viewer).fetch().await?;
            let filter = DirectoryFilter::new(filter.join(" "));
            let shown = filter.apply(&entries);
            if shown.is_empty() {
                println!("No users found.");
            }
            for entry in shown {
                let user = &entry.user;
                let actions: Vec<_> = entry.relationship.available_actions().iter().map(Action::as_str).collect();
                println!(
                    "{:>6}  {:<24} {:<20} {:<16} {:>4} connections  [{}]  {}  <{}>",
                    user.id.0,
                    user.name,
                    user.role,
                    user.location,
                    user.connections,
                    entry.relationship,
                    actions.join("/"),
                    user.avatar.resolve(&config.asset_base_url).0,
                );
            }
        }
        Command::Pending { direction } => {
            let requests = queries.pending(viewer, direction).fetch().await?;
            println!("{} {direction} request(s)", requests.len());
            for r in requests.iter() {
                println!(
                    "{:>6}  {:<24} {:<20} {} mutual  {}",
                    r.requester_id.0, r.name, r.role, r.mutual_connections, r.request_date
                );
            }
        }
        Command::Summary => {
            let summary = queries.directory(viewer).summary().await?;
            println!(
                "total {}  athletes {}  coaches {}  other {}",
                summary.total, summary.athletes, summary.coaches, summary.other
            );
        }
        Command::Act { action, user } => {
            let user = UserId(user);
            let entries = queries.directory(viewer).fetch().await?;
            let entry = find_entry(&entries, user)
                .ok_or_else(|| ConnectionError::NotFound(format!("user {user} is not in your directory")))?;
            let outcome = mutations.perform(viewer, entry, action).await?;
            tracing::debug!(?outcome, "done");
            println!("{action} {user}: ok");
        }
    }
    Ok(())
}
