//! Etu command line client
//!
//! Talks to the notes backend through the `etu-rpc` client layer and prints
//! every response as pretty JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;
use etu_rpc::{ClientConfig, ClientRegistry, Endpoint, Environment};
use etu_types::{
    CreateApiKeyRequest, CreateNoteRequest, DeleteApiKeyRequest, DeleteNoteRequest,
    GetNoteRequest, GetUserByStripeCustomerIdRequest, GetUserRequest, ListApiKeysRequest,
    ListNotesRequest, ListTagsRequest, UpdateNoteRequest, VerifyApiKeyRequest,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod stats;

/// Etu notes client
#[derive(Parser)]
#[command(name = "etu")]
#[command(version, about, long_about = None)]
#[command(after_help = "\
Examples:
  etu notes list --user u1 --tag work
  etu notes create --user u1 --tag journal \"Slept well, long walk.\"
  etu tags list --user u1
  etu keys verify etu_3f9a...
  etu stats --user u1

Environment:
  ETU_BACKEND_URL   backend host:port (default localhost:50051)
  ETU_ENV           production enables TLS
  ETU_USE_TLS       force TLS on or off
  ETU_API_KEY       service credential sent with every call
")]
struct Cli {
    /// Config file (defaults to the platform config dir, etu/config.json)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Backend address, overrides config and environment
    #[arg(long, value_name = "HOST:PORT", global = true)]
    endpoint: Option<String>,

    /// Service credential sent as `authorization` metadata
    #[arg(long, env = "ETU_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and write notes
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },

    /// Inspect tags
    Tags {
        #[command(subcommand)]
        command: TagsCommand,
    },

    /// Look up users
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Manage personal API keys
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },

    /// Note, tag and word totals for a user
    Stats {
        #[arg(long)]
        user: String,
    },
}

#[derive(Args)]
struct UserArg {
    /// Owning user id
    #[arg(long)]
    user: String,
}

#[derive(Subcommand)]
enum NotesCommand {
    /// List notes, newest first
    List {
        #[command(flatten)]
        owner: UserArg,
        /// Full-text search
        #[arg(long)]
        search: Option<String>,
        /// Only notes carrying this tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// RFC 3339 lower bound on creation time
        #[arg(long)]
        since: Option<String>,
        /// RFC 3339 upper bound on creation time
        #[arg(long)]
        until: Option<String>,
        #[arg(long)]
        limit: Option<i32>,
        #[arg(long)]
        offset: Option<i32>,
    },

    /// Show one note
    Get {
        #[command(flatten)]
        owner: UserArg,
        id: String,
    },

    /// Create a note
    Create {
        #[command(flatten)]
        owner: UserArg,
        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        content: String,
    },

    /// Change a note's content or tags
    Update {
        #[command(flatten)]
        owner: UserArg,
        id: String,
        #[arg(long)]
        content: Option<String>,
        /// Replace the note's tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Remove every tag from the note
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },

    /// Delete a note
    Delete {
        #[command(flatten)]
        owner: UserArg,
        id: String,
    },
}

#[derive(Subcommand)]
enum TagsCommand {
    /// List a user's tags with note counts
    List {
        #[command(flatten)]
        owner: UserArg,
    },
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Show a user
    User { user_id: String },

    /// Find the user for an external billing customer id
    #[command(name = "lookup-billing")]
    LookupBilling { customer_id: String },
}

#[derive(Subcommand)]
enum KeysCommand {
    /// Create a key; the raw key is printed once
    Create {
        #[command(flatten)]
        owner: UserArg,
        name: String,
    },

    /// List a user's keys
    List {
        #[command(flatten)]
        owner: UserArg,
    },

    /// Revoke a key
    Delete {
        #[command(flatten)]
        owner: UserArg,
        key_id: String,
    },

    /// Check whether a raw key is valid
    Verify { raw_key: String },
}

/// Set up logging on stderr, leaving stdout to command output.
/// Debug builds default to debug level and also log to a timestamped file.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("etu={default_level}")));

    // A macro rather than a binding: the layer's subscriber type differs per branch.
    macro_rules! stderr_layer {
        () => {
            fmt::layer().with_writer(std::io::stderr).with_target(true)
        };
    }

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("etu-{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer!().with_line_number(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(stderr_layer!())
            .with(filter)
            .init();
    }
}

fn default_config_path() -> Result<PathBuf> {
    ProjectDirs::from("", "", "etu")
        .map(|dirs| dirs.config_dir().join("config.json"))
        .context("Could not determine config directory")
}

/// File config, then environment overrides, then command line flags.
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    debug!("Loading config from {}", path.display());

    let mut config = ClientConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?
        .apply_env(|key| std::env::var(key).ok())
        .context("Invalid environment configuration")?;

    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Endpoint::parse(endpoint).context("Invalid --endpoint")?;
    }

    Ok(config)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let environment = config.environment;

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e, environment);
            ExitCode::FAILURE
        }
    }
}

/// Print a failure. Client errors are classified and sanitized for the environment.
fn report(err: &anyhow::Error, environment: Environment) {
    if let Some(rpc) = err.downcast_ref::<etu_rpc::Error>() {
        let domain = rpc.normalize();
        debug!(kind = %domain.kind(), "{rpc}");
        eprintln!("Error: {}", domain.user_message(environment));
    } else {
        eprintln!("Error: {err:#}");
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<()> {
    let api_key = cli
        .api_key
        .context("Missing API key: pass --api-key or set ETU_API_KEY")?;
    let registry = ClientRegistry::new(config);

    match cli.command {
        Commands::Notes { command } => run_notes(&registry, &api_key, command).await,
        Commands::Tags { command } => run_tags(&registry, &api_key, command).await,
        Commands::Auth { command } => run_auth(&registry, &api_key, command).await,
        Commands::Keys { command } => run_keys(&registry, &api_key, command).await,
        Commands::Stats { user } => run_stats(&registry, &api_key, user).await,
    }
}

async fn run_notes(registry: &ClientRegistry, api_key: &str, command: NotesCommand) -> Result<()> {
    let notes = registry.notes();

    match command {
        NotesCommand::List {
            owner,
            search,
            tags,
            since,
            until,
            limit,
            offset,
        } => {
            let request = ListNotesRequest {
                user_id: owner.user,
                search,
                tags,
                start_date: since,
                end_date: until,
                limit,
                offset,
            };
            print_json(&notes.list_notes(&request, api_key).await?)
        }
        NotesCommand::Get { owner, id } => {
            let request = GetNoteRequest {
                user_id: owner.user,
                id,
            };
            print_json(&notes.get_note(&request, api_key).await?)
        }
        NotesCommand::Create {
            owner,
            tags,
            content,
        } => {
            let request = CreateNoteRequest {
                user_id: owner.user,
                content,
                tags,
            };
            print_json(&notes.create_note(&request, api_key).await?)
        }
        NotesCommand::Update {
            owner,
            id,
            content,
            tags,
            clear_tags,
        } => {
            let update_tags = clear_tags || !tags.is_empty();
            let request = UpdateNoteRequest {
                user_id: owner.user,
                id,
                content,
                tags,
                update_tags,
            };
            print_json(&notes.update_note(&request, api_key).await?)
        }
        NotesCommand::Delete { owner, id } => {
            let request = DeleteNoteRequest {
                user_id: owner.user,
                id,
            };
            print_json(&notes.delete_note(&request, api_key).await?)
        }
    }
}

async fn run_tags(registry: &ClientRegistry, api_key: &str, command: TagsCommand) -> Result<()> {
    match command {
        TagsCommand::List { owner } => {
            let request = ListTagsRequest {
                user_id: owner.user,
            };
            print_json(&registry.tags().list_tags(&request, api_key).await?)
        }
    }
}

async fn run_auth(registry: &ClientRegistry, api_key: &str, command: AuthCommand) -> Result<()> {
    let auth = registry.auth();

    match command {
        AuthCommand::User { user_id } => {
            let request = GetUserRequest { user_id };
            print_json(&auth.get_user(&request, api_key).await?)
        }
        AuthCommand::LookupBilling { customer_id } => {
            let request = GetUserByStripeCustomerIdRequest {
                stripe_customer_id: customer_id,
            };
            print_json(
                &auth
                    .get_user_by_external_billing_id(&request, api_key)
                    .await?,
            )
        }
    }
}

async fn run_keys(registry: &ClientRegistry, api_key: &str, command: KeysCommand) -> Result<()> {
    let keys = registry.api_keys();

    match command {
        KeysCommand::Create { owner, name } => {
            let request = CreateApiKeyRequest {
                user_id: owner.user,
                name,
            };
            print_json(&keys.create(&request, api_key).await?)
        }
        KeysCommand::List { owner } => {
            let request = ListApiKeysRequest {
                user_id: owner.user,
            };
            print_json(&keys.list(&request, api_key).await?)
        }
        KeysCommand::Delete { owner, key_id } => {
            let request = DeleteApiKeyRequest {
                user_id: owner.user,
                key_id,
            };
            print_json(&keys.delete(&request, api_key).await?)
        }
        KeysCommand::Verify { raw_key } => {
            let request = VerifyApiKeyRequest { raw_key };
            print_json(&keys.verify(&request, api_key).await?)
        }
    }
}

async fn run_stats(registry: &ClientRegistry, api_key: &str, user: String) -> Result<()> {
    let notes_request = ListNotesRequest {
        limit: Some(stats::STATS_NOTE_LIMIT),
        offset: Some(0),
        ..ListNotesRequest::for_user(user.clone())
    };
    let tags_request = ListTagsRequest { user_id: user };

    let notes_service = registry.notes();
    let tags_service = registry.tags();
    let (notes, tags) = tokio::try_join!(
        notes_service.list_notes(&notes_request, api_key),
        tags_service.list_tags(&tags_request, api_key),
    )?;

    print_json(&stats::summarize(&notes, &tags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_notes_update() {
        let cli = Cli::try_parse_from([
            "etu", "--api-key", "k", "notes", "update", "--user", "u1", "n1", "--tag", "a",
            "--tag", "b",
        ])
        .unwrap();

        let Commands::Notes {
            command: NotesCommand::Update { owner, id, tags, clear_tags, .. },
        } = cli.command
        else {
            panic!("expected notes update");
        };
        assert_eq!(owner.user, "u1");
        assert_eq!(id, "n1");
        assert_eq!(tags, vec!["a", "b"]);
        assert!(!clear_tags);
    }

    #[test]
    fn test_clear_tags_conflicts_with_tags() {
        let result = Cli::try_parse_from([
            "etu", "notes", "update", "--user", "u1", "n1", "--tag", "a", "--clear-tags",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_flag_overrides_config() {
        let dir = std::env::temp_dir().join(format!("etu-cli-test-{}", std::process::id()));
        let cli = Cli::try_parse_from([
            "etu",
            "--config",
            dir.join("missing.json").to_str().unwrap(),
            "--endpoint",
            "notes.internal:7000",
            "tags",
            "list",
            "--user",
            "u1",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert_eq!(config.endpoint.host(), "notes.internal");
        assert_eq!(config.endpoint.port(), 7000);
    }

    #[test]
    fn test_report_accepts_wrapped_client_errors() {
        let err = anyhow::Error::new(etu_rpc::Error::Config("bad".to_string())).context("loading");
        assert!(err.downcast_ref::<etu_rpc::Error>().is_some());
        report(&err, Environment::Production);
    }
}
