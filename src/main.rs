use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use canvass::auth::PasswordHasher;
use canvass::captcha::CaptchaVerifier;
use canvass::config::ServerConfig;
use canvass::mail::LogMailer;
use canvass::server::{AppState, create_router};
use canvass::share::TokenSigner;
use canvass::store::{SqliteStore, Store};
use canvass::types::User;

const SIGNING_KEY_BYTES: usize = 32;

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "canvass")]
#[command(about = "A survey server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database and signing key
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Public base URL for external access (e.g., "https://surveys.example.com").
        /// Used for share links and links embedded in emails.
        #[arg(long)]
        public_base_url: Option<String>,

        /// Cloudflare Turnstile secret for bot verification of anonymous
        /// submissions. Falls back to $CANVASS_TURNSTILE_SECRET.
        #[arg(long)]
        turnstile_secret: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and signing key)
    Init {
        /// Data directory for the database and signing key
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

fn run_init(data_dir: String, non_interactive: bool) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let db_path = data_path.join("canvass.db");
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    let key_file = data_path.join(".signing_key");

    if key_file.exists() {
        bail!(
            "Server already initialized. Signing key exists at: {}",
            key_file.display()
        );
    }

    let mut key = [0u8; SIGNING_KEY_BYTES];
    rand::thread_rng().fill(&mut key);
    fs::write(&key_file, hex::encode(key))?;

    #[cfg(unix)]
    set_restrictive_permissions(&key_file);

    println!();
    println!("========================================");
    println!("Initialized {}", data_path.display());
    println!();
    println!("Signing key written to: {}", key_file.display());
    println!("Share links and account tokens are bound to this key; back it up.");
    println!("========================================");
    println!();

    if !non_interactive {
        create_first_account_prompt(&store)?;
    }

    Ok(())
}

fn create_first_account_prompt(store: &SqliteStore) -> anyhow::Result<()> {
    let create_account = inquire::Confirm::new("Would you like to create the first account?")
        .with_default(false)
        .prompt()?;

    if !create_account {
        return Ok(());
    }

    let username = inquire::Text::new("Username:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Username cannot be empty".into())
            } else if input.contains(char::is_whitespace) {
                Err("Username cannot contain whitespace".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let email = inquire::Text::new("Email:")
        .with_validator(|input: &str| {
            if input.contains('@') {
                Ok(inquire::validator::Validation::Valid)
            } else {
                Err("Enter a valid email address".into())
            }
        })
        .prompt()?;

    let password = inquire::Password::new("Password:").prompt()?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: username.clone(),
        email,
        password_hash: PasswordHasher::new().hash(&password)?,
        // Accounts created at the console skip email activation
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&user)?;

    println!();
    println!("Created account '{username}'. Log in through the API to get started.");
    println!();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("canvass=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => {
                run_init(data_dir, non_interactive)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            public_base_url,
            turnstile_secret,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                public_base_url,
                turnstile_secret: turnstile_secret
                    .or_else(|| std::env::var("CANVASS_TURNSTILE_SECRET").ok()),
            };

            let key_file = config.signing_key_path();
            if !key_file.exists() {
                bail!(
                    "Server not initialized. Run 'canvass admin init' first to create the database and signing key."
                );
            }
            let key = hex::decode(fs::read_to_string(&key_file)?.trim())
                .map_err(|_| anyhow::anyhow!("Corrupt signing key at {}", key_file.display()))?;

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;

            let backfilled = store.backfill_creator_owner_rows()?;
            if backfilled > 0 {
                info!("Backfilled {} creator owner rows", backfilled);
            }

            let captcha = match config.turnstile_secret.clone() {
                Some(secret) => CaptchaVerifier::turnstile(secret),
                None => {
                    warn!(
                        "No Turnstile secret configured; anonymous submissions skip bot verification"
                    );
                    CaptchaVerifier::Static { allow: true }
                }
            };

            let state = Arc::new(AppState::new(
                Arc::new(store),
                TokenSigner::new(key),
                captcha,
                Arc::new(LogMailer),
                config.public_base_url.clone(),
            ));

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;
        }
    }

    Ok(())
}
