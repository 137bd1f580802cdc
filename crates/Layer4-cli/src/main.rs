//! Pyrite CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use pyrite_foundation::{ConfigDir, PyriteConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pyrite - hook dispatch + ACL administration
#[derive(Parser, Debug)]
#[command(name = "pyrite")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Read config.json from this directory instead of the global/project dirs
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// SQLite database path (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create tables and seed the administrator
    Install {
        /// Administrator email (user 1)
        #[arg(long, requires = "admin_password")]
        admin_email: Option<String>,

        /// Administrator password
        #[arg(long, requires = "admin_email")]
        admin_password: Option<String>,
    },
    /// Role grants
    Role {
        #[command(subcommand)]
        command: RoleCommand,
    },
    /// User grants and role membership
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Check whether a user may perform an action
    Can {
        user: i64,
        action: String,
        object_type: Option<String>,
        object_id: Option<i64>,
    },
    /// Show audit history
    History {
        #[arg(long)]
        user: Option<i64>,

        #[arg(long)]
        object_type: Option<String>,

        #[arg(long)]
        object_id: Option<i64>,

        #[arg(long)]
        action: Option<String>,

        /// Maximum rows
        #[arg(long)]
        max: Option<u32>,

        /// Newest first
        #[arg(long)]
        desc: bool,
    },
}

/// 역할 명령
#[derive(Subcommand, Debug)]
pub enum RoleCommand {
    /// Add a grant to a role (`*` type / `0` id mean any)
    Grant {
        role: String,
        action: String,
        #[arg(default_value = "*")]
        object_type: String,
        #[arg(default_value_t = 0)]
        object_id: i64,
    },
    /// Remove a grant from a role
    Revoke {
        role: String,
        action: String,
        #[arg(default_value = "*")]
        object_type: String,
        #[arg(default_value_t = 0)]
        object_id: i64,
    },
    /// List a role's grants
    List { role: String },
}

/// 사용자 명령
#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Add a direct grant to a user
    Grant {
        user: i64,
        action: String,
        #[arg(default_value = "*")]
        object_type: String,
        #[arg(default_value_t = 0)]
        object_id: i64,
    },
    /// Remove a direct grant from a user
    Revoke {
        user: i64,
        action: String,
        #[arg(default_value = "*")]
        object_type: String,
        #[arg(default_value_t = 0)]
        object_id: i64,
    },
    /// Add a user to a role
    AddRole { user: i64, role: String },
    /// Remove a user from a role
    RemoveRole { user: i64, role: String },
    /// List a user's roles
    Roles { user: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let mut config = match &args.config_dir {
        Some(dir) => PyriteConfig::load_from(&ConfigDir::new(dir))?,
        None => PyriteConfig::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {}", e);
            PyriteConfig::new()
        }),
    };
    if let Some(db) = args.db {
        config = config.database_path(db);
    }

    let admin = cli::Admin::open(config)?;

    match args.command {
        Command::Install {
            admin_email,
            admin_password,
        } => admin.install(admin_email, admin_password).await?,
        Command::Role { command } => admin.role(command).await?,
        Command::User { command } => admin.user(command).await?,
        Command::Can {
            user,
            action,
            object_type,
            object_id,
        } => {
            admin
                .can(user, &action, object_type.as_deref(), object_id)
                .await?
        }
        Command::History {
            user,
            object_type,
            object_id,
            action,
            max,
            desc,
        } => {
            let mut query = pyrite_core::HistoryQuery::new();
            query.user_id = user;
            query.object_type = object_type;
            query.object_id = object_id;
            query.action = action;
            query.max = max;
            if desc {
                query = query.newest_first();
            }
            admin.history(&query).await?
        }
    }

    Ok(())
}
