//! Emporium CLI - migrations, user bootstrap and catalog maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending database migrations
//! emp-cli migrate
//!
//! # Create the first super admin
//! EMP_USER_PASSWORD=... emp-cli user create -e owner@shop.test -n "Shop Owner" -r super_admin
//!
//! # Load demo categories, products and storefront content
//! emp-cli seed
//!
//! # Rebuild the Elasticsearch product index
//! emp-cli search reindex
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use emporium_core::Role;

mod commands;

#[derive(Parser)]
#[command(name = "emp-cli")]
#[command(author, version, about = "Emporium CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Insert demo catalog and storefront content (safe to re-run)
    Seed,
    /// Manage the product search index
    Search {
        #[command(subcommand)]
        action: SearchAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create an account with any role
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`super_admin`, `admin`, `content_manager`, `moderator`, `support`, `partner`, `user`)
        #[arg(short, long, default_value = "admin", value_parser = parse_role)]
        role: Role,

        /// Initial password
        #[arg(short, long, env = "EMP_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SearchAction {
    /// Push every active product into the index
    Reindex,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emp_cli=info,emporium_api=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let ctx = commands::Context::load().await?;
    match cli.command {
        Commands::Migrate => commands::migrate::run(&ctx).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                password,
            } => {
                commands::users::create(&ctx, &email, &name, role, &password).await?;
            }
        },
        Commands::Seed => commands::seed::run(&ctx).await?,
        Commands::Search { action } => match action {
            SearchAction::Reindex => commands::search::reindex(&ctx).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_role_argument() {
        assert_eq!(parse_role("super_admin"), Ok(Role::SuperAdmin));
        assert!(parse_role("owner").is_err());
    }
}
