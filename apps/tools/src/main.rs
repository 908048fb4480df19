use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use server_api::{apply_patch, defaults::DEFAULT_ADMIN_PASSWORD, get_settings, ApiContext};
use shared::{domain::ActorContext, error::ApiException, protocol::SettingsPatch};
use storage::{Storage, StoreConnection};
use tracing::info;
use tracing_subscriber::EnvFilter;

const TOOLS_USER_AGENT: &str = "wedding-tools";

#[derive(Parser, Debug)]
#[command(about = "Maintenance commands for the wedding settings store")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/wedding.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current admin password, creating defaults if needed.
    ShowPassword,
    /// Set the admin password (defaults to the initial password).
    ResetPassword {
        #[arg(long, default_value = DEFAULT_ADMIN_PASSWORD)]
        password: String,
    },
    /// Print the settings document as JSON.
    ShowSettings,
    /// Create the default settings document if the store has none.
    SeedDefaults,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let ctx = ApiContext::new(Arc::new(StoreConnection::from_storage(storage)));
    println!("{}", run(&ctx, cli.command).await?);
    Ok(())
}

async fn run(ctx: &ApiContext, command: Command) -> Result<String> {
    match command {
        Command::ShowPassword => {
            let settings = get_settings(ctx).await.map_err(ApiException::from)?;
            Ok(format!("current admin password: {}", settings.admin_password))
        }
        Command::ResetPassword { password } => {
            if password.trim().is_empty() {
                return Err(anyhow!("password must not be empty"));
            }
            let actor = ActorContext {
                user_agent: Some(TOOLS_USER_AGENT.to_string()),
                source_address: None,
            };
            let changes = apply_patch(
                ctx,
                SettingsPatch {
                    admin_password: Some(password.clone()),
                    ..SettingsPatch::default()
                },
                &actor,
            )
            .await
            .map_err(ApiException::from)?;
            info!(changed = !changes.is_empty(), "admin password reset");
            if changes.is_empty() {
                Ok(format!("admin password already set to {password}"))
            } else {
                Ok(format!("admin password reset to {password}"))
            }
        }
        Command::ShowSettings => {
            let settings = get_settings(ctx).await.map_err(ApiException::from)?;
            Ok(serde_json::to_string_pretty(&settings)?)
        }
        Command::SeedDefaults => {
            let settings = get_settings(ctx).await.map_err(ApiException::from)?;
            Ok(format!(
                "settings ready: {} schedule items, {} questions, max guests {}",
                settings.schedule.len(),
                settings.questions.len(),
                settings.max_guests
            ))
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
