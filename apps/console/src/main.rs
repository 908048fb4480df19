use std::{collections::BTreeMap, fmt::Write as _, time::Duration};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client_core::{rsvp_totals, StateClient, StatePoller};
use shared::protocol::{AggregateView, RsvpInput, SettingsPatch};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Console view of the wedding site state")]
struct Args {
    #[arg(long, env = "WEDDING_SERVER_URL", default_value = "http://localhost:3001")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print settings, totals and the latest responses once.
    Show,
    /// Re-print the summary whenever the polled state changes.
    Watch {
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
    /// Submit an RSVP the way the site form does.
    Rsvp {
        #[arg(long)]
        name: String,
        #[arg(long)]
        party_size: Option<i64>,
        #[arg(long = "with")]
        companions: Option<String>,
        /// Answer as `field=value`; the field may be a question id or label.
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<(String, String)>,
    },
    /// Flip the RSVP open flag.
    ToggleRsvp,
    /// Print the server's store connectivity.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let args = Args::parse();
    let client = StateClient::new(&args.server_url)?;

    match args.command {
        Command::Show => {
            let view = client.get_state().await?;
            print!("{}", render_summary(&view));
        }
        Command::Watch { interval_secs } => watch(client, interval_secs).await?,
        Command::Rsvp {
            name,
            party_size,
            companions,
            answers,
        } => {
            client
                .submit_rsvp(RsvpInput {
                    name: name.clone(),
                    companions,
                    party_size,
                    answers: answers.into_iter().collect::<BTreeMap<_, _>>(),
                })
                .await?;
            println!("RSVP recorded for {name}");
        }
        Command::ToggleRsvp => {
            let view = client.get_state().await?;
            if view.degraded {
                return Err(anyhow!("server is serving fallback state; not toggling"));
            }
            let open = !view.settings.rsvp_open;
            client
                .update_settings(SettingsPatch {
                    rsvp_open: Some(open),
                    ..SettingsPatch::default()
                })
                .await?;
            println!("RSVPs are now {}", if open { "open" } else { "closed" });
        }
        Command::Health => {
            let health = client.health().await?;
            println!(
                "{} (store connected: {}, at {})",
                health.status, health.db_connected, health.timestamp
            );
        }
    }

    Ok(())
}

async fn watch(client: StateClient, interval_secs: u64) -> Result<()> {
    let poller = StatePoller::new(client);
    let mut updates = poller.subscribe();
    let task = poller.spawn(Duration::from_secs(interval_secs.max(1)));

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    warn!("state poller stopped");
                    break;
                }
                if let Some(view) = updates.borrow_and_update().clone() {
                    print!("{}", render_summary(&view));
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    task.abort();
    Ok(())
}

fn parse_answer(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((field.to_string(), value.trim().to_string()))
}

fn render_summary(view: &AggregateView) -> String {
    let totals = rsvp_totals(view);
    let mut out = String::new();
    if view.degraded {
        let _ = writeln!(out, "!! store unavailable, showing fallback state");
    }
    let _ = writeln!(
        out,
        "RSVPs {} | {} / {} guests ({} responses, {} places left)",
        if view.settings.rsvp_open { "open" } else { "closed" },
        totals.guests,
        totals.capacity,
        totals.responses,
        totals.remaining
    );
    for guest in view.responses.iter().take(10) {
        let via = if guest.via_voice_agent { " [voice]" } else { "" };
        match &guest.companions {
            Some(with) => {
                let _ = writeln!(out, "  {} x{} with {}{}", guest.name, guest.party_size, with, via);
            }
            None => {
                let _ = writeln!(out, "  {} x{}{}", guest.name, guest.party_size, via);
            }
        }
    }
    if let Some(log) = view.interaction_logs.first() {
        let _ = writeln!(out, "last interaction: {} ({})", log.summary, log.channel.as_str());
    }
    out
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
