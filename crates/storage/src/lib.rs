use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use shared::domain::{
    ActorContext, AdminChangeLog, ChangeLogId, GuestId, GuestResponse, InteractionChannel,
    InteractionLog, InteractionLogId, Settings,
};

mod connection;

pub use connection::{ReconnectPolicy, StoreConnection, StoreUnavailable};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed document store: one settings row plus three append-only collections.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct NewGuest {
    pub name: String,
    pub companions: Option<String>,
    pub party_size: i64,
    pub answers: BTreeMap<String, String>,
    pub via_voice_agent: bool,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_timeout(database_url, DEFAULT_STORE_TIMEOUT).await
    }

    /// Opens the store with every acquire and lock wait bounded by `timeout`.
    pub async fn with_timeout(database_url: &str, timeout: Duration) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn load_settings(&self) -> Result<Option<Settings>> {
        let row = sqlx::query("SELECT document FROM settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .context("failed to load settings document")?;
        row.map(|r| -> Result<Settings> {
            let document: String = r.try_get(0)?;
            serde_json::from_str(&document).context("settings document is not valid JSON")
        })
        .transpose()
    }

    /// Stores `settings` only when no document exists yet and returns whichever
    /// document ends up persisted.
    pub async fn insert_settings_if_absent(&self, settings: &Settings) -> Result<Settings> {
        self.create_settings_if_absent(settings).await?;
        self.load_settings()
            .await?
            .context("settings document missing after insert")
    }

    async fn create_settings_if_absent(&self, settings: &Settings) -> Result<()> {
        let document = serde_json::to_string(settings)?;
        sqlx::query(
            "INSERT INTO settings (id, document, updated_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(document)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to create settings document")?;
        Ok(())
    }

    /// Sets each `(field, json value)` pair inside the stored document in one
    /// statement, seeding the document from `base` when none exists. Fields not
    /// named keep whatever another writer stored in the meantime.
    pub async fn update_settings_fields(
        &self,
        base: &Settings,
        fields: &[(&str, &str)],
    ) -> Result<()> {
        self.create_settings_if_absent(base).await?;
        if fields.is_empty() {
            return Ok(());
        }

        let mut sql = String::from("UPDATE settings SET document = json_set(document");
        for _ in fields {
            sql.push_str(", ?, json(?)");
        }
        sql.push_str("), updated_at = ? WHERE id = 1");

        let mut query = sqlx::query(&sql);
        for (field, value) in fields {
            query = query.bind(format!("$.{field}")).bind(*value);
        }
        query
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("failed to update settings fields")?;
        Ok(())
    }

    pub async fn insert_guest(&self, guest: NewGuest) -> Result<GuestResponse> {
        let answers = serde_json::to_string(&guest.answers)?;
        let submitted_at = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO guests (name, companions, party_size, answers, submitted_at, via_voice_agent)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&guest.name)
        .bind(guest.companions.as_deref())
        .bind(guest.party_size)
        .bind(answers)
        .bind(submitted_at)
        .bind(guest.via_voice_agent)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert guest response")?;

        Ok(GuestResponse {
            id: GuestId(rec.try_get::<i64, _>(0)?),
            name: guest.name,
            companions: guest.companions,
            party_size: guest.party_size,
            answers: guest.answers,
            submitted_at,
            via_voice_agent: guest.via_voice_agent,
        })
    }

    pub async fn list_guests(&self) -> Result<Vec<GuestResponse>> {
        let rows = sqlx::query(
            "SELECT id, name, companions, party_size, answers, submitted_at, via_voice_agent
             FROM guests
             ORDER BY submitted_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list guest responses")?;
        rows.iter().map(guest_from_row).collect()
    }

    pub async fn count_guests(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM guests")
            .fetch_one(&self.pool)
            .await
            .context("failed to count guest responses")?;
        Ok(count)
    }

    pub async fn insert_interaction_log(
        &self,
        subject_identifier: &str,
        summary: &str,
        channel: InteractionChannel,
    ) -> Result<InteractionLog> {
        let occurred_at = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO interaction_logs (subject_identifier, summary, channel, occurred_at)
             VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(subject_identifier)
        .bind(summary)
        .bind(channel.as_str())
        .bind(occurred_at)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert interaction log")?;

        Ok(InteractionLog {
            id: InteractionLogId(rec.try_get::<i64, _>(0)?),
            subject_identifier: subject_identifier.to_string(),
            summary: summary.to_string(),
            channel,
            occurred_at,
        })
    }

    pub async fn list_interaction_logs(&self, limit: u32) -> Result<Vec<InteractionLog>> {
        let rows = sqlx::query(
            "SELECT id, subject_identifier, summary, channel, occurred_at
             FROM interaction_logs
             ORDER BY occurred_at DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to list interaction logs")?;

        rows.iter()
            .map(|r| -> Result<InteractionLog> {
                let channel: String = r.try_get(3)?;
                Ok(InteractionLog {
                    id: InteractionLogId(r.try_get(0)?),
                    subject_identifier: r.try_get(1)?,
                    summary: r.try_get(2)?,
                    channel: InteractionChannel::parse(&channel)
                        .with_context(|| format!("unknown interaction channel '{channel}'"))?,
                    occurred_at: r.try_get::<DateTime<Utc>, _>(4)?,
                })
            })
            .collect()
    }

    pub async fn insert_admin_change_log(
        &self,
        field_name: &str,
        previous_value_serialized: &str,
        new_value_serialized: &str,
        actor: &ActorContext,
    ) -> Result<AdminChangeLog> {
        let occurred_at = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO admin_change_logs (field_name, previous_value, new_value, occurred_at, user_agent, source_address)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(field_name)
        .bind(previous_value_serialized)
        .bind(new_value_serialized)
        .bind(occurred_at)
        .bind(actor.user_agent.as_deref())
        .bind(actor.source_address.as_deref())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert admin change log")?;

        Ok(AdminChangeLog {
            id: ChangeLogId(rec.try_get::<i64, _>(0)?),
            field_name: field_name.to_string(),
            previous_value_serialized: previous_value_serialized.to_string(),
            new_value_serialized: new_value_serialized.to_string(),
            occurred_at,
            actor_context: actor.clone(),
        })
    }

    pub async fn list_admin_change_logs(&self, limit: u32) -> Result<Vec<AdminChangeLog>> {
        let rows = sqlx::query(
            "SELECT id, field_name, previous_value, new_value, occurred_at, user_agent, source_address
             FROM admin_change_logs
             ORDER BY occurred_at DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to list admin change logs")?;

        rows.iter()
            .map(|r| -> Result<AdminChangeLog> {
                Ok(AdminChangeLog {
                    id: ChangeLogId(r.try_get(0)?),
                    field_name: r.try_get(1)?,
                    previous_value_serialized: r.try_get(2)?,
                    new_value_serialized: r.try_get(3)?,
                    occurred_at: r.try_get::<DateTime<Utc>, _>(4)?,
                    actor_context: ActorContext {
                        user_agent: r.try_get(5)?,
                        source_address: r.try_get(6)?,
                    },
                })
            })
            .collect()
    }
}

fn guest_from_row(r: &SqliteRow) -> Result<GuestResponse> {
    let answers: String = r.try_get(4)?;
    Ok(GuestResponse {
        id: GuestId(r.try_get(0)?),
        name: r.try_get(1)?,
        companions: r.try_get(2)?,
        party_size: r.try_get(3)?,
        answers: serde_json::from_str(&answers).context("guest answers are not valid JSON")?,
        submitted_at: r.try_get::<DateTime<Utc>, _>(5)?,
        via_voice_agent: r.try_get(6)?,
    })
}

pub fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
