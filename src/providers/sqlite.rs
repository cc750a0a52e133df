use std::num::NonZeroU32;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel::{ConnectionError, ConnectionResult};
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, ManagerConfig};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Mutex;

use crate::domains::message::{Message, MessageBody, Role, ToolCall};
use crate::domains::reminder::{Recurrence, RecurrenceUnit, Reminder};
use crate::error::{ReminderBotError, Result};
use crate::interfaces::providers::ConversationStore;

mod schema;
use schema::{messages, reminders};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Applied to every pooled connection. Writers wait for the lock instead of
/// failing with SQLITE_BUSY.
const CONNECTION_PRAGMAS: &str = "PRAGMA busy_timeout = 5000; PRAGMA synchronous = NORMAL;";

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Queryable)]
struct MessageRow {
    id: i32,
    user_id: String,
    role: String,
    content: Option<String>,
    tool_call_id: Option<String>,
    tool_call: Option<String>,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
struct NewMessage<'a> {
    user_id: &'a str,
    role: &'a str,
    content: Option<&'a str>,
    tool_call_id: Option<&'a str>,
    tool_call: Option<String>,
    created_at: i64,
}

#[derive(Queryable)]
struct ReminderRow {
    id: i32,
    user_id: String,
    content: String,
    reminder_at: i64,
    recurrence_frequency: Option<i32>,
    recurrence_unit: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = reminders)]
struct NewReminder<'a> {
    user_id: &'a str,
    content: &'a str,
    reminder_at: i64,
    recurrence_frequency: Option<i32>,
    recurrence_unit: Option<&'a str>,
    created_at: i64,
}

/// Messages and reminders in one SQLite file. Instants are unix milliseconds.
pub struct SqliteConversationStore {
    pool: SqlitePool,
    // SQLite has a single writer; writes from this store queue here.
    write_lock: Mutex<()>,
}

impl SqliteConversationStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let mut manager_config = ManagerConfig::default();
        manager_config.custom_setup = Box::new(establish_connection);
        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new_with_config(
            sqlite_path,
            manager_config,
        );
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
        tracing::debug!(path = sqlite_path, "sqlite conversation store ready");
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn load_messages(&self, user_id: &str) -> Result<Vec<Message>> {
        let mut conn = self.conn().await?;
        let rows: Vec<MessageRow> = messages::table
            .filter(messages::user_id.eq(user_id))
            .order(messages::id.asc())
            .load(&mut conn)
            .await
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
        rows.into_iter().map(map_message_row).collect()
    }

    async fn save_messages(&self, batch: &[Message]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let rows = batch
            .iter()
            .map(new_message_row)
            .collect::<Result<Vec<_>>>()?;

        let _write = self.write_lock.lock().await;
        let mut conn = self.conn().await?;
        conn.transaction(|conn| {
            async move {
                for row in &rows {
                    diesel::insert_into(messages::table)
                        .values(row)
                        .execute(conn)
                        .await?;
                }
                Ok::<_, diesel::result::Error>(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn save_reminder(&self, reminder: Option<&Reminder>) -> Result<()> {
        let Some(reminder) = reminder else {
            return Ok(());
        };
        let recurrence_frequency = reminder
            .recurrence
            .map(|recurrence| {
                i32::try_from(recurrence.frequency.get()).map_err(|_| {
                    ReminderBotError::Persistence(format!(
                        "recurrence frequency {} is out of range",
                        recurrence.frequency
                    ))
                })
            })
            .transpose()?;
        let new = NewReminder {
            user_id: &reminder.user_id,
            content: &reminder.content,
            reminder_at: reminder.reminder_at.timestamp_millis(),
            recurrence_frequency,
            recurrence_unit: reminder.recurrence.map(|recurrence| recurrence.unit.as_str()),
            created_at: Utc::now().timestamp_millis(),
        };

        let _write = self.write_lock.lock().await;
        let mut conn = self.conn().await?;
        diesel::insert_into(reminders::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>> {
        let mut conn = self.conn().await?;
        let rows: Vec<ReminderRow> = reminders::table
            .select((
                reminders::id,
                reminders::user_id,
                reminders::content,
                reminders::reminder_at,
                reminders::recurrence_frequency,
                reminders::recurrence_unit,
            ))
            .filter(reminders::user_id.eq(user_id))
            .order((reminders::reminder_at.asc(), reminders::id.asc()))
            .load(&mut conn)
            .await
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
        rows.into_iter().map(map_reminder_row).collect()
    }

    async fn clear_history(&self, user_id: &str) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let mut conn = self.conn().await?;
        diesel::delete(messages::table.filter(messages::user_id.eq(user_id)))
            .execute(&mut conn)
            .await
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
        Ok(())
    }
}

fn new_message_row(message: &Message) -> Result<NewMessage<'_>> {
    let tool_call = message
        .body
        .tool_call()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ReminderBotError::Serialization(e.to_string()))?;
    Ok(NewMessage {
        user_id: &message.user_id,
        role: message.role().as_str(),
        content: message.content(),
        tool_call_id: match &message.body {
            MessageBody::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        },
        tool_call,
        created_at: message.created_at.timestamp_millis(),
    })
}

fn map_message_row(row: MessageRow) -> Result<Message> {
    let role: Role = row.role.parse().map_err(|e: String| {
        ReminderBotError::Persistence(format!("message {}: {e}", row.id))
    })?;
    let body = match role {
        Role::System => MessageBody::System {
            content: row.content.unwrap_or_default(),
        },
        Role::User => MessageBody::User {
            content: row.content.unwrap_or_default(),
        },
        Role::Assistant => {
            let tool_call = row
                .tool_call
                .as_deref()
                .map(serde_json::from_str::<ToolCall>)
                .transpose()
                .map_err(|e| {
                    ReminderBotError::Persistence(format!("message {}: bad tool_call: {e}", row.id))
                })?;
            MessageBody::Assistant {
                content: row.content,
                tool_call,
            }
        }
        Role::Tool => MessageBody::Tool {
            content: row.content.unwrap_or_default(),
            tool_call_id: row.tool_call_id.ok_or_else(|| {
                ReminderBotError::Persistence(format!(
                    "message {}: tool message without tool_call_id",
                    row.id
                ))
            })?,
        },
    };
    Ok(Message {
        user_id: row.user_id,
        created_at: from_millis(row.created_at)?,
        body,
    })
}

fn map_reminder_row(row: ReminderRow) -> Result<Reminder> {
    let recurrence = match (row.recurrence_frequency, row.recurrence_unit) {
        (Some(frequency), Some(unit)) => {
            let frequency = u32::try_from(frequency)
                .ok()
                .and_then(NonZeroU32::new)
                .ok_or_else(|| {
                    ReminderBotError::Persistence(format!(
                        "reminder {}: invalid recurrence frequency {frequency}",
                        row.id
                    ))
                })?;
            let unit: RecurrenceUnit = unit.parse().map_err(|e: String| {
                ReminderBotError::Persistence(format!("reminder {}: {e}", row.id))
            })?;
            Some(Recurrence { frequency, unit })
        }
        (None, None) => None,
        _ => {
            return Err(ReminderBotError::Persistence(format!(
                "reminder {}: partial recurrence",
                row.id
            )))
        }
    };
    Ok(Reminder {
        user_id: row.user_id,
        reminder_at: from_millis(row.reminder_at)?,
        content: row.content,
        recurrence,
    })
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| ReminderBotError::Persistence(format!("invalid timestamp {millis}")))
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
    }
    Ok(())
}

fn establish_connection(url: &str) -> BoxFuture<'_, ConnectionResult<SqliteAsyncConn>> {
    async move {
        let mut conn = <SqliteAsyncConn as AsyncConnection>::establish(url).await?;
        SimpleAsyncConnection::batch_execute(&mut conn, CONNECTION_PRAGMAS)
            .await
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        Ok(conn)
    }
    .boxed()
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
        // WAL is a property of the database file and outlives this connection.
        SimpleConnection::batch_execute(&mut conn, "PRAGMA journal_mode = WAL;")
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| ReminderBotError::Persistence(e.to_string()))?;
        Ok::<_, ReminderBotError>(())
    })
    .await
    .map_err(|e| ReminderBotError::Runtime(e.to_string()))??;
    Ok(())
}
