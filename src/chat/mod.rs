//! Conversation Store: each user's single chat thread and its messages.

mod schema;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::db::{checkout, from_ts, open_pool, to_ts, SqlitePool, SqlitePooledConn};
use crate::domains::chat::{Chat, ChatMessage, Role};
use crate::error::{AssistantError, Result};

use schema::{chat_messages, chats};

pub const DEFAULT_CHAT_TITLE: &str = "Calendar assistant";

#[derive(Queryable)]
struct ChatRow {
    id: i32,
    owner_id: i32,
    title: String,
    created_at: i64,
    updated_at: i64,
}

#[derive(Queryable)]
struct MessageRow {
    id: i32,
    chat_id: i32,
    role: String,
    content: String,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = chats)]
struct NewChat<'a> {
    owner_id: i32,
    title: &'a str,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = chat_messages)]
struct NewMessage<'a> {
    chat_id: i32,
    role: &'a str,
    content: &'a str,
    created_at: i64,
}

pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let pool = open_pool(sqlite_path.as_ref()).await?;
        Ok(Self { pool })
    }

    /// Returns the owner's chat, creating it with `title` on first use.
    pub async fn get_or_create_chat(
        &self,
        owner_id: i32,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Chat> {
        let mut conn = self.conn().await?;
        let new_chat = NewChat {
            owner_id,
            title,
            created_at: to_ts(now),
            updated_at: to_ts(now),
        };
        diesel::insert_or_ignore_into(chats::table)
            .values(&new_chat)
            .execute(&mut conn)
            .await?;
        let row: ChatRow = chats::table
            .filter(chats::owner_id.eq(owner_id))
            .first(&mut conn)
            .await?;
        Ok(map_chat(row))
    }

    pub async fn get_chat(&self, owner_id: i32, chat_id: i32) -> Result<Option<Chat>> {
        let mut conn = self.conn().await?;
        let row: Option<ChatRow> = chats::table
            .filter(chats::owner_id.eq(owner_id))
            .filter(chats::id.eq(chat_id))
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(map_chat))
    }

    /// Writes a user turn and the assistant's answer together. Either both
    /// rows are committed or neither is.
    pub async fn append_exchange(
        &self,
        chat_id: i32,
        user_content: &str,
        assistant_content: &str,
        now: DateTime<Utc>,
    ) -> Result<(ChatMessage, ChatMessage)> {
        let ts = to_ts(now);
        let rows = [
            NewMessage {
                chat_id,
                role: Role::User.as_str(),
                content: user_content,
                created_at: ts,
            },
            NewMessage {
                chat_id,
                role: Role::Assistant.as_str(),
                content: assistant_content,
                created_at: ts,
            },
        ];

        let mut conn = self.conn().await?;
        let mut inserted: Vec<MessageRow> = conn
            .transaction::<_, AssistantError, _>(|conn| {
                async move {
                    let touched = diesel::update(chats::table.filter(chats::id.eq(chat_id)))
                        .set(chats::updated_at.eq(ts))
                        .execute(conn)
                        .await?;
                    if touched == 0 {
                        return Err(AssistantError::NotFound(format!("chat {chat_id}")));
                    }
                    for row in &rows {
                        diesel::insert_into(chat_messages::table)
                            .values(row)
                            .execute(conn)
                            .await?;
                    }
                    let latest: Vec<MessageRow> = chat_messages::table
                        .filter(chat_messages::chat_id.eq(chat_id))
                        .order(chat_messages::id.desc())
                        .limit(2)
                        .load(conn)
                        .await?;
                    Ok(latest)
                }
                .scope_boxed()
            })
            .await?;
        inserted.reverse();

        let mut messages = inserted
            .into_iter()
            .map(map_message)
            .collect::<Result<Vec<_>>>()?;
        let assistant = messages
            .pop()
            .ok_or_else(|| AssistantError::Database("assistant message missing".to_string()))?;
        let user = messages
            .pop()
            .ok_or_else(|| AssistantError::Database("user message missing".to_string()))?;
        Ok((user, assistant))
    }

    /// The newest `limit` messages in chronological order.
    pub async fn latest_messages(&self, chat_id: i32, limit: usize) -> Result<Vec<ChatMessage>> {
        self.list_messages(chat_id, limit, None).await
    }

    /// A page of up to `limit` messages older than `before_id` (or the newest
    /// page when `None`), in chronological order.
    pub async fn list_messages(
        &self,
        chat_id: i32,
        limit: usize,
        before_id: Option<i32>,
    ) -> Result<Vec<ChatMessage>> {
        let mut conn = self.conn().await?;
        let mut query = chat_messages::table
            .filter(chat_messages::chat_id.eq(chat_id))
            .into_boxed();
        if let Some(before) = before_id {
            query = query.filter(chat_messages::id.lt(before));
        }
        let mut rows: Vec<MessageRow> = query
            .order(chat_messages::id.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .await?;
        rows.reverse();
        rows.into_iter().map(map_message).collect()
    }

    /// Case-insensitive substring search over the owner's messages, newest
    /// first.
    pub async fn search_messages(
        &self,
        owner_id: i32,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let rows: Vec<MessageRow> = chat_messages::table
            .inner_join(chats::table.on(chats::id.eq(chat_messages::chat_id)))
            .filter(chats::owner_id.eq(owner_id))
            .select((
                chat_messages::id,
                chat_messages::chat_id,
                chat_messages::role,
                chat_messages::content,
                chat_messages::created_at,
            ))
            .order(chat_messages::id.desc())
            .load(&mut conn)
            .await?;
        rows.into_iter()
            .filter(|row| row.content.to_lowercase().contains(&needle))
            .take(limit)
            .map(map_message)
            .collect()
    }

    pub async fn update_chat_title(
        &self,
        owner_id: i32,
        chat_id: i32,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Chat> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AssistantError::Validation("chat title is required".to_string()));
        }
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            chats::table
                .filter(chats::owner_id.eq(owner_id))
                .filter(chats::id.eq(chat_id)),
        )
        .set((chats::title.eq(title), chats::updated_at.eq(to_ts(now))))
        .execute(&mut conn)
        .await?;
        drop(conn);
        if updated == 0 {
            return Err(AssistantError::NotFound(format!("chat {chat_id}")));
        }
        self.get_chat(owner_id, chat_id)
            .await?
            .ok_or_else(|| AssistantError::NotFound(format!("chat {chat_id}")))
    }

    /// Removes the chat and all of its messages.
    pub async fn delete_chat(&self, owner_id: i32, chat_id: i32) -> Result<bool> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, AssistantError, _>(|conn| {
            async move {
                let owned: Option<i32> = chats::table
                    .filter(chats::owner_id.eq(owner_id))
                    .filter(chats::id.eq(chat_id))
                    .select(chats::id)
                    .first(conn)
                    .await
                    .optional()?;
                if owned.is_none() {
                    return Ok(false);
                }
                diesel::delete(chat_messages::table.filter(chat_messages::chat_id.eq(chat_id)))
                    .execute(conn)
                    .await?;
                diesel::delete(chats::table.filter(chats::id.eq(chat_id)))
                    .execute(conn)
                    .await?;
                Ok(true)
            }
            .scope_boxed()
        })
        .await
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        checkout(&self.pool).await
    }
}

fn map_chat(row: ChatRow) -> Chat {
    Chat {
        id: row.id,
        owner_id: row.owner_id,
        title: row.title,
        created_at: from_ts(row.created_at),
        updated_at: from_ts(row.updated_at),
    }
}

fn map_message(row: MessageRow) -> Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.id,
        chat_id: row.chat_id,
        role: row.role.parse()?,
        content: row.content,
        created_at: from_ts(row.created_at),
    })
}
