//! Announcement storage.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct AnnouncementStore {
    pool: SqlitePool,
}

/// A community announcement.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Announcement {
    pub uuid: String,
    pub author_uuid: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct AnnouncementRow {
    uuid: String,
    author_uuid: String,
    title: String,
    body: String,
    created_at: String,
}

impl From<AnnouncementRow> for Announcement {
    fn from(row: AnnouncementRow) -> Self {
        Self {
            uuid: row.uuid,
            author_uuid: row.author_uuid,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

impl AnnouncementStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new announcement.
    pub async fn create(
        &self,
        uuid: &str,
        author_uuid: &str,
        title: &str,
        body: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO announcements (uuid, author_uuid, title, body) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(author_uuid)
        .bind(title)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// List all announcements, newest first.
    pub async fn list(&self) -> Result<Vec<Announcement>, sqlx::Error> {
        let rows: Vec<AnnouncementRow> = sqlx::query_as(
            "SELECT uuid, author_uuid, title, body, created_at \
             FROM announcements ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Announcement::from).collect())
    }

    /// Delete an announcement by UUID.
    pub async fn delete_by_uuid(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM announcements WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
