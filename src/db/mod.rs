mod announcement;
mod member;
mod refresh_token;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use announcement::{Announcement, AnnouncementStore};
pub use member::{Member, MemberRole, MemberStatus, MemberStore, MemberSummary};
pub use refresh_token::{RefreshTokenRecord, RefreshTokenStore, RefreshTokenSummary};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        // Each `sqlite::memory:` connection is its own empty database, so
        // the in-memory pool must never grow past one connection.
        let (url, max_connections) = if path == ":memory:" {
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{}?mode=rwc", path), 5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Members table
                "CREATE TABLE members (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    full_name TEXT NOT NULL,
                    unit TEXT,
                    password_hash TEXT,
                    role TEXT NOT NULL DEFAULT 'resident',
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_members_uuid ON members(uuid)",
                "CREATE INDEX idx_members_email ON members(email)",
                // Refresh tokens table. Rows are flipped to revoked, never deleted.
                "CREATE TABLE refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    member_uuid TEXT NOT NULL REFERENCES members(uuid) ON DELETE CASCADE,
                    token_hash TEXT NOT NULL,
                    expires_at INTEGER NOT NULL,
                    revoked INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_refresh_tokens_uuid ON refresh_tokens(uuid)",
                "CREATE INDEX idx_refresh_tokens_live ON refresh_tokens(member_uuid, revoked, expires_at)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                // Announcements table
                "CREATE TABLE announcements (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    author_uuid TEXT NOT NULL REFERENCES members(uuid) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    body TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_announcements_uuid ON announcements(uuid)",
                "CREATE INDEX idx_announcements_created_at ON announcements(created_at)",
            ],
        )
        .await
    }

    /// Get the member store.
    pub fn members(&self) -> MemberStore {
        MemberStore::new(self.pool.clone())
    }

    /// Get the refresh token store.
    pub fn refresh_tokens(&self) -> RefreshTokenStore {
        RefreshTokenStore::new(self.pool.clone())
    }

    /// Get the announcement store.
    pub fn announcements(&self) -> AnnouncementStore {
        AnnouncementStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    async fn test_member(db: &Database, email: &str) -> String {
        let uuid = uuid::Uuid::new_v4().to_string();
        db.members()
            .create(&uuid, email, "Test Member", Some("A-101"), Some("hash"))
            .await
            .unwrap();
        uuid
    }

    #[tokio::test]
    async fn test_create_and_get_member() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .members()
            .create("uuid-123", "alice@example.com", "Alice Park", Some("B-204"), Some("hash"))
            .await
            .unwrap();

        let member = db
            .members()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.id, id);
        assert_eq!(member.uuid, "uuid-123");
        assert_eq!(member.full_name, "Alice Park");
        assert_eq!(member.unit.as_deref(), Some("B-204"));
        assert_eq!(member.role, MemberRole::Resident);
        assert_eq!(member.status, MemberStatus::Pending);

        let member = db.members().get_by_uuid("uuid-123").await.unwrap().unwrap();
        assert_eq!(member.id, id);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let db = Database::open(":memory:").await.unwrap();
        test_member(&db, "Alice@Example.com").await;

        let member = db
            .members()
            .get_by_email("alice@example.com")
            .await
            .unwrap();
        assert!(member.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        test_member(&db, "alice@example.com").await;
        let result = db
            .members()
            .create("uuid-2", "ALICE@example.com", "Other Alice", None, None)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_set_status_and_role() {
        let db = Database::open(":memory:").await.unwrap();
        let uuid = test_member(&db, "alice@example.com").await;

        assert!(
            db.members()
                .set_status(&uuid, MemberStatus::Approved)
                .await
                .unwrap()
        );
        assert!(db.members().set_role(&uuid, MemberRole::Admin).await.unwrap());

        let member = db.members().get_by_uuid(&uuid).await.unwrap().unwrap();
        assert_eq!(member.status, MemberStatus::Approved);
        assert_eq!(member.role, MemberRole::Admin);

        assert!(
            !db.members()
                .set_status("no-such-uuid", MemberStatus::Approved)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_approved() {
        let db = Database::open(":memory:").await.unwrap();

        db.members()
            .create_admin("uuid-a", "admin@example.com", "Admin", "hash")
            .await
            .unwrap();

        let member = db
            .members()
            .get_by_email("admin@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.role, MemberRole::SuperAdmin);
        assert_eq!(member.status, MemberStatus::Approved);
    }

    #[tokio::test]
    async fn test_issue_and_find_live_tokens() {
        let db = Database::open(":memory:").await.unwrap();
        let member = test_member(&db, "alice@example.com").await;

        db.refresh_tokens()
            .issue("tok-1", &member, "hash-1", now_secs() + 3600)
            .await
            .unwrap();
        db.refresh_tokens()
            .issue("tok-2", &member, "hash-2", now_secs() + 3600)
            .await
            .unwrap();

        let live = db.refresh_tokens().find_live(&member).await.unwrap();
        assert_eq!(live.len(), 2);

        // Another member's tokens are not visible.
        let other = test_member(&db, "bob@example.com").await;
        assert!(db.refresh_tokens().find_live(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_tokens_are_not_live() {
        let db = Database::open(":memory:").await.unwrap();
        let member = test_member(&db, "alice@example.com").await;

        db.refresh_tokens()
            .issue("tok-1", &member, "hash-1", now_secs() - 100)
            .await
            .unwrap();

        assert!(db.refresh_tokens().find_live(&member).await.unwrap().is_empty());

        // Still present in the table, just never returned as live.
        let record = db.refresh_tokens().get_by_uuid("tok-1").await.unwrap().unwrap();
        assert!(!record.revoked);
    }

    #[tokio::test]
    async fn test_revoked_tokens_are_not_live() {
        let db = Database::open(":memory:").await.unwrap();
        let member = test_member(&db, "alice@example.com").await;

        let id = db
            .refresh_tokens()
            .issue("tok-1", &member, "hash-1", now_secs() + 3600)
            .await
            .unwrap();

        assert!(db.refresh_tokens().revoke(id).await.unwrap());
        assert!(db.refresh_tokens().find_live(&member).await.unwrap().is_empty());

        // Revoking again is fine.
        assert!(db.refresh_tokens().revoke(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_claims_a_record_once() {
        let db = Database::open(":memory:").await.unwrap();
        let member = test_member(&db, "alice@example.com").await;

        let id = db
            .refresh_tokens()
            .issue("tok-1", &member, "hash-1", now_secs() + 3600)
            .await
            .unwrap();

        assert!(db.refresh_tokens().consume(id).await.unwrap());
        assert!(!db.refresh_tokens().consume(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_all_for_member() {
        let db = Database::open(":memory:").await.unwrap();
        let member = test_member(&db, "alice@example.com").await;
        let other = test_member(&db, "bob@example.com").await;

        db.refresh_tokens()
            .issue("tok-1", &member, "hash-1", now_secs() + 3600)
            .await
            .unwrap();
        db.refresh_tokens()
            .issue("tok-2", &member, "hash-2", now_secs() + 3600)
            .await
            .unwrap();
        db.refresh_tokens()
            .issue("tok-3", &other, "hash-3", now_secs() + 3600)
            .await
            .unwrap();

        let revoked = db.refresh_tokens().revoke_all_for_member(&member).await.unwrap();
        assert_eq!(revoked, 2);

        assert!(db.refresh_tokens().find_live(&member).await.unwrap().is_empty());
        assert_eq!(db.refresh_tokens().find_live(&other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_announcements() {
        let db = Database::open(":memory:").await.unwrap();
        let member = test_member(&db, "alice@example.com").await;

        db.announcements()
            .create("ann-1", &member, "Water outage", "Tuesday 9-12")
            .await
            .unwrap();
        db.announcements()
            .create("ann-2", &member, "Elevator maintenance", "")
            .await
            .unwrap();

        let list = db.announcements().list().await.unwrap();
        assert_eq!(list.len(), 2);
        // Newest first.
        assert_eq!(list[0].uuid, "ann-2");

        assert!(db.announcements().delete_by_uuid("ann-1").await.unwrap());
        assert!(!db.announcements().delete_by_uuid("ann-1").await.unwrap());
        assert_eq!(db.announcements().list().await.unwrap().len(), 1);
    }
}
