//! Refresh token persistence.
//!
//! Only refresh tokens are stored, and only as bcrypt hashes of the raw
//! value. A record is dead once `revoked` is set or `expires_at` passes;
//! rows are never deleted here. Because the at-rest hash is salted, there
//! is no lookup by token value: callers fetch a subject's live records and
//! run the hash compare against each one.

use sqlx::sqlite::SqlitePool;

/// A stored refresh token record.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub uuid: String,
    pub member_uuid: String,
    pub token_hash: String,
    /// Unix timestamp (seconds).
    pub expires_at: i64,
    pub revoked: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: i64,
    uuid: String,
    member_uuid: String,
    token_hash: String,
    expires_at: i64,
    revoked: i32,
    created_at: String,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            member_uuid: row.member_uuid,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            revoked: row.revoked != 0,
            created_at: row.created_at,
        }
    }
}

/// Session summary for listing a member's active sessions. Does not expose
/// internal IDs or the stored hash.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RefreshTokenSummary {
    pub uuid: String,
    pub created_at: String,
    pub expires_at: i64,
}

impl From<RefreshTokenRecord> for RefreshTokenSummary {
    fn from(record: RefreshTokenRecord) -> Self {
        Self {
            uuid: record.uuid,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

/// Store for managing refresh token records.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new live record. Returns the row ID.
    pub async fn issue(
        &self,
        uuid: &str,
        member_uuid: &str,
        token_hash: &str,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (uuid, member_uuid, token_hash, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(member_uuid)
        .bind(token_hash)
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All records for a member that are neither revoked nor expired,
    /// newest first.
    pub async fn find_live(&self, member_uuid: &str) -> Result<Vec<RefreshTokenRecord>, sqlx::Error> {
        let rows: Vec<RefreshTokenRow> = sqlx::query_as(
            "SELECT id, uuid, member_uuid, token_hash, expires_at, revoked, created_at \
             FROM refresh_tokens \
             WHERE member_uuid = ? AND revoked = 0 \
               AND expires_at > CAST(strftime('%s', 'now') AS INTEGER) \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(member_uuid)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RefreshTokenRecord::from).collect())
    }

    /// Get a record by its public UUID, live or not.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            "SELECT id, uuid, member_uuid, token_hash, expires_at, revoked, created_at \
             FROM refresh_tokens WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefreshTokenRecord::from))
    }

    /// Set `revoked` on a record. Idempotent.
    pub async fn revoke(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Claim a record for single use. The conditional update only succeeds
    /// for the first caller; concurrent racers on the same record see
    /// `false` and must treat the rotation as failed.
    pub async fn consume(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every live record for a member (logout everywhere,
    /// deactivation). Returns the number of records revoked.
    pub async fn revoke_all_for_member(&self, member_uuid: &str) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE member_uuid = ? AND revoked = 0")
                .bind(member_uuid)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
