use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct MemberStore {
    pool: SqlitePool,
}

/// Member role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Guest,
    Resident,
    Admin,
    SuperAdmin,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Guest => "guest",
            MemberRole::Resident => "resident",
            MemberRole::Admin => "admin",
            MemberRole::SuperAdmin => "super_admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "resident" => MemberRole::Resident,
            "admin" => MemberRole::Admin,
            "super_admin" => MemberRole::SuperAdmin,
            _ => MemberRole::Guest,
        }
    }

    /// Admin or super admin.
    pub fn is_admin(&self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::SuperAdmin)
    }
}

/// Verification status set at registration and mutated by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Pending,
    Approved,
    Rejected,
    Deactivated,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Approved => "approved",
            MemberStatus::Rejected => "rejected",
            MemberStatus::Deactivated => "deactivated",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "approved" => MemberStatus::Approved,
            "rejected" => MemberStatus::Rejected,
            "deactivated" => MemberStatus::Deactivated,
            _ => MemberStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    pub full_name: String,
    pub unit: Option<String>,
    pub password_hash: Option<String>,
    pub role: MemberRole,
    pub status: MemberStatus,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: i64,
    uuid: String,
    email: String,
    full_name: String,
    unit: Option<String>,
    password_hash: Option<String>,
    role: String,
    status: String,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            email: row.email,
            full_name: row.full_name,
            unit: row.unit,
            password_hash: row.password_hash,
            role: MemberRole::from_str(&row.role),
            status: MemberStatus::from_str(&row.status),
        }
    }
}

/// Public member summary for the admin console. Does not expose internal
/// database IDs or password hashes.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemberSummary {
    pub uuid: String,
    pub email: String,
    pub full_name: String,
    pub unit: Option<String>,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct MemberSummaryRow {
    uuid: String,
    email: String,
    full_name: String,
    unit: Option<String>,
    role: String,
    status: String,
    created_at: String,
}

impl From<MemberSummaryRow> for MemberSummary {
    fn from(row: MemberSummaryRow) -> Self {
        Self {
            uuid: row.uuid,
            email: row.email,
            full_name: row.full_name,
            unit: row.unit,
            role: MemberRole::from_str(&row.role),
            status: MemberStatus::from_str(&row.status),
            created_at: row.created_at,
        }
    }
}

impl MemberStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new pending resident. Returns the member ID.
    pub async fn create(
        &self,
        uuid: &str,
        email: &str,
        full_name: &str,
        unit: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO members (uuid, email, full_name, unit, password_hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(email)
        .bind(full_name)
        .bind(unit)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Create an approved super admin. Used by the bootstrap CLI flow.
    pub async fn create_admin(
        &self,
        uuid: &str,
        email: &str,
        full_name: &str,
        password_hash: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO members (uuid, email, full_name, password_hash, role, status) \
             VALUES (?, ?, ?, ?, 'super_admin', 'approved')",
        )
        .bind(uuid)
        .bind(email)
        .bind(full_name)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a member by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Member>, sqlx::Error> {
        let row: Option<MemberRow> = sqlx::query_as(
            "SELECT id, uuid, email, full_name, unit, password_hash, role, status \
             FROM members WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Member::from))
    }

    /// Get a member by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Member>, sqlx::Error> {
        let row: Option<MemberRow> = sqlx::query_as(
            "SELECT id, uuid, email, full_name, unit, password_hash, role, status \
             FROM members WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Member::from))
    }

    /// Set the verification status for a member.
    pub async fn set_status(&self, uuid: &str, status: MemberStatus) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE members SET status = ? WHERE uuid = ?")
            .bind(status.as_str())
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the role for a member.
    pub async fn set_role(&self, uuid: &str, role: MemberRole) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE members SET role = ? WHERE uuid = ?")
            .bind(role.as_str())
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all members for the admin console, pending ones included.
    pub async fn list(&self) -> Result<Vec<MemberSummary>, sqlx::Error> {
        let rows: Vec<MemberSummaryRow> = sqlx::query_as(
            "SELECT uuid, email, full_name, unit, role, status, created_at \
             FROM members ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MemberSummary::from).collect())
    }
}
