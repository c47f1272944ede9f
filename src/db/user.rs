use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Full user row. Internal only: carries the password hash and the stored
/// refresh credential, which must never travel past the API boundary.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    username: String,
    email: String,
    fullname: String,
    password_hash: String,
    refresh_token: Option<String>,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            username: row.username,
            email: row.email,
            fullname: row.fullname,
            password_hash: row.password_hash,
            refresh_token: row.refresh_token,
            created_at: row.created_at,
        }
    }
}

/// Public user shape for response bodies. No internal ID, no secret material.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub created_at: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            uuid: user.uuid,
            username: user.username,
            email: user.email,
            fullname: user.fullname,
            created_at: user.created_at,
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Returns the user ID.
    pub async fn create(
        &self,
        uuid: &str,
        username: &str,
        email: &str,
        fullname: &str,
        password_hash: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (uuid, username, email, fullname, password_hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(username)
        .bind(email)
        .bind(fullname)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, fullname, password_hash, refresh_token, created_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, fullname, password_hash, refresh_token, created_at
             FROM users WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by login handle: username or email, case-insensitive.
    pub async fn get_by_handle(&self, handle: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, fullname, password_hash, refresh_token, created_at
             FROM users WHERE username = ? OR email = ?",
        )
        .bind(handle)
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Whether a username or email is already taken.
    pub async fn is_handle_taken(&self, username: &str, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
                .bind(username)
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    /// Replace the stored refresh credential only if it still equals
    /// `expected`. Returns false when the slot holds something else (or
    /// nothing), which means the presented credential was already consumed
    /// or revoked.
    ///
    /// This is the single compare-and-swap the whole rotation protocol
    /// hangs on. It must stay one conditional UPDATE; a read followed by a
    /// write would let two concurrent rotations both succeed.
    pub async fn rotate_refresh_token(
        &self,
        id: i64,
        expected: &str,
        new: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ? AND refresh_token = ?")
                .bind(new)
                .bind(id)
                .bind(expected)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Unconditionally store a refresh credential (login path). A fresh
    /// login supersedes whatever session the slot held before.
    pub async fn set_refresh_token(&self, id: i64, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the stored refresh credential (logout path). Idempotent.
    pub async fn clear_refresh_token(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET refresh_token = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored password hash.
    pub async fn set_password_hash(&self, id: i64, hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
