//! User Storage
//! Mission: Persist users, roles and role rights with SQLite

use crate::auth::models::{NewUser, Role, RoleId, RoleRight, User, UserId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Storage collaborator consulted by login and the RBAC decision procedure
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// User with its role and the role's rights resolved in one read
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>>;

    async fn find_role_rights_by_section_and_route(
        &self,
        role_id: RoleId,
        section: &str,
        route: &str,
    ) -> Result<Option<RoleRight>>;

    async fn role_exists(&self, role_id: RoleId) -> Result<bool>;

    async fn update_user(&self, user: &User) -> Result<()>;

    async fn list_users(&self) -> Result<Vec<User>>;

    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Returns false when no such user existed
    async fn delete_user(&self, id: UserId) -> Result<bool>;
}

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    created_at TEXT NOT NULL
);

-- At most one row per (role, section, route)
CREATE TABLE IF NOT EXISTS role_rights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    section TEXT NOT NULL,
    route TEXT NOT NULL,
    r_create INTEGER NOT NULL DEFAULT 0,
    r_read INTEGER NOT NULL DEFAULT 0,
    r_update INTEGER NOT NULL DEFAULT 0,
    r_delete INTEGER NOT NULL DEFAULT 0,
    UNIQUE (role_id, section, route)
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT UNIQUE NOT NULL,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role_id INTEGER NOT NULL REFERENCES roles(id),
    last_access TEXT,
    created_at TEXT NOT NULL
);
"#;

const USER_COLUMNS: &str = "u.id, u.email, u.name, u.password_hash, u.role_id, r.name, u.last_access, u.created_at
     FROM users u JOIN roles r ON r.id = u.role_id";

/// SQLite-backed user store
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    /// Open (or create) the database and apply the schema. `:memory:` works for tests.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open auth database at {}", db_path))?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize auth schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a role if it does not exist yet, returning its id
    pub fn create_role(&self, name: &str) -> Result<RoleId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO roles (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )
        .context("Failed to insert role")?;

        let id: i64 = conn
            .query_row("SELECT id FROM roles WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .context("Failed to read role id")?;
        Ok(RoleId(id))
    }

    /// Grant (or replace) a role's rights for one (section, route)
    pub fn grant_right(&self, role_id: RoleId, right: &RoleRight) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO role_rights (role_id, section, route, r_create, r_read, r_update, r_delete)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (role_id, section, route) DO UPDATE SET
                r_create = excluded.r_create,
                r_read = excluded.r_read,
                r_update = excluded.r_update,
                r_delete = excluded.r_delete",
            params![
                role_id.0,
                right.section,
                right.route,
                right.can_create,
                right.can_read,
                right.can_update,
                right.can_delete,
            ],
        )
        .context("Failed to upsert role right")?;
        Ok(())
    }

    /// First-start bootstrap: an `admin` role with full rights on `routes`
    /// in `section`, and an admin user if no user holds that role yet.
    pub fn ensure_default_admin(
        &self,
        email: &str,
        password_hash: &str,
        section: &str,
        routes: &[String],
    ) -> Result<bool> {
        let role_id = self.create_role("admin")?;
        for route in routes {
            self.grant_right(role_id, &RoleRight::full(section, route))?;
        }

        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE role_id = ?1",
                params![role_id.0],
                |row| row.get(0),
            )
            .context("Failed to check for admin users")?;

        if count > 0 {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO users (email, name, password_hash, role_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![email, "Administrator", password_hash, role_id.0, Utc::now().to_rfc3339()],
        )
        .context("Failed to insert admin user")?;

        info!("🔐 Default admin user created ({})", email);
        Ok(true)
    }

    /// Run `op` against the connection on the blocking pool, so lock waits and
    /// SQLite I/O stay off the runtime workers
    async fn blocking<T, F>(&self, op_name: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || op(&conn.lock()))
            .await
            .with_context(|| format!("{} task panicked", op_name))?
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn load_user(conn: &Connection, filter: &str, param: &dyn rusqlite::ToSql) -> Result<Option<User>> {
        let sql = format!("SELECT {} WHERE {}", USER_COLUMNS, filter);
        let row = conn
            .query_row(&sql, [param], user_row)
            .optional()
            .context("Failed to query user")?;

        match row {
            Some((mut user, role_id)) => {
                user.role.rights = load_rights(conn, role_id)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}

/// User row without rights, plus the role id to load them with
fn user_row(row: &Row<'_>) -> rusqlite::Result<(User, RoleId)> {
    let role_id = RoleId(row.get(4)?);
    let last_access: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;

    let user = User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role {
            id: role_id,
            name: row.get(5)?,
            rights: Vec::new(),
        },
        last_access: last_access.map(|s| parse_timestamp(6, &s)).transpose()?,
        created_at: parse_timestamp(7, &created_at)?,
    };
    Ok((user, role_id))
}

/// Rights in insertion order; consumers take the first match
fn load_rights(conn: &Connection, role_id: RoleId) -> Result<Vec<RoleRight>> {
    let mut stmt = conn.prepare_cached(
        "SELECT section, route, r_create, r_read, r_update, r_delete
         FROM role_rights WHERE role_id = ?1 ORDER BY id",
    )?;
    let rights = stmt
        .query_map(params![role_id.0], right_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to load role rights")?;
    Ok(rights)
}

fn right_row(row: &Row<'_>) -> rusqlite::Result<RoleRight> {
    Ok(RoleRight {
        section: row.get(0)?,
        route: row.get(1)?,
        can_create: row.get::<_, i64>(2)? == 1,
        can_read: row.get::<_, i64>(3)? == 1,
        can_update: row.get::<_, i64>(4)? == 1,
        can_delete: row.get::<_, i64>(5)? == 1,
    })
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.blocking("find_user_by_email", move |conn| {
            Self::load_user(conn, "u.email = ?1", &email)
        })
        .await
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>> {
        self.blocking("find_user_by_id", move |conn| {
            Self::load_user(conn, "u.id = ?1", &id.0)
        })
        .await
    }

    async fn find_role_rights_by_section_and_route(
        &self,
        role_id: RoleId,
        section: &str,
        route: &str,
    ) -> Result<Option<RoleRight>> {
        let (section, route) = (section.to_string(), route.to_string());
        self.blocking("find_role_rights_by_section_and_route", move |conn| {
            conn.query_row(
                "SELECT section, route, r_create, r_read, r_update, r_delete
                 FROM role_rights WHERE role_id = ?1 AND section = ?2 AND route = ?3
                 ORDER BY id LIMIT 1",
                params![role_id.0, section, route],
                right_row,
            )
            .optional()
            .context("Failed to query role rights")
        })
        .await
    }

    async fn role_exists(&self, role_id: RoleId) -> Result<bool> {
        self.blocking("role_exists", move |conn| {
            let found: Option<i64> = conn
                .query_row("SELECT id FROM roles WHERE id = ?1", params![role_id.0], |row| {
                    row.get(0)
                })
                .optional()
                .context("Failed to query role")?;
            Ok(found.is_some())
        })
        .await
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let user = user.clone();
        self.blocking("update_user", move |conn| {
            let rows = conn
                .execute(
                    "UPDATE users SET email = ?1, name = ?2, password_hash = ?3, role_id = ?4, last_access = ?5
                     WHERE id = ?6",
                    params![
                        user.email,
                        user.name,
                        user.password_hash,
                        user.role.id.0,
                        user.last_access.map(|t| t.to_rfc3339()),
                        user.id.0,
                    ],
                )
                .context("Failed to update user")?;

            if rows == 0 {
                warn!("Update for unknown user {}", user.id);
                anyhow::bail!("User not found");
            }
            Ok(())
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.blocking("list_users", |conn| {
            let sql = format!("SELECT {} ORDER BY u.id", USER_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], user_row)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list users")?;

            let mut rights_by_role: HashMap<RoleId, Vec<RoleRight>> = HashMap::new();
            let mut users = Vec::with_capacity(rows.len());
            for (mut user, role_id) in rows {
                if !rights_by_role.contains_key(&role_id) {
                    rights_by_role.insert(role_id, load_rights(conn, role_id)?);
                }
                user.role.rights = rights_by_role[&role_id].clone();
                users.push(user);
            }
            Ok(users)
        })
        .await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let user = self
            .blocking("create_user", move |conn| {
                conn.execute(
                    "INSERT INTO users (email, name, password_hash, role_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        new_user.email,
                        new_user.name,
                        new_user.password_hash,
                        new_user.role_id.0,
                        Utc::now().to_rfc3339(),
                    ],
                )
                .context("Failed to insert user")?;

                Self::load_user(conn, "u.id = ?1", &conn.last_insert_rowid())?
                    .context("Inserted user vanished")
            })
            .await?;

        info!("✅ Created user: {} ({})", user.email, user.role.name);
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let rows = self
            .blocking("delete_user", move |conn| {
                conn.execute("DELETE FROM users WHERE id = ?1", params![id.0])
                    .context("Failed to delete user")
            })
            .await?;

        if rows > 0 {
            info!("🗑️  Deleted user: {}", id);
        }
        Ok(rows > 0)
    }
}
