// 🗄️ Persistence - SQLite storage for users, sessions, groups and movements
//
// Group and movement queries always carry the owning scope in their WHERE
// clause (owner id for groups, group id for movements). There is no
// "by id" lookup that skips it. These functions are crate-private: request
// code reaches them only through `access` and `identity`.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::entities::{Amount, Group, GroupSummary, Movement, User};
use crate::error::Result;

// ============================================================================
// SCHEMA
// ============================================================================

pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases answer "memory"
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            encrypted_password TEXT NOT NULL,
            profile_image TEXT NOT NULL,
            confirmation_digest TEXT UNIQUE,
            confirmed_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            token_digest TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            icon TEXT NOT NULL,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS movements (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_groups_user ON groups(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_movements_group ON movements(group_id, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_movements_author ON movements(author_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

pub(crate) fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_time_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

const USER_COLUMNS: &str = "id, name, email, profile_image, confirmed_at, created_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        profile_image: row.get(3)?,
        confirmed_at: optional_time_column(row, 4)?,
        created_at: time_column(row, 5)?,
    })
}

fn group_from_row(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        user_id: row.get(3)?,
        created_at: time_column(row, 4)?,
    })
}

fn movement_from_row(row: &Row) -> rusqlite::Result<Movement> {
    Ok(Movement {
        id: row.get(0)?,
        name: row.get(1)?,
        amount: row.get(2)?,
        group_id: row.get(3)?,
        author_id: row.get(4)?,
        created_at: time_column(row, 5)?,
    })
}

// ============================================================================
// USERS & SESSIONS
// ============================================================================

pub(crate) fn insert_user(
    conn: &Connection,
    user: &User,
    encrypted_password: &str,
    confirmation_digest: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (
            id, name, email, encrypted_password, profile_image,
            confirmation_digest, confirmed_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id,
            user.name,
            user.email,
            encrypted_password,
            user.profile_image,
            confirmation_digest,
            user.confirmed_at.as_ref().map(to_db_time),
            to_db_time(&user.created_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1",
        [email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// User plus stored password hash, for sign-in only
pub(crate) fn user_credentials(conn: &Connection, email: &str) -> Result<Option<(User, String)>> {
    let sql = format!(
        "SELECT {}, encrypted_password FROM users WHERE email = ?1",
        USER_COLUMNS
    );
    let found = conn
        .query_row(&sql, [email], |row| Ok((user_from_row(row)?, row.get(6)?)))
        .optional()?;
    Ok(found)
}

pub(crate) fn user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [email], user_from_row).optional()?)
}

pub(crate) fn user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
}

/// Redeem a confirmation digest. The digest is single use.
pub(crate) fn confirm_user(
    conn: &Connection,
    confirmation_digest: &str,
    confirmed_at: &DateTime<Utc>,
) -> Result<Option<String>> {
    let tx = conn.unchecked_transaction()?;
    let user_id: Option<String> = tx
        .query_row(
            "SELECT id FROM users WHERE confirmation_digest = ?1",
            [confirmation_digest],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = &user_id {
        tx.execute(
            "UPDATE users SET confirmed_at = ?1, confirmation_digest = NULL WHERE id = ?2",
            params![to_db_time(confirmed_at), id],
        )?;
    }
    tx.commit()?;
    Ok(user_id)
}

/// Confirm without a token (admin CLI)
pub(crate) fn force_confirm_user(
    conn: &Connection,
    user_id: &str,
    confirmed_at: &DateTime<Utc>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET confirmed_at = COALESCE(confirmed_at, ?1), confirmation_digest = NULL
         WHERE id = ?2",
        params![to_db_time(confirmed_at), user_id],
    )?;
    Ok(changed > 0)
}

pub(crate) fn update_user_profile(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "UPDATE users SET name = ?1, profile_image = ?2 WHERE id = ?3",
        params![user.name, user.profile_image, user.id],
    )?;
    Ok(())
}

/// Delete a user together with sessions, owned groups and every movement
/// in those groups or authored by the user. One transaction.
pub(crate) fn delete_user_cascade(conn: &Connection, user_id: &str) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "DELETE FROM movements
         WHERE author_id = ?1
            OR group_id IN (SELECT id FROM groups WHERE user_id = ?1)",
        [user_id],
    )?;
    tx.execute("DELETE FROM groups WHERE user_id = ?1", [user_id])?;
    tx.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
    let removed = tx.execute("DELETE FROM users WHERE id = ?1", [user_id])?;

    tx.commit()?;
    Ok(removed > 0)
}

/// Account listing for the admin CLI: (user, group count)
pub(crate) fn list_users(conn: &Connection) -> Result<Vec<(User, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email, u.profile_image, u.confirmed_at, u.created_at,
                COUNT(g.id)
         FROM users u
         LEFT JOIN groups g ON g.user_id = u.id
         GROUP BY u.id
         ORDER BY u.created_at",
    )?;

    let users = stmt
        .query_map([], |row| Ok((user_from_row(row)?, row.get(6)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub(crate) fn insert_session(
    conn: &Connection,
    token_digest: &str,
    user_id: &str,
    created_at: &DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (token_digest, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![token_digest, user_id, to_db_time(created_at)],
    )?;
    Ok(())
}

pub(crate) fn session_user(conn: &Connection, token_digest: &str) -> Result<Option<User>> {
    let sql = "SELECT u.id, u.name, u.email, u.profile_image, u.confirmed_at, u.created_at
               FROM sessions s
               JOIN users u ON u.id = s.user_id
               WHERE s.token_digest = ?1";
    Ok(conn.query_row(sql, [token_digest], user_from_row).optional()?)
}

pub(crate) fn delete_session(conn: &Connection, token_digest: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM sessions WHERE token_digest = ?1", [token_digest])?;
    Ok(removed > 0)
}

// ============================================================================
// GROUPS (always scoped by owner)
// ============================================================================

pub(crate) fn insert_group(conn: &Connection, group: &Group) -> Result<()> {
    conn.execute(
        "INSERT INTO groups (id, name, icon, user_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            group.id,
            group.name,
            group.icon,
            group.user_id,
            to_db_time(&group.created_at)
        ],
    )?;
    Ok(())
}

pub(crate) fn select_group(
    conn: &Connection,
    owner_id: &str,
    group_id: &str,
) -> Result<Option<Group>> {
    let found = conn
        .query_row(
            "SELECT id, name, icon, user_id, created_at
             FROM groups
             WHERE id = ?1 AND user_id = ?2",
            params![group_id, owner_id],
            group_from_row,
        )
        .optional()?;
    Ok(found)
}

pub(crate) fn select_groups(conn: &Connection, owner_id: &str) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, icon, user_id, created_at
         FROM groups
         WHERE user_id = ?1
         ORDER BY name COLLATE NOCASE, created_at",
    )?;

    let groups = stmt
        .query_map([owner_id], group_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

/// Owner's groups with the derived movement total and count
pub(crate) fn select_group_summaries(
    conn: &Connection,
    owner_id: &str,
) -> Result<Vec<GroupSummary>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.name, g.icon, g.user_id, g.created_at,
                COALESCE(SUM(m.amount_cents), 0) AS movements_sum,
                COUNT(m.id) AS movements_count
         FROM groups g
         LEFT JOIN movements m ON m.group_id = g.id
         WHERE g.user_id = ?1
         GROUP BY g.id
         ORDER BY g.created_at DESC",
    )?;

    let summaries = stmt
        .query_map([owner_id], |row| {
            Ok(GroupSummary {
                group: group_from_row(row)?,
                movements_total: row.get(5)?,
                movements_count: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(summaries)
}

pub(crate) fn update_group_row(conn: &Connection, group: &Group) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE groups SET name = ?1, icon = ?2 WHERE id = ?3 AND user_id = ?4",
        params![group.name, group.icon, group.id, group.user_id],
    )?;
    Ok(changed > 0)
}

/// Delete a group and its movements in one transaction.
/// Returns the number of movements removed, or None when nothing matched.
pub(crate) fn delete_group_cascade(
    conn: &Connection,
    owner_id: &str,
    group_id: &str,
) -> Result<Option<usize>> {
    let tx = conn.unchecked_transaction()?;

    let owned: i64 = tx.query_row(
        "SELECT COUNT(*) FROM groups WHERE id = ?1 AND user_id = ?2",
        params![group_id, owner_id],
        |row| row.get(0),
    )?;
    if owned == 0 {
        return Ok(None);
    }

    let movements = tx.execute("DELETE FROM movements WHERE group_id = ?1", [group_id])?;
    tx.execute(
        "DELETE FROM groups WHERE id = ?1 AND user_id = ?2",
        params![group_id, owner_id],
    )?;

    tx.commit()?;
    Ok(Some(movements))
}

// ============================================================================
// MOVEMENTS (always scoped by group)
// ============================================================================

pub(crate) fn insert_movement(conn: &Connection, movement: &Movement) -> Result<()> {
    conn.execute(
        "INSERT INTO movements (id, name, amount_cents, group_id, author_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            movement.id,
            movement.name,
            movement.amount,
            movement.group_id,
            movement.author_id,
            to_db_time(&movement.created_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn select_movement(
    conn: &Connection,
    group_id: &str,
    movement_id: &str,
) -> Result<Option<Movement>> {
    let found = conn
        .query_row(
            "SELECT id, name, amount_cents, group_id, author_id, created_at
             FROM movements
             WHERE id = ?1 AND group_id = ?2",
            params![movement_id, group_id],
            movement_from_row,
        )
        .optional()?;
    Ok(found)
}

/// Movements of one group, newest first
pub(crate) fn select_movements(conn: &Connection, group_id: &str) -> Result<Vec<Movement>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, amount_cents, group_id, author_id, created_at
         FROM movements
         WHERE group_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;

    let movements = stmt
        .query_map([group_id], movement_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(movements)
}

pub(crate) fn count_movements(conn: &Connection, group_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM movements WHERE group_id = ?1",
        [group_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub(crate) fn update_movement_row(conn: &Connection, movement: &Movement) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE movements SET name = ?1, amount_cents = ?2 WHERE id = ?3 AND group_id = ?4",
        params![movement.name, movement.amount, movement.id, movement.group_id],
    )?;
    Ok(changed > 0)
}

pub(crate) fn delete_movement(
    conn: &Connection,
    group_id: &str,
    movement_id: &str,
) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM movements WHERE id = ?1 AND group_id = ?2",
        params![movement_id, group_id],
    )?;
    Ok(removed > 0)
}

// ============================================================================
// TESTS
// ============================================================================
