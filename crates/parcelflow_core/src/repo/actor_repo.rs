//! Actor directory repository.
//!
//! The identity subsystem owns registration; core reads the directory to
//! verify claimed roles and to find staff recipients for alerts.

use crate::model::actor::{Actor, ActorId, ActorRole};
use crate::repo::parcel_repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

/// Repository interface for the actor directory.
pub trait ActorRepository {
    fn register_actor(&self, actor: &Actor) -> RepoResult<()>;
    fn get_actor(&self, id: ActorId) -> RepoResult<Option<Actor>>;
    /// Lists staff members ordered by display name.
    fn list_staff(&self) -> RepoResult<Vec<Actor>>;
}

/// SQLite-backed actor directory.
pub struct SqliteActorRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActorRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ActorRepository for SqliteActorRepository<'_> {
    fn register_actor(&self, actor: &Actor) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO actors (id, role, display_name) VALUES (?1, ?2, ?3);",
            params![
                actor.id.to_string(),
                actor.role.as_str(),
                actor.display_name.as_str()
            ],
        )?;
        Ok(())
    }

    fn get_actor(&self, id: ActorId) -> RepoResult<Option<Actor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, role, display_name FROM actors WHERE id = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_actor_row(row)?));
        }
        Ok(None)
    }

    fn list_staff(&self) -> RepoResult<Vec<Actor>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, role, display_name
             FROM actors
             WHERE role = 'STAFF'
             ORDER BY display_name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut staff = Vec::new();
        while let Some(row) = rows.next()? {
            staff.push(parse_actor_row(row)?);
        }
        Ok(staff)
    }
}

fn parse_actor_row(row: &Row<'_>) -> RepoResult<Actor> {
    let id: String = row.get("id")?;
    let role: String = row.get("role")?;
    Ok(Actor {
        id: parse_uuid(&id, "actors.id")?,
        role: ActorRole::parse(&role).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid role `{role}` in actors.role"))
        })?,
        display_name: row.get("display_name")?,
    })
}
