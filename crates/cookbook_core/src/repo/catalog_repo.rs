//! Reference catalog: users, aisles, units and ingredients.
//!
//! # Responsibility
//! - Resolve a natural key to a row id, creating the row on first use.
//! - Serve the small read APIs callers need for catalog data.
//!
//! # Invariants
//! - Resolution is an upsert backed by the unique name indexes, so repeated
//!   or concurrent resolves of one key never produce two rows.
//! - Keys match exactly (case-sensitive); nothing is cached between calls.
//! - Attributes other than the name (aisle, measurement flag, user e-mail)
//!   are recorded only when the row is created.

use crate::model::catalog::{
    is_plausible_email, is_present, Aisle, AisleId, CatalogKind, Ingredient, Unit, User, UserId,
};
use crate::model::recipe::ValidationError;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::{bool_to_int, ensure_connection_ready, int_to_bool};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Natural key of a catalog entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKey<'a> {
    User { name: &'a str },
    Aisle { name: &'a str },
    Unit { name: &'a str, is_measurement: bool },
    Ingredient { name: &'a str, aisle_id: AisleId },
}

impl<'a> CatalogKey<'a> {
    pub fn kind(&self) -> CatalogKind {
        match self {
            Self::User { .. } => CatalogKind::User,
            Self::Aisle { .. } => CatalogKind::Aisle,
            Self::Unit { .. } => CatalogKind::Unit,
            Self::Ingredient { .. } => CatalogKind::Ingredient,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            Self::User { name }
            | Self::Aisle { name }
            | Self::Unit { name, .. }
            | Self::Ingredient { name, .. } => *name,
        }
    }
}

/// Repository interface for catalog entities.
pub trait CatalogRepository {
    /// Returns the id for `key`, inserting a row when none matches.
    fn resolve(&self, key: CatalogKey<'_>) -> RepoResult<i64>;
    /// Returns the id of the `kind` row named `name` without creating it.
    fn find(&self, kind: CatalogKind, name: &str) -> RepoResult<Option<i64>>;
    /// Resolves a user by name; `email` is stored only for a new user.
    fn resolve_user(&self, name: &str, email: Option<&str>) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_user_by_name(&self, name: &str) -> RepoResult<Option<User>>;
    fn list_aisles(&self) -> RepoResult<Vec<Aisle>>;
    fn list_units(&self) -> RepoResult<Vec<Unit>>;
    fn list_ingredients(&self) -> RepoResult<Vec<Ingredient>>;
}

/// SQLite-backed catalog.
///
/// Borrowing a `Connection` lets the mapper run resolves inside its own
/// transaction (a `Transaction` derefs to `Connection`).
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Creates a catalog over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Skips readiness checks for callers that already performed them.
    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn resolve(&self, key: CatalogKey<'_>) -> RepoResult<i64> {
        let kind = key.kind();
        let name = key.name();
        if !is_present(name) {
            return Err(ValidationError::EmptyName(kind).into());
        }

        let inserted = match key {
            CatalogKey::User { name } => self.conn.execute(
                "INSERT INTO users (name) VALUES (?1)
                 ON CONFLICT (name) DO NOTHING;",
                [name],
            )?,
            CatalogKey::Aisle { name } => self.conn.execute(
                "INSERT INTO aisles (name) VALUES (?1)
                 ON CONFLICT (name) DO NOTHING;",
                [name],
            )?,
            CatalogKey::Unit {
                name,
                is_measurement,
            } => self.conn.execute(
                "INSERT INTO units (name, is_measurement) VALUES (?1, ?2)
                 ON CONFLICT (name) DO NOTHING;",
                params![name, bool_to_int(is_measurement)],
            )?,
            CatalogKey::Ingredient { name, aisle_id } => self.conn.execute(
                "INSERT INTO ingredients (name, aisle_id) VALUES (?1, ?2)
                 ON CONFLICT (name) DO NOTHING;",
                params![name, aisle_id],
            )?,
        };

        let id = lookup_id(self.conn, kind, name)?.ok_or_else(|| {
            RepoError::Integrity(format!("{kind} `{name}` missing right after upsert"))
        })?;

        if inserted > 0 {
            debug!("event=catalog_resolve module=repo status=created kind={kind} id={id}");
        }
        Ok(id)
    }

    fn find(&self, kind: CatalogKind, name: &str) -> RepoResult<Option<i64>> {
        lookup_id(self.conn, kind, name)
    }

    fn resolve_user(&self, name: &str, email: Option<&str>) -> RepoResult<User> {
        if let Some(email) = email {
            if !is_plausible_email(email) {
                return Err(ValidationError::InvalidEmail(email.to_string()).into());
            }
        }

        if !is_present(name) {
            return Err(ValidationError::EmptyName(CatalogKind::User).into());
        }

        let inserted = self.conn.execute(
            "INSERT INTO users (name, email) VALUES (?1, ?2)
             ON CONFLICT (name) DO NOTHING;",
            params![name, email],
        )?;
        let user = self.find_user_by_name(name)?.ok_or_else(|| {
            RepoError::Integrity(format!("user `{name}` missing right after upsert"))
        })?;

        if inserted > 0 {
            debug!(
                "event=catalog_resolve module=repo status=created kind={} id={}",
                CatalogKind::User,
                user.id
            );
        }
        Ok(user)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, email FROM users WHERE id = ?1;",
                [id],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }

    fn find_user_by_name(&self, name: &str) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, email FROM users WHERE name = ?1;",
                [name],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }

    fn list_aisles(&self) -> RepoResult<Vec<Aisle>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM aisles ORDER BY name ASC, id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut aisles = Vec::new();
        while let Some(row) = rows.next()? {
            aisles.push(parse_aisle_row(row)?);
        }
        Ok(aisles)
    }

    fn list_units(&self) -> RepoResult<Vec<Unit>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, is_measurement FROM units ORDER BY name ASC, id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut units = Vec::new();
        while let Some(row) = rows.next()? {
            units.push(parse_unit_row(row)?);
        }
        Ok(units)
    }

    fn list_ingredients(&self) -> RepoResult<Vec<Ingredient>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, aisle_id FROM ingredients ORDER BY name ASC, id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut ingredients = Vec::new();
        while let Some(row) = rows.next()? {
            ingredients.push(parse_ingredient_row(row)?);
        }
        Ok(ingredients)
    }
}

fn lookup_id(conn: &Connection, kind: CatalogKind, name: &str) -> RepoResult<Option<i64>> {
    let id = conn
        .query_row(
            &format!("SELECT id FROM {} WHERE name = ?1;", kind.table()),
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
    })
}

pub(crate) fn parse_aisle_row(row: &Row<'_>) -> RepoResult<Aisle> {
    Ok(Aisle {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

pub(crate) fn parse_unit_row(row: &Row<'_>) -> RepoResult<Unit> {
    Ok(Unit {
        id: row.get("id")?,
        name: row.get("name")?,
        is_measurement: int_to_bool(row.get("is_measurement")?, "units.is_measurement")?,
    })
}

pub(crate) fn parse_ingredient_row(row: &Row<'_>) -> RepoResult<Ingredient> {
    Ok(Ingredient {
        id: row.get("id")?,
        name: row.get("name")?,
        aisle_id: row.get("aisle_id")?,
    })
}

pub(crate) fn parse_user(row: &Row<'_>) -> RepoResult<User> {
    Ok(parse_user_row(row)?)
}
