//! Repository error taxonomy.

use crate::db::DbError;
use crate::model::recipe::{RecipeId, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Coarse failure class reported to callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Input rejected before any write.
    Validation,
    /// The database failed to read or write.
    Storage,
    /// Stored data violates a relationship invariant.
    Integrity,
    /// The requested recipe has no row.
    NotFound,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Storage => "storage",
            Self::Integrity => "integrity",
            Self::NotFound => "not_found",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for catalog, mapper and assembler operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    /// A stored row points at something that is not there.
    Integrity(String),
    NotFound(RecipeId),
    /// Connection schema is not at the version this crate expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl RepoError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::Db(_) | Self::UninitializedConnection { .. } | Self::MissingRequiredTable(_) => {
                FailureKind::Storage
            }
            Self::Integrity(_) => FailureKind::Integrity,
            Self::NotFound(_) => FailureKind::NotFound,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Integrity(message) => write!(f, "cookbook integrity violation: {message}"),
            Self::NotFound(id) => write!(f, "recipe not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "cookbook repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "cookbook repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{FailureKind, RepoError};
    use crate::model::recipe::ValidationError;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            RepoError::from(ValidationError::EmptyRecipeName).kind(),
            FailureKind::Validation
        );
        assert_eq!(RepoError::NotFound(7).kind(), FailureKind::NotFound);
        assert_eq!(
            RepoError::Integrity("x".to_string()).kind(),
            FailureKind::Integrity
        );
        assert_eq!(
            RepoError::MissingRequiredTable("units").kind(),
            FailureKind::Storage
        );
        assert_eq!(
            RepoError::from(rusqlite::Error::QueryReturnedNoRows).kind(),
            FailureKind::Storage
        );
    }
}
