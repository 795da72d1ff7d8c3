//! Shared catalog entities.
//!
//! Catalog rows are deduplicated by natural key (their exact name) and are
//! referenced, never owned, by recipes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

pub type UserId = i64;
pub type AisleId = i64;
pub type UnitId = i64;
pub type IngredientId = i64;

/// Kind of catalog entity, used for natural-key resolution and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    User,
    Aisle,
    Unit,
    Ingredient,
}

impl CatalogKind {
    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Aisle => "aisles",
            Self::Unit => "units",
            Self::Ingredient => "ingredients",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Aisle => "aisle",
            Self::Unit => "unit",
            Self::Ingredient => "ingredient",
        }
    }
}

impl Display for CatalogKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person who can author recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
}

/// Supermarket aisle where ingredients can be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aisle {
    pub id: AisleId,
    pub name: String,
}

/// Unit an ingredient quantity is counted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    /// True for measurements such as `g` or `kg` that render right after the
    /// count ("200g"), false for words such as `cup` ("2 cup").
    pub is_measurement: bool,
}

/// Ingredient definition, shared by every recipe that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub aisle_id: AisleId,
}

/// Returns true when `value` is non-empty after trimming.
pub fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Loose shape check for user e-mail addresses.
pub fn is_plausible_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::{is_plausible_email, is_present, CatalogKind};

    #[test]
    fn blank_names_are_not_present() {
        assert!(!is_present(""));
        assert!(!is_present("   \t"));
        assert!(is_present(" rice "));
    }

    #[test]
    fn email_shape_check() {
        assert!(is_plausible_email("james@example.com"));
        assert!(!is_plausible_email("james"));
        assert!(!is_plausible_email("james@localhost"));
        assert!(!is_plausible_email("ja mes@example.com"));
    }

    #[test]
    fn kinds_map_to_tables() {
        assert_eq!(CatalogKind::Aisle.table(), "aisles");
        assert_eq!(CatalogKind::Ingredient.to_string(), "ingredient");
    }
}
