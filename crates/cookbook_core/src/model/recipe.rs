//! Recipe aggregate model.
//!
//! # Responsibility
//! - Describe the write-side draft a caller hands to the mapper.
//! - Describe the read-side aggregate the assembler reconstructs.
//!
//! # Invariants
//! - Instruction `step` is the zero-based position in the recipe and is
//!   unique within it.
//! - Ingredient-line quantities are never negative.
//! - One recipe names each ingredient at most once.

use crate::model::catalog::{
    is_present, Aisle, AisleId, CatalogKind, Ingredient, IngredientId, Unit, UnitId, User, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RecipeId = i64;

/// Recipe header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub author_id: UserId,
}

/// One step of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: i64,
    pub recipe_id: RecipeId,
    pub step: i64,
    pub text: String,
}

/// Ingredient line of a recipe: how much of which ingredient, in which unit,
/// and how to prepare it. Catalog entities are referenced by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub recipe_id: RecipeId,
    pub ingredient_id: IngredientId,
    pub unit_id: UnitId,
    pub quantity: i64,
    pub preparation: String,
}

/// Author of a recipe being saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRef {
    /// Existing user; must already have a row.
    Id(UserId),
    /// User looked up by name and created when absent.
    Name(String),
}

/// Ingredient line as supplied by a caller, named by natural keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientDraft {
    pub name: String,
    pub aisle: String,
    pub unit: String,
    pub unit_is_measurement: bool,
    pub quantity: i64,
    pub preparation: String,
}

impl IngredientDraft {
    pub fn new(
        name: impl Into<String>,
        aisle: impl Into<String>,
        quantity: i64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            aisle: aisle.into(),
            unit: unit.into(),
            unit_is_measurement: false,
            quantity,
            preparation: String::new(),
        }
    }

    /// Marks the unit as a measurement (`g`, `ml`, ...).
    pub fn measured(mut self) -> Self {
        self.unit_is_measurement = true;
        self
    }

    pub fn prepared(mut self, preparation: impl Into<String>) -> Self {
        self.preparation = preparation.into();
        self
    }
}

/// Write-side recipe aggregate.
///
/// `id == None` inserts a new recipe; `Some(id)` replaces the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub id: Option<RecipeId>,
    pub name: String,
    pub author: AuthorRef,
    /// Instruction texts in display order; position becomes `step`.
    pub instructions: Vec<String>,
    pub ingredients: Vec<IngredientDraft>,
}

impl RecipeDraft {
    pub fn new(author: AuthorRef, name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            author,
            instructions: Vec::new(),
            ingredients: Vec::new(),
        }
    }

    pub fn with_instructions<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions = texts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ingredient(mut self, ingredient: IngredientDraft) -> Self {
        self.ingredients.push(ingredient);
        self
    }

    /// Checks every input rule that can be decided without storage.
    ///
    /// Author existence for `AuthorRef::Id` is checked by the mapper.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_present(&self.name) {
            return Err(ValidationError::EmptyRecipeName);
        }
        if let AuthorRef::Name(name) = &self.author {
            if !is_present(name) {
                return Err(ValidationError::EmptyName(CatalogKind::User));
            }
        }

        let mut seen = HashSet::new();
        for line in &self.ingredients {
            if !is_present(&line.name) {
                return Err(ValidationError::EmptyName(CatalogKind::Ingredient));
            }
            if !is_present(&line.aisle) {
                return Err(ValidationError::EmptyName(CatalogKind::Aisle));
            }
            if !is_present(&line.unit) {
                return Err(ValidationError::EmptyName(CatalogKind::Unit));
            }
            if line.quantity < 0 {
                return Err(ValidationError::NegativeQuantity {
                    ingredient: line.name.clone(),
                    quantity: line.quantity,
                });
            }
            if !seen.insert(line.name.as_str()) {
                return Err(ValidationError::DuplicateIngredient(line.name.clone()));
            }
        }

        Ok(())
    }
}

/// Input rejected before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyRecipeName,
    /// A catalog natural key is blank.
    EmptyName(CatalogKind),
    InvalidEmail(String),
    NegativeQuantity {
        ingredient: String,
        quantity: i64,
    },
    /// The same ingredient name appears on two lines of one recipe.
    DuplicateIngredient(String),
    UnknownAuthor(UserId),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRecipeName => write!(f, "recipe name cannot be empty"),
            Self::EmptyName(kind) => write!(f, "{kind} name cannot be empty"),
            Self::InvalidEmail(value) => write!(f, "invalid email address `{value}`"),
            Self::NegativeQuantity {
                ingredient,
                quantity,
            } => write!(
                f,
                "quantity for `{ingredient}` must be >= 0, got {quantity}"
            ),
            Self::DuplicateIngredient(name) => {
                write!(f, "ingredient `{name}` is listed more than once")
            }
            Self::UnknownAuthor(id) => write!(f, "author user {id} does not exist"),
        }
    }
}

impl Error for ValidationError {}

/// Catalog entities reachable from one aggregate's ingredient lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRefs {
    pub ingredients: BTreeMap<IngredientId, Ingredient>,
    pub aisles: BTreeMap<AisleId, Aisle>,
    pub units: BTreeMap<UnitId, Unit>,
}

/// Read-side recipe aggregate.
///
/// Only the relations requested by the fetch plan are populated; the others
/// stay empty (`author == None`, empty vectors).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeAggregate {
    pub recipe: Recipe,
    pub author: Option<User>,
    /// Sorted by `step`, ties by instruction id.
    pub instructions: Vec<Instruction>,
    /// In storage order.
    pub ingredients: Vec<RecipeIngredient>,
    pub catalog: CatalogRefs,
}

/// Borrowed view of one ingredient line joined with its catalog entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientLine<'a> {
    pub entry: &'a RecipeIngredient,
    pub ingredient: &'a Ingredient,
    pub aisle: &'a Aisle,
    pub unit: &'a Unit,
}

impl RecipeAggregate {
    pub fn id(&self) -> RecipeId {
        self.recipe.id
    }

    pub fn instruction_texts(&self) -> Vec<&str> {
        self.instructions
            .iter()
            .map(|instruction| instruction.text.as_str())
            .collect()
    }

    /// Joins each ingredient line with its catalog entities.
    ///
    /// Aggregates produced by the assembler always resolve every line; a
    /// hand-built aggregate with missing catalog entries yields fewer lines.
    pub fn lines(&self) -> Vec<IngredientLine<'_>> {
        self.ingredients
            .iter()
            .filter_map(|entry| {
                let ingredient = self.catalog.ingredients.get(&entry.ingredient_id)?;
                let aisle = self.catalog.aisles.get(&ingredient.aisle_id)?;
                let unit = self.catalog.units.get(&entry.unit_id)?;
                Some(IngredientLine {
                    entry,
                    ingredient,
                    aisle,
                    unit,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthorRef, IngredientDraft, RecipeDraft, ValidationError};
    use crate::model::catalog::CatalogKind;

    fn pasta() -> RecipeDraft {
        RecipeDraft::new(AuthorRef::Id(1), "Comfort Pasta").with_instructions(["boil", "drain"])
    }

    #[test]
    fn valid_draft_passes() {
        let draft = pasta().with_ingredient(IngredientDraft::new("penne", "Pasta", 200, "g"));
        assert_eq!(draft.validate(), Ok(()));
    }

    #[test]
    fn zero_quantity_is_allowed() {
        let draft = pasta().with_ingredient(IngredientDraft::new("salt", "Spices", 0, "pinch"));
        assert_eq!(draft.validate(), Ok(()));
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let draft = pasta().with_ingredient(IngredientDraft::new("penne", "Pasta", -1, "g"));
        assert_eq!(
            draft.validate(),
            Err(ValidationError::NegativeQuantity {
                ingredient: "penne".to_string(),
                quantity: -1,
            })
        );
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut draft = pasta();
        draft.name = "  ".to_string();
        assert_eq!(draft.validate(), Err(ValidationError::EmptyRecipeName));

        let draft = pasta().with_ingredient(IngredientDraft::new("penne", "", 1, "g"));
        assert_eq!(
            draft.validate(),
            Err(ValidationError::EmptyName(CatalogKind::Aisle))
        );

        let draft = RecipeDraft::new(AuthorRef::Name(String::new()), "Toast");
        assert_eq!(
            draft.validate(),
            Err(ValidationError::EmptyName(CatalogKind::User))
        );
    }

    #[test]
    fn duplicate_ingredient_names_are_rejected_case_sensitively() {
        let draft = pasta()
            .with_ingredient(IngredientDraft::new("Rice", "Grains", 1, "cup"))
            .with_ingredient(IngredientDraft::new("rice", "Grains", 1, "cup"));
        assert_eq!(draft.validate(), Ok(()));

        let draft = draft.with_ingredient(IngredientDraft::new("rice", "Grains", 2, "cup"));
        assert_eq!(
            draft.validate(),
            Err(ValidationError::DuplicateIngredient("rice".to_string()))
        );
    }
}
