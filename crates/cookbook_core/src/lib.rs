//! Core persistence for cookbook data.
//! Recipes, their instructions and ingredient lines are saved and rebuilt as
//! one aggregate; aisles, units, ingredients and users live in a shared
//! catalog referenced by id.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::catalog::{
    Aisle, AisleId, CatalogKind, Ingredient, IngredientId, Unit, UnitId, User, UserId,
};
pub use model::recipe::{
    AuthorRef, CatalogRefs, IngredientDraft, IngredientLine, Instruction, Recipe, RecipeAggregate,
    RecipeDraft, RecipeId, RecipeIngredient, ValidationError,
};
pub use repo::assembler::{FetchPlan, RecipeOrder, RecipeQuery, Relation};
pub use repo::catalog_repo::{CatalogKey, CatalogRepository, SqliteCatalogRepository};
pub use repo::error::{FailureKind, RepoError, RepoResult};
pub use repo::recipe_repo::{RecipeRepository, SqliteRecipeRepository};
pub use service::cookbook_service::CookbookService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
