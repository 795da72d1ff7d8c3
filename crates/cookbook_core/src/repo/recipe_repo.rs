//! Recipe repository: aggregate mapper plus read delegation.
//!
//! # Responsibility
//! - Persist a `RecipeDraft` (header, instructions, ingredient lines) as one
//!   unit, resolving catalog entities through the reference catalog.
//! - Expose assembler loads behind the same repository seam.
//!
//! # Invariants
//! - Validation runs before the transaction opens; a rejected draft writes
//!   nothing.
//! - A save runs in one immediate transaction.
//! - Child rows use full-replace semantics: after a save the stored
//!   instructions and lines are exactly the draft's, in draft order.
//! - Instruction `step` is the instruction's index in the draft.

use crate::model::catalog::{CatalogKind, User, UserId};
use crate::model::recipe::{
    AuthorRef, IngredientDraft, RecipeAggregate, RecipeDraft, RecipeId, ValidationError,
};
use crate::repo::assembler::{self, FetchPlan, RecipeQuery};
use crate::repo::catalog_repo::{CatalogKey, CatalogRepository, SqliteCatalogRepository};
use crate::repo::ensure_connection_ready;
use crate::repo::error::{RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Repository interface for the recipe aggregate.
pub trait RecipeRepository {
    /// Resolves a user by name, creating it when absent.
    fn save_user(&self, name: &str, email: Option<&str>) -> RepoResult<User>;
    /// Inserts (`draft.id == None`) or replaces a recipe; returns its id.
    fn save_recipe(&self, draft: &RecipeDraft) -> RepoResult<RecipeId>;
    /// Deletes a recipe and, by cascade, its instructions and lines.
    fn delete_recipe(&self, id: RecipeId) -> RepoResult<()>;
    fn load_recipe(&self, id: RecipeId, plan: &FetchPlan) -> RepoResult<Option<RecipeAggregate>>;
    fn load_recipes(
        &self,
        query: &RecipeQuery,
        plan: &FetchPlan,
    ) -> RepoResult<Vec<RecipeAggregate>>;
}

/// SQLite-backed recipe repository.
pub struct SqliteRecipeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecipeRepository<'conn> {
    /// Creates a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Catalog view sharing this repository's connection.
    pub fn catalog(&self) -> SqliteCatalogRepository<'conn> {
        SqliteCatalogRepository::new_unchecked(self.conn)
    }
}

impl RecipeRepository for SqliteRecipeRepository<'_> {
    fn save_user(&self, name: &str, email: Option<&str>) -> RepoResult<User> {
        self.catalog().resolve_user(name, email)
    }

    fn save_recipe(&self, draft: &RecipeDraft) -> RepoResult<RecipeId> {
        draft.validate()?;
        if let AuthorRef::Id(author_id) = draft.author {
            ensure_user_exists(self.conn, author_id)?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let recipe_id = write_recipe(&tx, draft)?;
        tx.commit()?;

        debug!(
            "event=recipe_save module=repo status=ok recipe_id={recipe_id} instructions={} ingredients={}",
            draft.instructions.len(),
            draft.ingredients.len()
        );
        Ok(recipe_id)
    }

    fn delete_recipe(&self, id: RecipeId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn load_recipe(&self, id: RecipeId, plan: &FetchPlan) -> RepoResult<Option<RecipeAggregate>> {
        assembler::load_recipe(self.conn, id, plan)
    }

    fn load_recipes(
        &self,
        query: &RecipeQuery,
        plan: &FetchPlan,
    ) -> RepoResult<Vec<RecipeAggregate>> {
        assembler::load_recipes(self.conn, query, plan)
    }
}

fn ensure_user_exists(conn: &Connection, id: UserId) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(ValidationError::UnknownAuthor(id).into())
    }
}

/// Writes the whole aggregate on an open transaction.
fn write_recipe(tx: &Transaction<'_>, draft: &RecipeDraft) -> RepoResult<RecipeId> {
    let catalog = SqliteCatalogRepository::new_unchecked(tx);

    let author_id = match &draft.author {
        AuthorRef::Id(id) => *id,
        AuthorRef::Name(name) => catalog.resolve(CatalogKey::User { name })?,
    };

    let recipe_id = match draft.id {
        Some(id) => {
            let changed = tx.execute(
                "UPDATE recipes SET name = ?2, author_id = ?3 WHERE id = ?1;",
                params![id, draft.name, author_id],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(id));
            }
            id
        }
        None => {
            tx.execute(
                "INSERT INTO recipes (name, author_id) VALUES (?1, ?2);",
                params![draft.name, author_id],
            )?;
            tx.last_insert_rowid()
        }
    };

    replace_instructions(tx, recipe_id, &draft.instructions)?;
    replace_lines(tx, &catalog, recipe_id, &draft.ingredients)?;
    Ok(recipe_id)
}

fn replace_instructions(
    tx: &Transaction<'_>,
    recipe_id: RecipeId,
    texts: &[String],
) -> RepoResult<()> {
    tx.execute(
        "DELETE FROM instructions WHERE recipe_id = ?1;",
        [recipe_id],
    )?;

    let mut insert = tx.prepare(
        "INSERT INTO instructions (recipe_id, step, text) VALUES (?1, ?2, ?3);",
    )?;
    for (step, text) in (0_i64..).zip(texts) {
        insert.execute(params![recipe_id, step, text])?;
    }
    Ok(())
}

fn replace_lines(
    tx: &Transaction<'_>,
    catalog: &impl CatalogRepository,
    recipe_id: RecipeId,
    lines: &[IngredientDraft],
) -> RepoResult<()> {
    tx.execute(
        "DELETE FROM recipe_ingredients WHERE recipe_id = ?1;",
        [recipe_id],
    )?;

    let mut insert = tx.prepare(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, unit_id, quantity, preparation)
         VALUES (?1, ?2, ?3, ?4, ?5);",
    )?;
    for line in lines {
        // The aisle is only recorded when the ingredient is created.
        let ingredient_id = match catalog.find(CatalogKind::Ingredient, &line.name)? {
            Some(id) => id,
            None => {
                let aisle_id = catalog.resolve(CatalogKey::Aisle { name: &line.aisle })?;
                catalog.resolve(CatalogKey::Ingredient {
                    name: &line.name,
                    aisle_id,
                })?
            }
        };
        let unit_id = catalog.resolve(CatalogKey::Unit {
            name: &line.unit,
            is_measurement: line.unit_is_measurement,
        })?;
        insert.execute(params![
            recipe_id,
            ingredient_id,
            unit_id,
            line.quantity,
            line.preparation
        ])?;
    }
    Ok(())
}
