//! Cookbook query façade.
//!
//! # Responsibility
//! - Expose `get_recipe` / `find_recipes` as the read entry points and the
//!   save helpers as write entry points.
//! - Emit one structured log line per operation outcome.
//!
//! # Invariants
//! - Every failure is returned to the caller; logging never replaces it.
//! - Writes return the aggregate as read back from storage.
//! - `find_recipes` orders by id ascending.

use crate::model::catalog::{User, UserId};
use crate::model::recipe::{AuthorRef, RecipeAggregate, RecipeDraft, RecipeId};
use crate::repo::assembler::{FetchPlan, RecipeQuery};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::recipe_repo::RecipeRepository;
use log::{info, warn};
use std::time::Instant;

/// Façade over a `RecipeRepository`.
pub struct CookbookService<R: RecipeRepository> {
    repo: R,
}

impl<R: RecipeRepository> CookbookService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Borrows the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Creates the user `name`, or returns the existing one.
    pub fn save_user(&self, name: &str) -> RepoResult<User> {
        let started_at = Instant::now();
        let result = self.repo.save_user(name, None);
        log_outcome("user_save", started_at, &result);
        result
    }

    /// Saves a new recipe whose instructions are `instruction_texts`, with
    /// `step` equal to each text's index.
    pub fn save_recipe<S: AsRef<str>>(
        &self,
        author_id: UserId,
        name: &str,
        instruction_texts: &[S],
    ) -> RepoResult<RecipeAggregate> {
        let draft = RecipeDraft::new(AuthorRef::Id(author_id), name)
            .with_instructions(instruction_texts.iter().map(|text| text.as_ref()));
        self.save_recipe_draft(&draft)
    }

    /// Saves a full draft (insert or replace) and reads it back.
    pub fn save_recipe_draft(&self, draft: &RecipeDraft) -> RepoResult<RecipeAggregate> {
        let started_at = Instant::now();
        let result = self.repo.save_recipe(draft).and_then(|id| {
            self.repo
                .load_recipe(id, &FetchPlan::full())?
                .ok_or_else(|| {
                    RepoError::Integrity(format!("saved recipe {id} missing on read-back"))
                })
        });
        log_outcome("recipe_save", started_at, &result);
        result
    }

    /// Loads one fully hydrated recipe; `RepoError::NotFound` when absent.
    pub fn get_recipe(&self, id: RecipeId) -> RepoResult<RecipeAggregate> {
        let started_at = Instant::now();
        let result = self
            .repo
            .load_recipe(id, &FetchPlan::full())
            .and_then(|found| found.ok_or(RepoError::NotFound(id)));
        log_outcome("recipe_get", started_at, &result);
        result
    }

    /// Loads every recipe, ascending by id.
    pub fn find_recipes(&self) -> RepoResult<Vec<RecipeAggregate>> {
        self.find_recipes_matching(&RecipeQuery::default())
    }

    pub fn find_recipes_matching(&self, query: &RecipeQuery) -> RepoResult<Vec<RecipeAggregate>> {
        let started_at = Instant::now();
        let result = self.repo.load_recipes(query, &FetchPlan::full());
        log_outcome("recipe_find", started_at, &result);
        result
    }

    pub fn delete_recipe(&self, id: RecipeId) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self.repo.delete_recipe(id);
        log_outcome("recipe_delete", started_at, &result);
        result
    }
}

fn log_outcome<T>(event: &str, started_at: Instant, result: &RepoResult<T>) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => info!("event={event} module=service status=ok duration_ms={duration_ms}"),
        Err(err) => warn!(
            "event={event} module=service status=error duration_ms={duration_ms} error_kind={}",
            err.kind()
        ),
    }
}
