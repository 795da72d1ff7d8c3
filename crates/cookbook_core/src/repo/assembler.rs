//! Retrieval assembler: rebuilds recipe aggregates from normalized rows.
//!
//! # Responsibility
//! - Load recipe headers by id or by `RecipeQuery`.
//! - Hydrate exactly the relations named in a `FetchPlan`.
//!
//! # Invariants
//! - Query count depends on the plan, never on how many recipes are loaded:
//!   every relation is fetched with one statement whose `IN (...)` is a
//!   subquery over the header predicate, so bind counts stay fixed too.
//! - Instructions come back ordered by `step ASC, id ASC`; ingredient lines in
//!   storage (rowid) order.
//! - A reference to a missing row is an integrity error, never skipped.

use crate::model::catalog::{Aisle, Ingredient, Unit, User};
use crate::model::recipe::{
    CatalogRefs, Instruction, Recipe, RecipeAggregate, RecipeId, RecipeIngredient,
};
use crate::repo::catalog_repo::{
    parse_aisle_row, parse_ingredient_row, parse_unit_row, parse_user,
};
use crate::repo::error::{RepoError, RepoResult};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

const RECIPE_SELECT_SQL: &str = "SELECT r.id, r.name, r.author_id FROM recipes r";

/// Relation of a recipe that a load may hydrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    /// The authoring user.
    Author,
    /// Ordered instruction rows.
    Instructions,
    /// Ingredient lines plus their ingredients, aisles and units.
    Ingredients,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Self::Author, Self::Instructions, Self::Ingredients];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Instructions => "instructions",
            Self::Ingredients => "ingredients",
        }
    }

    /// Queries this relation costs per load.
    fn query_cost(self) -> usize {
        match self {
            Self::Author | Self::Instructions => 1,
            // lines, ingredients, aisles, units
            Self::Ingredients => 4,
        }
    }
}

/// Declared set of relations to hydrate for one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    relations: BTreeSet<Relation>,
}

impl FetchPlan {
    /// Every relation.
    pub fn full() -> Self {
        Self {
            relations: Relation::ALL.into_iter().collect(),
        }
    }

    /// Recipe header rows only.
    pub fn header_only() -> Self {
        Self {
            relations: BTreeSet::new(),
        }
    }

    pub fn with(mut self, relation: Relation) -> Self {
        self.relations.insert(relation);
        self
    }

    pub fn without(mut self, relation: Relation) -> Self {
        self.relations.remove(&relation);
        self
    }

    pub fn includes(&self, relation: Relation) -> bool {
        self.relations.contains(&relation)
    }

    pub fn relations(&self) -> impl Iterator<Item = Relation> + '_ {
        self.relations.iter().copied()
    }

    /// Upper bound on the statements a load with this plan issues.
    pub fn max_queries(&self) -> usize {
        1 + self.relations().map(Relation::query_cost).sum::<usize>()
    }
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self::full()
    }
}

impl Display for FetchPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.relations.is_empty() {
            return f.write_str("header");
        }
        let names: Vec<&str> = self.relations().map(Relation::as_str).collect();
        f.write_str(&names.join("+"))
    }
}

/// Ordering of multi-recipe loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecipeOrder {
    #[default]
    IdAsc,
    IdDesc,
    /// Name ascending, ties by id.
    NameAsc,
}

impl RecipeOrder {
    fn sql(self) -> &'static str {
        match self {
            Self::IdAsc => " ORDER BY r.id ASC",
            Self::IdDesc => " ORDER BY r.id DESC",
            Self::NameAsc => " ORDER BY r.name ASC, r.id ASC",
        }
    }
}

/// Predicate for multi-recipe loads. All set filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeQuery {
    pub author_id: Option<i64>,
    /// Substring of the recipe name; SQLite `LIKE`, so only ASCII letters
    /// match case-insensitively.
    pub name_contains: Option<String>,
    /// Exact name of an ingredient the recipe must use.
    pub ingredient: Option<String>,
    pub order_by: RecipeOrder,
}

/// Loads one recipe, or `None` when the id has no row.
pub fn load_recipe(
    conn: &Connection,
    id: RecipeId,
    plan: &FetchPlan,
) -> RepoResult<Option<RecipeAggregate>> {
    let scope = RecipeScope::by_id(id);
    let mut loader = Loader::new(conn, &scope);
    let headers = loader.headers(RecipeOrder::IdAsc)?;
    let mut aggregates = loader.assemble(headers, plan)?;
    Ok(aggregates.pop())
}

/// Loads every recipe matching `query`, in `query.order_by` order.
pub fn load_recipes(
    conn: &Connection,
    query: &RecipeQuery,
    plan: &FetchPlan,
) -> RepoResult<Vec<RecipeAggregate>> {
    let scope = RecipeScope::from_query(query);
    let mut loader = Loader::new(conn, &scope);
    let headers = loader.headers(query.order_by)?;
    loader.assemble(headers, plan)
}

/// Recipe selection shared by the header statement and every relation batch.
///
/// Relation statements embed the selection as a subquery and re-bind the same
/// values, so their bind count never grows with the number of recipes.
#[derive(Debug, Clone, PartialEq)]
struct RecipeScope {
    filter: String,
    binds: Vec<Value>,
}

impl RecipeScope {
    fn by_id(id: RecipeId) -> Self {
        Self {
            filter: " WHERE r.id = ?".to_string(),
            binds: vec![Value::Integer(id)],
        }
    }

    fn from_query(query: &RecipeQuery) -> Self {
        let mut filter = String::from(" WHERE 1 = 1");
        let mut binds = Vec::new();

        if let Some(author_id) = query.author_id {
            filter.push_str(" AND r.author_id = ?");
            binds.push(Value::Integer(author_id));
        }

        if let Some(fragment) = query.name_contains.as_ref() {
            filter.push_str(" AND r.name LIKE ? ESCAPE '\\'");
            binds.push(Value::Text(format!("%{}%", escape_like(fragment))));
        }

        if let Some(ingredient) = query.ingredient.as_ref() {
            filter.push_str(
                " AND EXISTS (
                SELECT 1
                FROM recipe_ingredients ri
                INNER JOIN ingredients i ON i.id = ri.ingredient_id
                WHERE ri.recipe_id = r.id
                  AND i.name = ?
            )",
            );
            binds.push(Value::Text(ingredient.clone()));
        }

        Self { filter, binds }
    }

    fn header_sql(&self, order_by: RecipeOrder) -> String {
        format!("{RECIPE_SELECT_SQL}{}{};", self.filter, order_by.sql())
    }

    /// Subquery yielding `column` of every recipe in scope.
    fn select(&self, column: &str) -> String {
        format!("SELECT r.{column} FROM recipes r{}", self.filter)
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

struct Loader<'a> {
    conn: &'a Connection,
    scope: &'a RecipeScope,
    queries: usize,
}

impl<'a> Loader<'a> {
    fn new(conn: &'a Connection, scope: &'a RecipeScope) -> Self {
        Self {
            conn,
            scope,
            queries: 0,
        }
    }

    /// Runs `sql`, which must reference the scope exactly once.
    fn fetch_rows<T>(
        &mut self,
        sql: &str,
        mut parse: impl FnMut(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Vec<T>> {
        self.queries += 1;
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(self.scope.binds.iter()))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse(row)?);
        }
        Ok(items)
    }

    /// Fetches `select_sql WHERE id IN (id_source)` keyed by id.
    fn fetch_keyed<T>(
        &mut self,
        select_sql: &str,
        id_source: &str,
        parse: impl FnMut(&Row<'_>) -> RepoResult<T>,
        id_of: impl Fn(&T) -> i64,
    ) -> RepoResult<BTreeMap<i64, T>> {
        let sql = format!("{select_sql} WHERE id IN ({id_source});");
        let items = self.fetch_rows(&sql, parse)?;
        Ok(items.into_iter().map(|item| (id_of(&item), item)).collect())
    }

    fn headers(&mut self, order_by: RecipeOrder) -> RepoResult<Vec<Recipe>> {
        let sql = self.scope.header_sql(order_by);
        self.fetch_rows(&sql, parse_recipe_row)
    }

    fn assemble(
        &mut self,
        headers: Vec<Recipe>,
        plan: &FetchPlan,
    ) -> RepoResult<Vec<RecipeAggregate>> {
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let authors = if plan.includes(Relation::Author) {
            let author_ids = self.scope.select("author_id");
            self.fetch_keyed(
                "SELECT id, name, email FROM users",
                &author_ids,
                parse_user,
                |user: &User| user.id,
            )?
        } else {
            BTreeMap::new()
        };

        let mut instructions = if plan.includes(Relation::Instructions) {
            self.instructions_by_recipe()?
        } else {
            BTreeMap::new()
        };

        let (mut lines, catalog) = if plan.includes(Relation::Ingredients) {
            self.lines_by_recipe()?
        } else {
            (BTreeMap::new(), CatalogRows::default())
        };

        let mut aggregates = Vec::with_capacity(headers.len());
        for recipe in headers {
            let author = if plan.includes(Relation::Author) {
                let user = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                    RepoError::Integrity(format!(
                        "recipe {} references missing author {}",
                        recipe.id, recipe.author_id
                    ))
                })?;
                Some(user)
            } else {
                None
            };
            let ingredients = lines.remove(&recipe.id).unwrap_or_default();
            let refs = catalog.refs_for(recipe.id, &ingredients)?;

            aggregates.push(RecipeAggregate {
                instructions: instructions.remove(&recipe.id).unwrap_or_default(),
                ingredients,
                catalog: refs,
                author,
                recipe,
            });
        }

        debug_assert!(self.queries <= plan.max_queries());
        debug!(
            "event=recipe_load module=repo status=ok recipes={} plan={} queries={}",
            aggregates.len(),
            plan,
            self.queries
        );
        Ok(aggregates)
    }

    fn instructions_by_recipe(&mut self) -> RepoResult<BTreeMap<RecipeId, Vec<Instruction>>> {
        let sql = format!(
            "SELECT id, recipe_id, step, text
             FROM instructions
             WHERE recipe_id IN ({})
             ORDER BY recipe_id ASC, step ASC, id ASC;",
            self.scope.select("id")
        );
        let rows = self.fetch_rows(&sql, parse_instruction_row)?;

        let mut grouped: BTreeMap<RecipeId, Vec<Instruction>> = BTreeMap::new();
        for instruction in rows {
            grouped
                .entry(instruction.recipe_id)
                .or_default()
                .push(instruction);
        }
        Ok(grouped)
    }

    fn lines_by_recipe(
        &mut self,
    ) -> RepoResult<(BTreeMap<RecipeId, Vec<RecipeIngredient>>, CatalogRows)> {
        let recipe_ids = self.scope.select("id");
        let sql = format!(
            "SELECT recipe_id, ingredient_id, unit_id, quantity, preparation
             FROM recipe_ingredients
             WHERE recipe_id IN ({recipe_ids})
             ORDER BY recipe_id ASC, rowid ASC;"
        );
        let rows = self.fetch_rows(&sql, parse_line_row)?;
        if rows.is_empty() {
            return Ok((BTreeMap::new(), CatalogRows::default()));
        }

        let ingredient_ids = format!(
            "SELECT ingredient_id FROM recipe_ingredients WHERE recipe_id IN ({recipe_ids})"
        );
        let ingredients = self.fetch_keyed(
            "SELECT id, name, aisle_id FROM ingredients",
            &ingredient_ids,
            parse_ingredient_row,
            |ingredient: &Ingredient| ingredient.id,
        )?;
        let aisles = self.fetch_keyed(
            "SELECT id, name FROM aisles",
            &format!("SELECT aisle_id FROM ingredients WHERE id IN ({ingredient_ids})"),
            parse_aisle_row,
            |aisle: &Aisle| aisle.id,
        )?;
        let units = self.fetch_keyed(
            "SELECT id, name, is_measurement FROM units",
            &format!("SELECT unit_id FROM recipe_ingredients WHERE recipe_id IN ({recipe_ids})"),
            parse_unit_row,
            |unit: &Unit| unit.id,
        )?;

        let mut grouped: BTreeMap<RecipeId, Vec<RecipeIngredient>> = BTreeMap::new();
        for line in rows {
            grouped.entry(line.recipe_id).or_default().push(line);
        }
        Ok((
            grouped,
            CatalogRows {
                ingredients,
                aisles,
                units,
            },
        ))
    }
}

/// Catalog rows fetched for a whole page of recipes.
#[derive(Default)]
struct CatalogRows {
    ingredients: BTreeMap<i64, Ingredient>,
    aisles: BTreeMap<i64, Aisle>,
    units: BTreeMap<i64, Unit>,
}

impl CatalogRows {
    /// Picks the entities one recipe's lines reach, failing on dangling ids.
    fn refs_for(&self, recipe_id: RecipeId, lines: &[RecipeIngredient]) -> RepoResult<CatalogRefs> {
        let mut refs = CatalogRefs::default();
        for line in lines {
            let ingredient = self.ingredients.get(&line.ingredient_id).ok_or_else(|| {
                RepoError::Integrity(format!(
                    "recipe {recipe_id} line references missing ingredient {}",
                    line.ingredient_id
                ))
            })?;
            let aisle = self.aisles.get(&ingredient.aisle_id).ok_or_else(|| {
                RepoError::Integrity(format!(
                    "ingredient {} references missing aisle {}",
                    ingredient.id, ingredient.aisle_id
                ))
            })?;
            let unit = self.units.get(&line.unit_id).ok_or_else(|| {
                RepoError::Integrity(format!(
                    "recipe {recipe_id} line references missing unit {}",
                    line.unit_id
                ))
            })?;

            refs.ingredients.insert(ingredient.id, ingredient.clone());
            refs.aisles.insert(aisle.id, aisle.clone());
            refs.units.insert(unit.id, unit.clone());
        }
        Ok(refs)
    }
}

fn parse_recipe_row(row: &Row<'_>) -> RepoResult<Recipe> {
    Ok(Recipe {
        id: row.get("id")?,
        name: row.get("name")?,
        author_id: row.get("author_id")?,
    })
}

fn parse_instruction_row(row: &Row<'_>) -> RepoResult<Instruction> {
    Ok(Instruction {
        id: row.get("id")?,
        recipe_id: row.get("recipe_id")?,
        step: row.get("step")?,
        text: row.get("text")?,
    })
}

fn parse_line_row(row: &Row<'_>) -> RepoResult<RecipeIngredient> {
    let line = RecipeIngredient {
        recipe_id: row.get("recipe_id")?,
        ingredient_id: row.get("ingredient_id")?,
        unit_id: row.get("unit_id")?,
        quantity: row.get("quantity")?,
        preparation: row.get("preparation")?,
    };
    if line.quantity < 0 {
        return Err(RepoError::Integrity(format!(
            "recipe {} has negative quantity {} for ingredient {}",
            line.recipe_id, line.quantity, line.ingredient_id
        )));
    }
    Ok(line)
}
