use cookbook_core::db::open_db_in_memory;
use cookbook_core::{
    AuthorRef, CookbookService, FailureKind, IngredientDraft, RecipeDraft, RepoError,
    SqliteRecipeRepository, ValidationError,
};
use rusqlite::Connection;

fn service(conn: &Connection) -> CookbookService<SqliteRecipeRepository<'_>> {
    CookbookService::new(SqliteRecipeRepository::try_new(conn).unwrap())
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn comfort_pasta_scenario() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);

    let james = cookbook.save_user("james").unwrap();
    let saved = cookbook
        .save_recipe(james.id, "Comfort Pasta", &["step1", "step2"])
        .unwrap();

    let loaded = cookbook.get_recipe(saved.id()).unwrap();
    assert_eq!(loaded.recipe.name, "Comfort Pasta");
    assert_eq!(loaded.recipe.author_id, james.id);
    assert_eq!(loaded.author.as_ref().map(|u| u.name.as_str()), Some("james"));
    assert_eq!(loaded.instructions.len(), 2);
    assert_eq!(loaded.instructions[0].step, 0);
    assert_eq!(loaded.instructions[0].text, "step1");
    assert_eq!(loaded.instructions[1].step, 1);
    assert_eq!(loaded.instructions[1].text, "step2");
    assert!(loaded.ingredients.is_empty());
}

#[test]
fn save_then_get_returns_every_instruction_and_line() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);

    let draft = RecipeDraft::new(AuthorRef::Name("james".to_string()), "Comfort Pasta")
        .with_instructions([
            "Do something",
            "Do something else",
            "Do something else again!",
        ])
        .with_ingredient(IngredientDraft::new("rice", "Rice Aisle", 1, "cup").prepared("steamed"))
        .with_ingredient(
            IngredientDraft::new("butter", "Dairy", 30, "g")
                .measured()
                .prepared("softened"),
        );
    let saved = cookbook.save_recipe_draft(&draft).unwrap();

    let loaded = cookbook.get_recipe(saved.id()).unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(
        loaded.instruction_texts(),
        vec!["Do something", "Do something else", "Do something else again!"]
    );

    let lines = loaded.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].ingredient.name, "rice");
    assert_eq!(lines[0].aisle.name, "Rice Aisle");
    assert_eq!(lines[0].unit.name, "cup");
    assert!(!lines[0].unit.is_measurement);
    assert_eq!(lines[0].entry.quantity, 1);
    assert_eq!(lines[0].entry.preparation, "steamed");
    assert_eq!(lines[1].ingredient.name, "butter");
    assert!(lines[1].unit.is_measurement);
    assert_eq!(lines[1].entry.quantity, 30);
}

#[test]
fn shared_ingredient_is_stored_once() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);
    let james = cookbook.save_user("james").unwrap();

    let curry = RecipeDraft::new(AuthorRef::Id(james.id), "Simple Curry")
        .with_ingredient(IngredientDraft::new("rice", "Rice Aisle", 2, "cup"));
    let risotto = RecipeDraft::new(AuthorRef::Id(james.id), "Risotto")
        .with_ingredient(IngredientDraft::new("rice", "Rice Aisle", 1, "cup").prepared("rinsed"));

    let curry = cookbook.save_recipe_draft(&curry).unwrap();
    let risotto = cookbook.save_recipe_draft(&risotto).unwrap();

    assert_eq!(count(&conn, "ingredients"), 1);
    assert_eq!(count(&conn, "aisles"), 1);
    assert_eq!(count(&conn, "units"), 1);
    assert_eq!(
        curry.ingredients[0].ingredient_id,
        risotto.ingredients[0].ingredient_id
    );
}

#[test]
fn known_ingredient_under_another_aisle_adds_no_aisle() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);
    let james = cookbook.save_user("james").unwrap();

    let curry = RecipeDraft::new(AuthorRef::Id(james.id), "Simple Curry")
        .with_ingredient(IngredientDraft::new("rice", "Rice Aisle", 2, "cup"));
    let pilaf = RecipeDraft::new(AuthorRef::Id(james.id), "Pilaf")
        .with_ingredient(IngredientDraft::new("rice", "Grains", 1, "cup"));

    cookbook.save_recipe_draft(&curry).unwrap();
    let pilaf = cookbook.save_recipe_draft(&pilaf).unwrap();

    assert_eq!(count(&conn, "aisles"), 1);
    assert_eq!(pilaf.lines()[0].aisle.name, "Rice Aisle");
}

#[test]
fn author_by_name_reuses_existing_user() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);
    let james = cookbook.save_user("james").unwrap();

    let saved = cookbook
        .save_recipe_draft(&RecipeDraft::new(
            AuthorRef::Name("james".to_string()),
            "Toast",
        ))
        .unwrap();

    assert_eq!(saved.recipe.author_id, james.id);
    assert_eq!(count(&conn, "users"), 1);
}

#[test]
fn instructions_come_back_in_step_order() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);
    let james = cookbook.save_user("james").unwrap();
    let saved = cookbook
        .save_recipe(james.id, "Scrambled", &[] as &[&str])
        .unwrap();

    for (step, text) in [(2, "serve"), (0, "crack eggs"), (1, "stir")] {
        conn.execute(
            "INSERT INTO instructions (recipe_id, step, text) VALUES (?1, ?2, ?3);",
            rusqlite::params![saved.id(), step, text],
        )
        .unwrap();
    }

    let loaded = cookbook.get_recipe(saved.id()).unwrap();
    assert_eq!(loaded.instruction_texts(), vec!["crack eggs", "stir", "serve"]);
    let steps: Vec<i64> = loaded.instructions.iter().map(|i| i.step).collect();
    assert_eq!(steps, vec![0, 1, 2]);
}

#[test]
fn negative_quantity_is_rejected_without_writes() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);
    let james = cookbook.save_user("james").unwrap();

    let draft = RecipeDraft::new(AuthorRef::Id(james.id), "Bad Bread")
        .with_instructions(["knead"])
        .with_ingredient(IngredientDraft::new("flour", "Baking", -1, "g"));
    let err = cookbook.save_recipe_draft(&draft).unwrap_err();

    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::NegativeQuantity { quantity: -1, .. })
    ));
    assert_eq!(err.kind(), FailureKind::Validation);
    assert!(cookbook.find_recipes().unwrap().is_empty());
    for table in ["recipes", "instructions", "ingredients", "aisles", "units"] {
        assert_eq!(count(&conn, table), 0, "{table} should be empty");
    }
}

#[test]
fn unknown_author_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);

    let err = cookbook
        .save_recipe(77, "Ghost Soup", &["boil"])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::UnknownAuthor(77))
    ));
    assert_eq!(count(&conn, "recipes"), 0);
}

#[test]
fn get_recipe_on_unknown_id_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);

    let err = cookbook.get_recipe(12).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(12)));
    assert_eq!(err.kind(), FailureKind::NotFound);
}

#[test]
fn deleting_a_recipe_removes_owned_rows_only() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);
    let draft = RecipeDraft::new(AuthorRef::Name("james".to_string()), "Salad sandwich")
        .with_instructions(["Hey"])
        .with_ingredient(IngredientDraft::new("lettuce", "Produce", 2, "leaf"));
    let saved = cookbook.save_recipe_draft(&draft).unwrap();

    cookbook.delete_recipe(saved.id()).unwrap();

    assert!(matches!(
        cookbook.get_recipe(saved.id()),
        Err(RepoError::NotFound(id)) if id == saved.id()
    ));
    assert_eq!(count(&conn, "instructions"), 0);
    assert_eq!(count(&conn, "recipe_ingredients"), 0);
    assert_eq!(count(&conn, "ingredients"), 1);
    assert_eq!(count(&conn, "users"), 1);
    assert!(matches!(
        cookbook.delete_recipe(saved.id()),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn deleted_ids_are_not_reused() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);
    let james = cookbook.save_user("james").unwrap();

    let first = cookbook.save_recipe(james.id, "One", &["a"]).unwrap();
    cookbook.delete_recipe(first.id()).unwrap();
    let second = cookbook.save_recipe(james.id, "Two", &["b"]).unwrap();

    assert!(second.id() > first.id());
    assert!(matches!(
        cookbook.get_recipe(first.id()),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn resaving_replaces_children() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);
    let draft = RecipeDraft::new(AuthorRef::Name("steve".to_string()), "Simple Curry")
        .with_instructions(["step1", "step 2", "step3"])
        .with_ingredient(IngredientDraft::new("rice", "Grains", 1, "cup"))
        .with_ingredient(IngredientDraft::new("curry paste", "World Foods", 2, "tbsp"));
    let saved = cookbook.save_recipe_draft(&draft).unwrap();

    let mut edit = draft.clone();
    edit.id = Some(saved.id());
    edit.name = "Simpler Curry".to_string();
    edit.instructions = vec!["cook everything".to_string()];
    edit.ingredients = vec![IngredientDraft::new("curry paste", "World Foods", 3, "tbsp")];
    let updated = cookbook.save_recipe_draft(&edit).unwrap();

    assert_eq!(updated.id(), saved.id());
    assert_eq!(updated.recipe.name, "Simpler Curry");
    assert_eq!(updated.instruction_texts(), vec!["cook everything"]);
    assert_eq!(updated.instructions[0].step, 0);
    let lines = updated.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].ingredient.name, "curry paste");
    assert_eq!(lines[0].entry.quantity, 3);
    assert_eq!(count(&conn, "recipes"), 1);
    assert_eq!(count(&conn, "instructions"), 1);
    // Catalog rows outlive the lines that referenced them.
    assert_eq!(count(&conn, "ingredients"), 2);
}

#[test]
fn updating_missing_recipe_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);

    let mut draft = RecipeDraft::new(AuthorRef::Name("james".to_string()), "Phantom");
    draft.id = Some(5);
    let err = cookbook.save_recipe_draft(&draft).unwrap_err();

    assert!(matches!(err, RepoError::NotFound(5)));
    // The author upsert ran inside the rolled-back transaction.
    assert_eq!(count(&conn, "users"), 0);
}

#[test]
fn storage_failure_mid_save_leaves_nothing_behind() {
    let conn = open_db_in_memory().unwrap();
    let cookbook = service(&conn);
    let james = cookbook.save_user("james").unwrap();
    conn.execute_batch("DROP TABLE recipe_ingredients;").unwrap();

    let draft = RecipeDraft::new(AuthorRef::Id(james.id), "Doomed Stew")
        .with_instructions(["chop", "simmer"])
        .with_ingredient(IngredientDraft::new("carrot", "Produce", 2, "whole"));
    let err = cookbook.save_recipe_draft(&draft).unwrap_err();

    assert_eq!(err.kind(), FailureKind::Storage);
    assert_eq!(count(&conn, "recipes"), 0);
    assert_eq!(count(&conn, "instructions"), 0);
}
