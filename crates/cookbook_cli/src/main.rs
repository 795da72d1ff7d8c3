//! Command-line entry point for a cookbook database.
//!
//! # Responsibility
//! - Open (and migrate) the database named by `--db`.
//! - Route subcommands to the core `CookbookService`.

use clap::{Parser, Subcommand};
use cookbook_core::db::open_db;
use cookbook_core::{
    default_log_level, init_logging, CookbookService, LoggingConfig, RecipeAggregate, RecipeQuery,
    SqliteRecipeRepository,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cookbook", version, about = "Store and browse cookbook recipes")]
struct Cli {
    /// SQLite database file
    #[arg(long, default_value = "cookbook.sqlite3", global = true)]
    db: PathBuf,

    /// Absolute directory for log files (logging is off when omitted)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert the demo users and recipes
    Seed,

    /// Create a user (or print the existing one)
    AddUser {
        name: String,
    },

    /// Print one recipe
    Show {
        id: i64,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print every recipe, ascending by id
    List {
        /// Only recipes by this user id
        #[arg(long)]
        author: Option<i64>,
        #[arg(long)]
        json: bool,
    },

    /// Delete one recipe and its instructions and ingredient lines
    Delete {
        id: i64,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_ref() {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        init_logging(&LoggingConfig::new(level, log_dir)?)?;
    }

    let conn = open_db(&cli.db)?;
    let cookbook = CookbookService::new(SqliteRecipeRepository::try_new(&conn)?);

    match cli.command {
        Command::Seed => seed(&cookbook)?,
        Command::AddUser { name } => {
            let user = cookbook.save_user(&name)?;
            println!("user {} {}", user.id, user.name);
        }
        Command::Show { id, json } => {
            let recipe = cookbook.get_recipe(id)?;
            print_recipes(std::slice::from_ref(&recipe), json)?;
        }
        Command::List { author, json } => {
            let recipes = cookbook.find_recipes_matching(&RecipeQuery {
                author_id: author,
                ..RecipeQuery::default()
            })?;
            print_recipes(&recipes, json)?;
        }
        Command::Delete { id } => {
            cookbook.delete_recipe(id)?;
            println!("deleted recipe {id}");
        }
    }
    Ok(())
}

fn seed(cookbook: &CookbookService<SqliteRecipeRepository<'_>>) -> Result<(), Box<dyn Error>> {
    let james = cookbook.save_user("james")?;
    let steve = cookbook.save_user("steve")?;
    let pasta = cookbook.save_recipe(james.id, "Comfort Pasta", &["step1", "step2"])?;
    let curry = cookbook.save_recipe(steve.id, "Simple Curry", &["step1", "step 2", "step3"])?;
    info!(
        "event=seed module=cli status=ok recipes={},{}",
        pasta.id(),
        curry.id()
    );
    println!("seeded recipes {} and {}", pasta.id(), curry.id());
    Ok(())
}

fn print_recipes(recipes: &[RecipeAggregate], json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(recipes)?);
        return Ok(());
    }

    for recipe in recipes {
        let author = recipe
            .author
            .as_ref()
            .map_or("unknown", |user| user.name.as_str());
        println!("#{} {} (by {author})", recipe.id(), recipe.recipe.name);
        for line in recipe.lines() {
            let amount = if line.unit.is_measurement {
                format!("{}{}", line.entry.quantity, line.unit.name)
            } else {
                format!("{} {}", line.entry.quantity, line.unit.name)
            };
            if line.entry.preparation.is_empty() {
                println!("  - {amount} {}", line.ingredient.name);
            } else {
                println!(
                    "  - {amount} {}, {}",
                    line.ingredient.name, line.entry.preparation
                );
            }
        }
        for instruction in &recipe.instructions {
            println!("  {}. {}", instruction.step + 1, instruction.text);
        }
    }
    Ok(())
}
