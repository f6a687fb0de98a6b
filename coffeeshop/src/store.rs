//! SQLite persistence for drinks
//!
//! Recipes are stored as a JSON array in the `recipe` column. Every change
//! runs in its own transaction, and title uniqueness is enforced by the
//! table's `UNIQUE` constraint so that concurrent writers cannot both claim
//! the same title.

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    FromRow,
};
use thiserror::Error;

use crate::model::{Drink, DrinkId, DrinkPatch, NewDrink, Recipe, ShortDrink};

const ACCESS_FAILED: &str = "Unexpected error accessing the database.";
const INSERT_FAILED: &str = "Unexpected error inserting the drink into the database.";
const UPDATE_FAILED: &str = "Unexpected error updating the database.";
const DELETE_FAILED: &str = "Unexpected error deleting the drink from the database.";

const NO_DRINKS: &str = "There are no drinks";
const UNKNOWN_ID: &str = "id not found in the database.";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS drink (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT(80) NOT NULL UNIQUE,
    recipe TEXT(180) NOT NULL
)";

const SAMPLE_DRINKS: &[(&str, &str)] = &[
    (
        "White Coffee",
        r#"[{"name": "coffee", "color": "black", "parts": 1}, {"name": "milk", "color": "white", "parts": 3}]"#,
    ),
    (
        "White Coffee2",
        r#"[{"name": "coffee2", "color": "black2", "parts": 2}, {"name": "milk2", "color": "white2", "parts": 4}]"#,
    ),
];

/// A drink operation failed
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The drink, or any drink at all, does not exist
    #[error("{0}")]
    NotFound(&'static str),

    /// The requested title belongs to another drink
    #[error("{0}")]
    Conflict(String),

    /// The database failed
    #[error("{context}")]
    Storage {
        /// What was being attempted, safe to show to the client
        context: &'static str,
        /// The underlying failure
        #[source]
        source: sqlx::Error,
    },
}

fn storage(context: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |source| RepositoryError::Storage { context, source }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|err| err.is_unique_violation())
}

fn encode(recipe: &Recipe) -> Result<String, sqlx::Error> {
    serde_json::to_string(recipe).map_err(|err| sqlx::Error::Encode(Box::new(err)))
}

#[derive(FromRow)]
struct DrinkRow {
    id: i64,
    title: String,
    recipe: String,
}

impl TryFrom<DrinkRow> for Drink {
    type Error = sqlx::Error;

    fn try_from(row: DrinkRow) -> Result<Self, Self::Error> {
        let recipe = serde_json::from_str(&row.recipe).map_err(|err| {
            let message = format!("malformed recipe stored for drink {}: {err}", row.id);
            sqlx::Error::Decode(message.into())
        })?;

        Ok(Drink {
            id: DrinkId::new(row.id),
            title: row.title,
            recipe,
        })
    }
}

/// The drinks on the menu
#[derive(Clone, Debug)]
pub struct DrinkRepository {
    pool: SqlitePool,
}

impl DrinkRepository {
    /// Wraps an existing pool
    ///
    /// The schema is not created; see [`create_schema`](Self::create_schema).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url` and creates the schema if missing
    ///
    /// # Errors
    ///
    /// Fails if the URL is invalid, the database cannot be opened, or the
    /// schema cannot be created.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let repo = Self::new(pool);
        repo.create_schema().await?;
        Ok(repo)
    }

    /// Opens a private in-memory database with the schema in place
    ///
    /// The pool holds a single connection that is never recycled, since the
    /// database disappears with it.
    ///
    /// # Errors
    ///
    /// Fails if SQLite cannot be opened.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self::new(pool);
        repo.create_schema().await?;
        Ok(repo)
    }

    /// Creates the `drink` table if it does not exist
    ///
    /// # Errors
    ///
    /// Fails if the statement cannot be executed.
    pub async fn create_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Drops all drinks and replaces them with the sample drinks
    ///
    /// # Errors
    ///
    /// Fails if any statement fails, in which case nothing is changed.
    pub async fn reset_with_samples(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DROP TABLE IF EXISTS drink")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;

        for &(title, recipe) in SAMPLE_DRINKS {
            sqlx::query("INSERT INTO drink (title, recipe) VALUES (?, ?)")
                .bind(title)
                .bind(recipe)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(drinks = SAMPLE_DRINKS.len(), "database reset with sample drinks");
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Drink>, RepositoryError> {
        let rows = sqlx::query_as::<_, DrinkRow>("SELECT id, title, recipe FROM drink ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage(ACCESS_FAILED))?;

        if rows.is_empty() {
            return Err(RepositoryError::NotFound(NO_DRINKS));
        }

        rows.into_iter()
            .map(Drink::try_from)
            .collect::<Result<_, _>>()
            .map_err(storage(ACCESS_FAILED))
    }

    /// Every drink, without ingredient names
    ///
    /// # Errors
    ///
    /// Having no drinks at all is reported as [`RepositoryError::NotFound`].
    pub async fn list(&self) -> Result<Vec<ShortDrink>, RepositoryError> {
        Ok(self.all().await?.iter().map(Drink::short).collect())
    }

    /// Every drink, with full recipes
    ///
    /// # Errors
    ///
    /// Having no drinks at all is reported as [`RepositoryError::NotFound`].
    pub async fn list_detailed(&self) -> Result<Vec<Drink>, RepositoryError> {
        self.all().await
    }

    /// Adds a drink to the menu
    ///
    /// # Errors
    ///
    /// Fails with [`RepositoryError::Conflict`] if the title is taken.
    pub async fn create(&self, new: NewDrink) -> Result<Drink, RepositoryError> {
        let recipe = encode(&new.recipe).map_err(storage(INSERT_FAILED))?;

        let mut tx = self.pool.begin().await.map_err(storage(INSERT_FAILED))?;

        let inserted = sqlx::query("INSERT INTO drink (title, recipe) VALUES (?, ?)")
            .bind(&new.title)
            .bind(&recipe)
            .execute(&mut *tx)
            .await;

        let id = match inserted {
            Ok(done) => DrinkId::new(done.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => {
                return Err(RepositoryError::Conflict(format!(
                    "Cannot add '{}'. That drink already exists.",
                    new.title
                )));
            }
            Err(err) => return Err(storage(INSERT_FAILED)(err)),
        };

        tx.commit().await.map_err(storage(INSERT_FAILED))?;
        tracing::debug!(drink.id = %id, "drink created");

        Ok(Drink {
            id,
            title: new.title,
            recipe: new.recipe,
        })
    }

    /// Changes the supplied fields of a drink, leaving the others as they are
    ///
    /// Fields are merged in the database, so concurrent changes to different
    /// fields of the same drink are all kept.
    ///
    /// # Errors
    ///
    /// Fails with [`RepositoryError::NotFound`] if there is no such drink, or
    /// [`RepositoryError::Conflict`] if the new title belongs to another drink.
    pub async fn update(&self, id: DrinkId, patch: DrinkPatch) -> Result<Drink, RepositoryError> {
        let recipe = patch
            .recipe
            .as_ref()
            .map(encode)
            .transpose()
            .map_err(storage(UPDATE_FAILED))?;

        let mut tx = self.pool.begin().await.map_err(storage(UPDATE_FAILED))?;

        let updated = sqlx::query(
            "UPDATE drink SET title = COALESCE(?, title), recipe = COALESCE(?, recipe) WHERE id = ?",
        )
        .bind(patch.title.as_deref())
        .bind(recipe.as_deref())
        .bind(id.get())
        .execute(&mut *tx)
        .await;

        match updated {
            Ok(done) if done.rows_affected() == 0 => {
                return Err(RepositoryError::NotFound(UNKNOWN_ID));
            }
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(RepositoryError::Conflict(format!(
                    "Cannot rename to '{}'. That drink already exists.",
                    patch.title.as_deref().unwrap_or_default()
                )));
            }
            Err(err) => return Err(storage(UPDATE_FAILED)(err)),
        }

        let row = sqlx::query_as::<_, DrinkRow>("SELECT id, title, recipe FROM drink WHERE id = ?")
            .bind(id.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(storage(UPDATE_FAILED))?;

        tx.commit().await.map_err(storage(UPDATE_FAILED))?;
        tracing::debug!(drink.id = %id, "drink updated");

        Drink::try_from(row).map_err(storage(UPDATE_FAILED))
    }

    /// Removes a drink from the menu
    ///
    /// # Errors
    ///
    /// Fails with [`RepositoryError::NotFound`] if there is no such drink.
    pub async fn delete(&self, id: DrinkId) -> Result<DrinkId, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(storage(DELETE_FAILED))?;

        let done = sqlx::query("DELETE FROM drink WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(storage(DELETE_FAILED))?;

        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(UNKNOWN_ID));
        }

        tx.commit().await.map_err(storage(DELETE_FAILED))?;
        tracing::debug!(drink.id = %id, "drink deleted");

        Ok(id)
    }

    /// Closes every connection in the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
