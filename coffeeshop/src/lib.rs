//! A catalog of drinks and their recipes, guarded by Auth0 bearer tokens
//!
//! Anyone may list the drinks with their ingredients' colors and
//! proportions. Seeing ingredient names, and adding, changing, or removing
//! drinks, each require a permission granted in the caller's access token.
//!
//! ```no_run
//! # async fn run(validator: barista_oauth2::TokenValidator) -> color_eyre::Result<()> {
//! use coffeeshop::{routes, store::DrinkRepository};
//!
//! let drinks = DrinkRepository::connect("sqlite://database.db?mode=rwc").await?;
//! let app = routes::router(drinks, validator);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod routes;
pub mod shutdown;
pub mod store;

pub use crate::config::Config;
pub use crate::error::{ApiError, ErrorMapper};
pub use crate::store::{DrinkRepository, RepositoryError};
