//! HTTP routes
//!
//! | Method   | Path             | Permission          |
//! |----------|------------------|---------------------|
//! | `GET`    | `/`              |                     |
//! | `GET`    | `/drinks`        |                     |
//! | `GET`    | `/drinks-detail` | `get:drinks-detail` |
//! | `POST`   | `/drinks`        | `post:drinks`       |
//! | `PATCH`  | `/drinks/:id`    | `patch:drinks`      |
//! | `DELETE` | `/drinks/:id`    | `delete:drinks`     |
//!
//! Each protected handler is wrapped first in a permission layer and then in
//! a JWT layer, so the token is verified before the permission is checked
//! and neither failure reaches the handler.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    handler::Handler,
    routing::{get, patch, MethodRouter},
    Extension, Json, Router,
};
use barista::jwt::CoreClaims;
use barista_oauth2::{Claims, Permission, TokenValidator};
use barista_tower::Authorizer;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::{
    error::{ApiError, ErrorMapper, NOT_FOUND},
    model::{Drink, DrinkId, DrinkInput, ShortDrink},
    store::DrinkRepository,
};

/// Required to see full recipes
pub const GET_DRINKS_DETAIL: &str = "get:drinks-detail";
/// Required to add drinks
pub const POST_DRINKS: &str = "post:drinks";
/// Required to change drinks
pub const PATCH_DRINKS: &str = "patch:drinks";
/// Required to remove drinks
pub const DELETE_DRINKS: &str = "delete:drinks";

/// Greeting served at the root
pub const WELCOME: &str = "Welcome to the Coffee Shop";

/// Builds the application
pub fn router(drinks: DrinkRepository, validator: TokenValidator) -> Router {
    let authorizer = Authorizer::new(validator).with_error_handler(ErrorMapper);
    let guard = |permission: &'static str| {
        authorizer.permission_layer(Permission::from_static(permission))
    };

    let detail = list_drinks_detail
        .layer(guard(GET_DRINKS_DETAIL))
        .layer(authorizer.jwt_layer());
    let create = create_drink
        .layer(guard(POST_DRINKS))
        .layer(authorizer.jwt_layer());
    let update = update_drink
        .layer(guard(PATCH_DRINKS))
        .layer(authorizer.jwt_layer());
    let delete = delete_drink
        .layer(guard(DELETE_DRINKS))
        .layer(authorizer.jwt_layer());

    Router::new()
        .route("/", resource(get(index)))
        .route("/drinks", resource(get(list_drinks).post(create)))
        .route("/drinks-detail", resource(get(detail)))
        .route("/drinks/:id", resource(patch(update).delete(delete)))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(drinks)
}

fn resource(methods: MethodRouter<DrinkRepository>) -> MethodRouter<DrinkRepository> {
    methods.fallback(method_not_allowed)
}

#[derive(Serialize)]
struct DrinksResponse<T> {
    success: bool,
    drinks: Vec<T>,
}

impl<T> DrinksResponse<T> {
    fn new(drinks: Vec<T>) -> Json<Self> {
        Json(Self {
            success: true,
            drinks,
        })
    }
}

#[derive(Serialize)]
struct DeletedResponse {
    success: bool,
    delete: DrinkId,
}

async fn index() -> &'static str {
    WELCOME
}

async fn list_drinks(
    State(drinks): State<DrinkRepository>,
) -> Result<Json<DrinksResponse<ShortDrink>>, ApiError> {
    Ok(DrinksResponse::new(drinks.list().await?))
}

async fn list_drinks_detail(
    State(drinks): State<DrinkRepository>,
) -> Result<Json<DrinksResponse<Drink>>, ApiError> {
    Ok(DrinksResponse::new(drinks.list_detailed().await?))
}

async fn create_drink(
    State(drinks): State<DrinkRepository>,
    Extension(claims): Extension<Claims>,
    input: Result<Json<DrinkInput>, JsonRejection>,
) -> Result<Json<DrinksResponse<Drink>>, ApiError> {
    let new = body(input)?.into_new_drink()?;
    let drink = drinks.create(new).await?;

    tracing::info!(drink.id = %drink.id, sub = ?claims.sub(), "drink added");
    Ok(DrinksResponse::new(vec![drink]))
}

async fn update_drink(
    State(drinks): State<DrinkRepository>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<DrinkId>, PathRejection>,
    input: Result<Json<DrinkInput>, JsonRejection>,
) -> Result<Json<DrinksResponse<Drink>>, ApiError> {
    let id = drink_id(id)?;
    let patch = body(input)?.into_patch()?;
    let drink = drinks.update(id, patch).await?;

    tracing::info!(drink.id = %drink.id, sub = ?claims.sub(), "drink changed");
    Ok(DrinksResponse::new(vec![drink]))
}

async fn delete_drink(
    State(drinks): State<DrinkRepository>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<DrinkId>, PathRejection>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = drinks.delete(drink_id(id)?).await?;

    tracing::info!(drink.id = %id, sub = ?claims.sub(), "drink removed");
    Ok(Json(DeletedResponse {
        success: true,
        delete: id,
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound(NOT_FOUND.to_owned())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn body(input: Result<Json<DrinkInput>, JsonRejection>) -> Result<DrinkInput, ApiError> {
    match input {
        Ok(Json(input)) => Ok(input),
        Err(rejection) => {
            tracing::debug!(
                status = rejection.status().as_u16(),
                "rejected request body: {rejection}"
            );
            Err(ApiError::Validation(format!(
                "Invalid input data. ({})",
                rejection.body_text()
            )))
        }
    }
}

// Ids that are not integers match no drink
fn drink_id(id: Result<Path<DrinkId>, PathRejection>) -> Result<DrinkId, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound(NOT_FOUND.to_owned()))
}
