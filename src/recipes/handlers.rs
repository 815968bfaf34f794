use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::{AuthUser, MaybeAuthUser},
    error::{ApiError, ApiJson},
    recipes::{
        dto::{ListParams, RecipeBody, RecipeResponse},
        policy::{self, Operation},
        repo,
    },
    state::AppState,
};

/// Cache key for the default published listing. There is exactly one cached
/// listing; every mutation drops it whole.
pub const RECIPE_LIST_CACHE_KEY: &str = "recipe_list";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/mine", get(my_recipes))
        .route(
            "/recipes/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
}

/// Only the bare default listing is cached; any filter or non-default
/// ordering goes straight to the database.
fn cacheable_listing(params: &ListParams, max_cook_time: Option<i32>) -> bool {
    params.search().is_none() && max_cook_time.is_none() && params.default_ordering()
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let max_cook_time = params.max_cook_time()?;
    let cacheable = cacheable_listing(&params, max_cook_time);

    if cacheable {
        if let Some(cached) = state.cache.get(RECIPE_LIST_CACHE_KEY).await {
            debug!("recipe list served from cache");
            return Ok(Json(cached));
        }
    }

    let rows = repo::list_published(
        &state.db,
        params.search(),
        max_cook_time,
        params.newest_first(),
    )
    .await?;
    let payload: Vec<RecipeResponse> = rows.into_iter().map(RecipeResponse::from).collect();
    let data = serde_json::to_value(&payload)?;

    if cacheable {
        state
            .cache
            .set(
                RECIPE_LIST_CACHE_KEY,
                data.clone(),
                Duration::from_secs(state.config.list_cache_ttl_secs),
            )
            .await;
        debug!("recipe list cached");
    }

    Ok(Json(data))
}

#[instrument(skip(state, user))]
pub async fn my_recipes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<RecipeResponse>>, ApiError> {
    let rows = repo::list_by_author(&state.db, user.id).await?;
    Ok(Json(rows.into_iter().map(RecipeResponse::from).collect()))
}

#[instrument(skip(state, user, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<RecipeBody>,
) -> Result<(StatusCode, Json<RecipeResponse>), ApiError> {
    payload.validate()?;
    let recipe = repo::insert(&state.db, user.id, &payload).await?;

    // Invalidate only after the row is durable, otherwise a racing reader
    // could re-cache the pre-insert listing.
    state.cache.invalidate(RECIPE_LIST_CACHE_KEY).await;

    info!(recipe_id = %recipe.id, author_id = %user.id, "recipe created");
    Ok((StatusCode::CREATED, Json(RecipeResponse::from(recipe))))
}

#[instrument(skip(state, actor))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(actor): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let actor_id = actor.as_ref().map(|u| u.id);
    let recipe = repo::find_visible(&state.db, id, actor_id)
        .await?
        .filter(|r| policy::allows(actor_id, r, Operation::Read))
        .ok_or(ApiError::NotFound)?;
    Ok(Json(RecipeResponse::from(recipe)))
}

#[instrument(skip(state, user, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<RecipeBody>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let existing = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    // Non-authors get the same 404 as a missing recipe, so the response
    // never confirms that someone else's recipe exists.
    if !policy::allows(Some(user.id), &existing, Operation::Write) {
        warn!(recipe_id = %id, actor = %user.id, "write denied");
        return Err(ApiError::NotFound);
    }
    payload.validate()?;

    let updated = repo::update(&state.db, id, user.id, &payload)
        .await?
        .ok_or(ApiError::NotFound)?;
    state.cache.invalidate(RECIPE_LIST_CACHE_KEY).await;

    info!(recipe_id = %id, "recipe updated");
    Ok(Json(RecipeResponse::from(updated)))
}

#[instrument(skip(state, user))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let existing = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !policy::allows(Some(user.id), &existing, Operation::Write) {
        warn!(recipe_id = %id, actor = %user.id, "delete denied");
        return Err(ApiError::NotFound);
    }

    if !repo::soft_delete(&state.db, id, user.id).await? {
        return Err(ApiError::NotFound);
    }
    state.cache.invalidate(RECIPE_LIST_CACHE_KEY).await;

    info!(recipe_id = %id, "recipe soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}
