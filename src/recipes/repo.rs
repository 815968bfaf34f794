use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::recipes::dto::RecipeBody;

/// Recipe row joined with its author's username. `is_publish` doubles as
/// the soft-delete flag: deleting a recipe just unpublishes it.
#[derive(Debug, Clone, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author: String,
    pub name: String,
    pub description: String,
    pub num_of_servings: i32,
    pub cook_time: i32,
    pub directions: String,
    pub is_publish: bool,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Published recipes, optionally narrowed by a search term and a cook time
/// ceiling. The search matches name or description, case-insensitively.
pub async fn list_published(
    db: &PgPool,
    search: Option<&str>,
    max_cook_time: Option<i32>,
    newest_first: bool,
) -> anyhow::Result<Vec<Recipe>> {
    let direction = if newest_first { "DESC" } else { "ASC" };
    let sql = format!(
        r#"
        SELECT r.id, r.author_id, u.username AS author, r.name, r.description,
               r.num_of_servings, r.cook_time, r.directions, r.is_publish,
               r.image, r.created_at, r.updated_at
        FROM recipes r
        JOIN users u ON u.id = r.author_id
        WHERE r.is_publish = TRUE
          AND ($1::text IS NULL OR r.name ILIKE $1 OR r.description ILIKE $1)
          AND ($2::int4 IS NULL OR r.cook_time <= $2)
        ORDER BY r.updated_at {direction}
        "#
    );
    let pattern = search.map(like_pattern);
    let rows = sqlx::query_as::<_, Recipe>(&sql)
        .bind(pattern)
        .bind(max_cook_time)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Everything the author owns, drafts and soft-deleted rows included.
pub async fn list_by_author(db: &PgPool, author_id: Uuid) -> anyhow::Result<Vec<Recipe>> {
    let rows = sqlx::query_as::<_, Recipe>(
        r#"
        SELECT r.id, r.author_id, u.username AS author, r.name, r.description,
               r.num_of_servings, r.cook_time, r.directions, r.is_publish,
               r.image, r.created_at, r.updated_at
        FROM recipes r
        JOIN users u ON u.id = r.author_id
        WHERE r.author_id = $1
        ORDER BY r.updated_at DESC
        "#,
    )
    .bind(author_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Single recipe as seen by `actor`: published rows are visible to anyone,
/// unpublished ones only to their author. An invisible row comes back as
/// `None`, indistinguishable from a missing one.
pub async fn find_visible(
    db: &PgPool,
    id: Uuid,
    actor: Option<Uuid>,
) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(
        r#"
        SELECT r.id, r.author_id, u.username AS author, r.name, r.description,
               r.num_of_servings, r.cook_time, r.directions, r.is_publish,
               r.image, r.created_at, r.updated_at
        FROM recipes r
        JOIN users u ON u.id = r.author_id
        WHERE r.id = $1 AND (r.is_publish = TRUE OR r.author_id = $2)
        "#,
    )
    .bind(id)
    .bind(actor)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(
        r#"
        SELECT r.id, r.author_id, u.username AS author, r.name, r.description,
               r.num_of_servings, r.cook_time, r.directions, r.is_publish,
               r.image, r.created_at, r.updated_at
        FROM recipes r
        JOIN users u ON u.id = r.author_id
        WHERE r.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn insert(db: &PgPool, author_id: Uuid, body: &RecipeBody) -> anyhow::Result<Recipe> {
    let row = sqlx::query_as::<_, Recipe>(
        r#"
        WITH inserted AS (
            INSERT INTO recipes
                (author_id, name, description, num_of_servings, cook_time,
                 directions, is_publish, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, author_id, name, description, num_of_servings,
                      cook_time, directions, is_publish, image,
                      created_at, updated_at
        )
        SELECT r.id, r.author_id, u.username AS author, r.name, r.description,
               r.num_of_servings, r.cook_time, r.directions, r.is_publish,
               r.image, r.created_at, r.updated_at
        FROM inserted r
        JOIN users u ON u.id = r.author_id
        "#,
    )
    .bind(author_id)
    .bind(&body.name)
    .bind(&body.description)
    .bind(body.num_of_servings)
    .bind(body.cook_time)
    .bind(&body.directions)
    .bind(body.is_publish)
    .bind(body.image.as_deref())
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// Full-row update scoped to the author. `None` means no row matched the
/// id/author pair, which callers surface the same way as a missing recipe.
pub async fn update(
    db: &PgPool,
    id: Uuid,
    author_id: Uuid,
    body: &RecipeBody,
) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(
        r#"
        WITH updated AS (
            UPDATE recipes
            SET name = $3, description = $4, num_of_servings = $5,
                cook_time = $6, directions = $7, is_publish = $8,
                image = $9, updated_at = now()
            WHERE id = $1 AND author_id = $2
            RETURNING id, author_id, name, description, num_of_servings,
                      cook_time, directions, is_publish, image,
                      created_at, updated_at
        )
        SELECT r.id, r.author_id, u.username AS author, r.name, r.description,
               r.num_of_servings, r.cook_time, r.directions, r.is_publish,
               r.image, r.created_at, r.updated_at
        FROM updated r
        JOIN users u ON u.id = r.author_id
        "#,
    )
    .bind(id)
    .bind(author_id)
    .bind(&body.name)
    .bind(&body.description)
    .bind(body.num_of_servings)
    .bind(body.cook_time)
    .bind(&body.directions)
    .bind(body.is_publish)
    .bind(body.image.as_deref())
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Soft delete: unpublish the row but keep it for the author. Returns
/// whether a row matched the id/author pair.
pub async fn soft_delete(db: &PgPool, id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE recipes
        SET is_publish = FALSE, updated_at = now()
        WHERE id = $1 AND author_id = $2
        "#,
    )
    .bind(id)
    .bind(author_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Wraps a search term for ILIKE, escaping the wildcard characters so the
/// term is matched literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
