use sqlx::{SqliteConnection, SqlitePool};

use crate::{errors::RequestError, models::Category};

pub async fn list_categories_in_db(pool: &SqlitePool) -> Result<Vec<Category>, RequestError> {
    let categories =
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name, id")
            .fetch_all(pool)
            .await?;
    Ok(categories)
}

pub async fn get_category_by_id_in_db(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Category>, RequestError> {
    let category = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(category)
}

pub async fn insert_category_in_db(
    pool: &SqlitePool,
    name: &str,
) -> Result<Category, RequestError> {
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name) VALUES ($1) RETURNING id, name",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        RequestError::from(e).on_unique_violation(
            "categories.name",
            "name",
            "A category with this name already exists.",
        )
    })?;
    Ok(category)
}

pub async fn find_category_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Category>, RequestError> {
    let category = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(category)
}
