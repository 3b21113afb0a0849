use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::{errors::RequestError, models::Tag};

pub async fn list_tags_in_db(pool: &SqlitePool) -> Result<Vec<Tag>, RequestError> {
    let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name, id")
        .fetch_all(pool)
        .await?;
    Ok(tags)
}

pub async fn get_tag_by_id_in_db(pool: &SqlitePool, id: i64) -> Result<Option<Tag>, RequestError> {
    let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(tag)
}

pub async fn insert_tag_in_db(pool: &SqlitePool, name: &str) -> Result<Tag, RequestError> {
    let tag = sqlx::query_as::<_, Tag>("INSERT INTO tags (name) VALUES ($1) RETURNING id, name")
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            RequestError::from(e).on_unique_violation(
                "tags.name",
                "name",
                "A tag with this name already exists.",
            )
        })?;
    Ok(tag)
}

/// Tags whose names are in `names`. Names with no tag are simply absent.
pub async fn find_tags_by_names(
    conn: &mut SqliteConnection,
    names: &[String],
) -> Result<Vec<Tag>, RequestError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = sqlx::QueryBuilder::<Sqlite>::new("SELECT id, name FROM tags WHERE name IN (");
    let mut separated = query.separated(", ");
    for name in names {
        separated.push_bind(name.clone());
    }
    separated.push_unseparated(") ORDER BY name");
    let tags = query.build_query_as::<Tag>().fetch_all(&mut *conn).await?;
    Ok(tags)
}
