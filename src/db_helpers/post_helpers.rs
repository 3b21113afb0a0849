use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

use crate::data_formats::{PostChanges, PostFilter, PostListQuery, PostSearch, INVALID_CHOICE};
use crate::errors::{FieldErrors, RequestError};
use crate::models::{Post, PostTag, Tag};
use crate::pagination::PageRequest;

use super::{contains_pattern, find_category_by_name, find_tags_by_names};

pub const EDIT_DENIED: &str = "You do not have permission to edit this post.";
pub const DELETE_DENIED: &str = "You do not have permission to delete this post.";

// Keeps IN lists well below SQLite's bound-parameter limit.
const ID_CHUNK: usize = 500;

const POST_SELECT: &str = r#"
    SELECT posts.id             AS "id",
           posts.title          AS "title",
           posts.content        AS "content",
           posts.author_id      AS "author_id",
           users.username       AS "author_username",
           posts.category_id    AS "category_id",
           categories.name      AS "category_name",
           posts.created_date   AS "created_date",
           posts.published_date AS "published_date"
    FROM   posts
           JOIN users
             ON users.id = posts.author_id
           LEFT JOIN categories
                  ON categories.id = posts.category_id
    WHERE  1 = 1"#;

const POST_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM   posts
           JOIN users
             ON users.id = posts.author_id
           LEFT JOIN categories
                  ON categories.id = posts.category_id
    WHERE  1 = 1"#;

fn push_list_filters(query: &mut QueryBuilder<'_, Sqlite>, filters: &[PostFilter]) {
    for filter in filters {
        match filter {
            PostFilter::Category(id) => {
                query.push(" AND posts.category_id = ").push_bind(*id);
            }
            PostFilter::Author(id) => {
                query.push(" AND posts.author_id = ").push_bind(*id);
            }
            PostFilter::Tags(ids) => {
                query.push(" AND posts.id IN (SELECT post_id FROM post_tags WHERE tag_id IN (");
                let mut separated = query.separated(", ");
                for id in ids {
                    separated.push_bind(*id);
                }
                separated.push_unseparated("))");
            }
            PostFilter::PublishedDate(timestamp) => {
                query
                    .push(" AND posts.published_date = ")
                    .push_bind(*timestamp);
            }
        }
    }
}

fn push_search_conditions(query: &mut QueryBuilder<'_, Sqlite>, search: &PostSearch) {
    // SQLite's LIKE is case-insensitive for ASCII.
    if let Some(text) = &search.text {
        let pattern = contains_pattern(text);
        query
            .push(r" AND (posts.title LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR posts.content LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR users.username LIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }
    if let Some(category) = &search.category {
        query
            .push(r" AND categories.name LIKE ")
            .push_bind(contains_pattern(category))
            .push(r" ESCAPE '\'");
    }
    if let Some(author) = &search.author {
        query.push(" AND users.username = ").push_bind(author.clone());
    }
    if !search.tags.is_empty() {
        query.push(
            " AND posts.id IN (SELECT post_tags.post_id FROM post_tags JOIN tags ON tags.id = post_tags.tag_id WHERE tags.name IN (",
        );
        let mut separated = query.separated(", ");
        for tag in &search.tags {
            separated.push_bind(tag.clone());
        }
        separated.push_unseparated("))");
    }
}

// ----------------- Post Queries -----------------

async fn row_exists(pool: &SqlitePool, table: &str, id: i64) -> Result<bool, RequestError> {
    let query = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
    let exists = sqlx::query_scalar::<_, bool>(&query)
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Rejects filters naming a category, author or tag that does not exist.
pub async fn check_list_filters_in_db(
    pool: &SqlitePool,
    PostListQuery { filters, .. }: &PostListQuery,
) -> Result<(), RequestError> {
    let mut errors = FieldErrors::new();
    for filter in filters {
        match filter {
            PostFilter::Category(id) => {
                if !row_exists(pool, "categories", *id).await? {
                    errors.add("category", INVALID_CHOICE);
                }
            }
            PostFilter::Author(id) => {
                if !row_exists(pool, "users", *id).await? {
                    errors.add("author", INVALID_CHOICE);
                }
            }
            PostFilter::Tags(ids) => {
                for id in ids {
                    if !row_exists(pool, "tags", *id).await? {
                        errors.add("tags", INVALID_CHOICE);
                        break;
                    }
                }
            }
            PostFilter::PublishedDate(_) => {}
        }
    }
    errors.into_result()
}

pub async fn list_posts_in_db(
    pool: &SqlitePool,
    PostListQuery { filters, ordering }: &PostListQuery,
) -> Result<Vec<Post>, RequestError> {
    let mut query = QueryBuilder::<Sqlite>::new(POST_SELECT);
    push_list_filters(&mut query, filters);

    query.push(" ORDER BY ");
    for order in ordering {
        query.push(order.key.column());
        query.push(if order.descending { " DESC, " } else { " ASC, " });
    }
    query.push("posts.id ASC");

    let posts = query.build_query_as::<Post>().fetch_all(pool).await?;
    Ok(posts)
}

pub async fn count_search_posts_in_db(
    pool: &SqlitePool,
    search: &PostSearch,
) -> Result<i64, RequestError> {
    let mut query = QueryBuilder::<Sqlite>::new(POST_COUNT);
    push_search_conditions(&mut query, search);
    let row = query.build().fetch_one(pool).await?;
    Ok(row.try_get::<i64, _>(0)?)
}

pub async fn search_posts_in_db(
    pool: &SqlitePool,
    search: &PostSearch,
    page: Option<PageRequest>,
) -> Result<Vec<Post>, RequestError> {
    let mut query = QueryBuilder::<Sqlite>::new(POST_SELECT);
    push_search_conditions(&mut query, search);
    query.push(" ORDER BY posts.id ASC");
    if let Some(page) = page {
        query
            .push(" LIMIT ")
            .push_bind(page.page_size)
            .push(" OFFSET ")
            .push_bind(page.offset());
    }
    let posts = query.build_query_as::<Post>().fetch_all(pool).await?;
    Ok(posts)
}

pub async fn get_post_by_id_in_db(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Post>, RequestError> {
    let mut query = QueryBuilder::<Sqlite>::new(POST_SELECT);
    query.push(" AND posts.id = ").push_bind(id);
    let post = query.build_query_as::<Post>().fetch_optional(pool).await?;
    Ok(post)
}

/// Tags of each post in `post_ids`, sorted by name.
pub async fn get_post_tags_in_db(
    pool: &SqlitePool,
    post_ids: &[i64],
) -> Result<HashMap<i64, Vec<Tag>>, RequestError> {
    let mut result: HashMap<i64, Vec<Tag>> = HashMap::new();
    for chunk in post_ids.chunks(ID_CHUNK) {
        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT post_tags.post_id AS "post_id",
                   tags.id           AS "tag_id",
                   tags.name         AS "tag_name"
            FROM   post_tags
                   JOIN tags
                     ON tags.id = post_tags.tag_id
            WHERE  post_tags.post_id IN ("#,
        );
        let mut separated = query.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY tags.name");

        let rows = query.build_query_as::<PostTag>().fetch_all(pool).await?;
        for PostTag {
            post_id,
            tag_id,
            tag_name,
        } in rows
        {
            result.entry(post_id).or_default().push(Tag {
                id: tag_id,
                name: tag_name,
            });
        }
    }
    Ok(result)
}

// ----------------- Post Mutations -----------------

/// Category and tag ids resolved from the names in a write request.
struct Relations {
    category: Option<Option<i64>>,
    tags: Option<Vec<i64>>,
}

// Unknown names are validation errors; nothing is created on the fly.
async fn resolve_relations(
    conn: &mut SqliteConnection,
    category: Option<&Option<String>>,
    tags: Option<&[String]>,
) -> Result<Relations, RequestError> {
    let mut errors = FieldErrors::new();

    let category = match category {
        Some(Some(name)) => match find_category_by_name(conn, name).await? {
            Some(category) => Some(Some(category.id)),
            None => {
                errors.add("category", format!("Category \"{name}\" does not exist."));
                None
            }
        },
        Some(None) => Some(None),
        None => None,
    };

    let tags = match tags {
        Some(names) => {
            let found = find_tags_by_names(conn, names).await?;
            for name in names {
                if !found.iter().any(|tag| &tag.name == name) {
                    errors.add("tags", format!("Tag \"{name}\" does not exist."));
                }
            }
            Some(found.into_iter().map(|tag| tag.id).collect())
        }
        None => None,
    };

    errors.into_result()?;
    Ok(Relations { category, tags })
}

async fn replace_post_tags(
    conn: &mut SqliteConnection,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<(), RequestError> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    for tag_id in tag_ids {
        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2)")
            .bind(post_id)
            .bind(*tag_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Inserts a post authored by `author_id` and returns its id. `changes` must
/// come from a create validation so title and content are present.
pub async fn create_post_in_db(
    pool: &SqlitePool,
    author_id: i64,
    changes: PostChanges,
) -> Result<i64, RequestError> {
    let mut tx = pool.begin().await?;
    let relations = resolve_relations(
        &mut tx,
        changes.category.as_ref(),
        changes.tags.as_deref(),
    )
    .await?;

    let (title, content) = match (changes.title, changes.content) {
        (Some(title), Some(content)) => (title, content),
        _ => return Err(RequestError::ServerError),
    };

    let post_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO posts (title, content, author_id, category_id, created_date, published_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(author_id)
    .bind(relations.category.flatten())
    .bind(Utc::now())
    .bind(changes.published_date.flatten())
    .fetch_one(&mut tx)
    .await?;

    replace_post_tags(&mut tx, post_id, &relations.tags.unwrap_or_default()).await?;
    tx.commit().await?;
    Ok(post_id)
}

/// Applies `changes` to a post owned by `author_id`. The created date is
/// never written here.
pub async fn update_post_in_db(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    changes: PostChanges,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let relations = resolve_relations(
        &mut tx,
        changes.category.as_ref(),
        changes.tags.as_deref(),
    )
    .await?;

    if changes.touches_columns() {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE posts SET ");
        let mut assignments = query.separated(", ");
        if let Some(title) = changes.title {
            assignments.push("title = ").push_bind_unseparated(title);
        }
        if let Some(content) = changes.content {
            assignments.push("content = ").push_bind_unseparated(content);
        }
        if let Some(category_id) = relations.category {
            assignments
                .push("category_id = ")
                .push_bind_unseparated(category_id);
        }
        if let Some(published_date) = changes.published_date {
            assignments
                .push("published_date = ")
                .push_bind_unseparated(published_date);
        }
        query
            .push(" WHERE id = ")
            .push_bind(post_id)
            .push(" AND author_id = ")
            .push_bind(author_id);

        let result = query.build().execute(&mut tx).await?;
        if result.rows_affected() == 0 {
            return Err(RequestError::Forbidden(EDIT_DENIED));
        }
    }

    if let Some(tag_ids) = relations.tags {
        replace_post_tags(&mut tx, post_id, &tag_ids).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn delete_post_in_db(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
        .bind(post_id)
        .bind(author_id)
        .execute(&mut tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RequestError::Forbidden(DELETE_DENIED));
    }

    tx.commit().await?;
    Ok(())
}
