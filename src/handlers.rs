use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    http::{HeaderMap, StatusCode, Uri},
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::{
    authentication::{
        hash_password_argon2, verify_password_argon2, AuthUser, SessionToken,
    },
    config::AppConfig,
    data_formats::{
        AcknowledgeResponse, CategoryResponse, LoginRequest, LoginResponse, MessageResponse,
        NameRequest, PageWrapper, PostListQuery, PostListing, PostRequest, PostResponse,
        PostSearch, RegisterRequest, SearchParams, TagResponse, UserResponse, WriteMode,
    },
    db_helpers::{
        check_list_filters_in_db, count_search_posts_in_db, create_post_in_db, delete_post_in_db,
        get_category_by_id_in_db, get_post_by_id_in_db, get_post_tags_in_db,
        get_tag_by_id_in_db, get_user_by_username, insert_category_in_db, insert_tag_in_db,
        insert_user, list_categories_in_db, list_posts_in_db, list_tags_in_db,
        search_posts_in_db, update_post_in_db, DELETE_DENIED, EDIT_DENIED,
    },
    errors::{FieldErrors, RequestError},
    models::Post,
    pagination::{PageLinks, PageRequest},
    sessions::SessionStore,
    JsonResponse,
};

type JsonResult<T> = Result<Json<T>, RequestError>;
type CreatedResult<T> = Result<JsonResponse<T>, RequestError>;

const NOT_FOUND: &str = "Not found.";

// ----------------- Extraction Helpers -----------------

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, RequestError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(RequestError::Validation(FieldErrors::single(
            "body",
            rejection.body_text(),
        ))),
    }
}

fn query_error(rejection: QueryRejection) -> RequestError {
    RequestError::Validation(FieldErrors::single("query", rejection.body_text()))
}

// Ids that do not parse cannot name anything, same as an unknown id.
fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, RequestError> {
    path.map(|Path(id)| id)
        .map_err(|_| RequestError::NotFound(NOT_FOUND))
}

async fn render_posts(
    pool: &SqlitePool,
    posts: Vec<Post>,
) -> Result<Vec<PostResponse>, RequestError> {
    let ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
    let mut tags = get_post_tags_in_db(pool, &ids).await?;
    Ok(posts
        .into_iter()
        .map(|post| {
            let post_tags = tags
                .remove(&post.id)
                .unwrap_or_default()
                .into_iter()
                .map(TagResponse::from)
                .collect();
            PostResponse::new(post, post_tags)
        })
        .collect())
}

async fn render_post_by_id(pool: &SqlitePool, id: i64) -> Result<PostResponse, RequestError> {
    let post = get_post_by_id_in_db(pool, id)
        .await?
        .ok_or(RequestError::NotFound(NOT_FOUND))?;
    render_posts(pool, vec![post])
        .await?
        .pop()
        .ok_or(RequestError::ServerError)
}

/// Loads the post and checks `user` wrote it, 404 before 403.
async fn owned_post(
    pool: &SqlitePool,
    id: i64,
    user: &AuthUser,
    denied: &'static str,
) -> Result<Post, RequestError> {
    let post = get_post_by_id_in_db(pool, id)
        .await?
        .ok_or(RequestError::NotFound(NOT_FOUND))?;
    if post.author_id != user.id {
        tracing::info!(
            post_id = id,
            user_id = user.id,
            author_id = post.author_id,
            "rejected write by non-author"
        );
        return Err(RequestError::Forbidden(denied));
    }
    Ok(post)
}

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        format!("URL {} provided was not found", uri),
    )
}

// ----------------- User Handlers -----------------
pub async fn register_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> CreatedResult<UserResponse> {
    let mut user = json_body(body)?.validate()?;
    user.password = hash_password_argon2(user.password).await.map_err(|e| {
        tracing::error!(error = %e, "could not hash password");
        RequestError::ServerError
    })?;

    let user = insert_user(&pool, &user).await?;
    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login_user(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(sessions): Extension<Arc<SessionStore>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> JsonResult<LoginResponse> {
    let request = json_body(body)?;
    if request.username.is_empty() || request.password.is_empty() {
        return Err(RequestError::InvalidCredentials);
    }
    let user = match get_user_by_username(&pool, &request.username).await? {
        Some(user) => user,
        None => return Err(RequestError::InvalidCredentials),
    };
    let is_password_correct = verify_password_argon2(request.password, user.password)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = user.id, "could not verify password");
            RequestError::ServerError
        })?;
    if !is_password_correct {
        return Err(RequestError::InvalidCredentials);
    }

    let token = sessions.create(user.id).await?;
    tracing::info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        detail: "Login successful".to_string(),
        token,
    }))
}

pub async fn logout_user(
    Extension(sessions): Extension<Arc<SessionStore>>,
    SessionToken(token): SessionToken,
) -> Json<MessageResponse> {
    if let Some(token) = token {
        if sessions.revoke(&token).await {
            let active_sessions = sessions.active_sessions().await;
            tracing::info!(active_sessions, "user logged out");
        }
    }
    Json(MessageResponse::new("User logged out successfully"))
}

// ----------------- Post Handlers -----------------
pub async fn list_posts(
    Extension(pool): Extension<Arc<SqlitePool>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> JsonResult<Vec<PostResponse>> {
    let Query(pairs) = query.map_err(query_error)?;
    let query = PostListQuery::from_pairs(&pairs)?;
    check_list_filters_in_db(&pool, &query).await?;
    let posts = list_posts_in_db(&pool, &query).await?;
    Ok(Json(render_posts(&pool, posts).await?))
}

pub async fn get_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    path: Result<Path<i64>, PathRejection>,
) -> JsonResult<PostResponse> {
    let id = path_id(path)?;
    Ok(Json(render_post_by_id(&pool, id).await?))
}

pub async fn create_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    body: Result<Json<PostRequest>, JsonRejection>,
) -> CreatedResult<PostResponse> {
    let changes = json_body(body)?.validate(WriteMode::Create)?;
    let id = create_post_in_db(&pool, user.id, changes).await?;
    tracing::info!(post_id = id, user_id = user.id, "post created");
    Ok((StatusCode::CREATED, Json(render_post_by_id(&pool, id).await?)))
}

async fn update_post(
    pool: &SqlitePool,
    user: AuthUser,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<PostRequest>, JsonRejection>,
    mode: WriteMode,
) -> JsonResult<PostResponse> {
    let id = path_id(path)?;
    owned_post(pool, id, &user, EDIT_DENIED).await?;
    let changes = json_body(body)?.validate(mode)?;
    update_post_in_db(pool, id, user.id, changes).await?;
    tracing::info!(post_id = id, user_id = user.id, "post updated");
    Ok(Json(render_post_by_id(pool, id).await?))
}

pub async fn replace_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<PostRequest>, JsonRejection>,
) -> JsonResult<PostResponse> {
    update_post(&pool, user, path, body, WriteMode::Replace).await
}

pub async fn patch_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<PostRequest>, JsonRejection>,
) -> JsonResult<PostResponse> {
    update_post(&pool, user, path, body, WriteMode::Partial).await
}

pub async fn delete_post(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, RequestError> {
    let id = path_id(path)?;
    owned_post(&pool, id, &user, DELETE_DENIED).await?;
    delete_post_in_db(&pool, id, user.id).await?;
    tracing::info!(post_id = id, user_id = user.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search_posts(
    Extension(pool): Extension<Arc<SqlitePool>>,
    Extension(config): Extension<Arc<AppConfig>>,
    uri: Uri,
    headers: HeaderMap,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> JsonResult<PostListing> {
    let Query(params) = query.map_err(query_error)?;
    let search = PostSearch::from(&params);
    let page = PageRequest::from_params(
        params.page.as_deref(),
        params.page_size.as_deref(),
        &config,
    )?;

    let page = match page {
        Some(page) => page,
        None => {
            let posts = search_posts_in_db(&pool, &search, None).await?;
            return Ok(Json(PostListing::Full(render_posts(&pool, posts).await?)));
        }
    };

    let count = count_search_posts_in_db(&pool, &search).await?;
    page.check_in_range(count)?;
    let posts = search_posts_in_db(&pool, &search, Some(page)).await?;
    let links = PageLinks::new(&uri, &headers);
    Ok(Json(PostListing::Page(PageWrapper {
        count,
        next: page
            .has_next(count)
            .then(|| links.link(page.page + 1)),
        previous: page
            .has_previous()
            .then(|| links.link(page.page - 1)),
        results: render_posts(&pool, posts).await?,
    })))
}

/// Acknowledges a delete without touching anything; real deletion goes
/// through `DELETE /posts/{id}/`.
pub async fn acknowledge_delete(Path(id): Path<String>) -> Json<AcknowledgeResponse> {
    tracing::warn!(post_id = %id, "delete acknowledged without removing anything");
    Json(AcknowledgeResponse {
        message: "Delete request received successfully.".to_string(),
    })
}

// ----------------- Tag Handlers -----------------
pub async fn list_tags(
    Extension(pool): Extension<Arc<SqlitePool>>,
) -> JsonResult<Vec<TagResponse>> {
    let tags = list_tags_in_db(&pool).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

pub async fn get_tag(
    Extension(pool): Extension<Arc<SqlitePool>>,
    path: Result<Path<i64>, PathRejection>,
) -> JsonResult<TagResponse> {
    let id = path_id(path)?;
    match get_tag_by_id_in_db(&pool, id).await? {
        Some(tag) => Ok(Json(TagResponse::from(tag))),
        None => Err(RequestError::NotFound(NOT_FOUND)),
    }
}

pub async fn create_tag(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    body: Result<Json<NameRequest>, JsonRejection>,
) -> CreatedResult<TagResponse> {
    let name = json_body(body)?.validate()?;
    let tag = insert_tag_in_db(&pool, &name).await?;
    tracing::info!(tag_id = tag.id, user_id = user.id, "tag created");
    Ok((StatusCode::CREATED, Json(TagResponse::from(tag))))
}

// ----------------- Category Handlers -----------------
pub async fn list_categories(
    Extension(pool): Extension<Arc<SqlitePool>>,
) -> JsonResult<Vec<CategoryResponse>> {
    let categories = list_categories_in_db(&pool).await?;
    Ok(Json(
        categories.into_iter().map(CategoryResponse::from).collect(),
    ))
}

pub async fn get_category(
    Extension(pool): Extension<Arc<SqlitePool>>,
    path: Result<Path<i64>, PathRejection>,
) -> JsonResult<CategoryResponse> {
    let id = path_id(path)?;
    match get_category_by_id_in_db(&pool, id).await? {
        Some(category) => Ok(Json(CategoryResponse::from(category))),
        None => Err(RequestError::NotFound(NOT_FOUND)),
    }
}

pub async fn create_category(
    Extension(pool): Extension<Arc<SqlitePool>>,
    user: AuthUser,
    body: Result<Json<NameRequest>, JsonRejection>,
) -> CreatedResult<CategoryResponse> {
    let name = json_body(body)?.validate()?;
    let category = insert_category_in_db(&pool, &name).await?;
    tracing::info!(category_id = category.id, user_id = user.id, "category created");
    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}
