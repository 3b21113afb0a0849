use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    data_formats::NewUser,
    errors::{FieldErrors, RequestError},
    models::User,
};

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "A user with that email already exists.";

const USER_COLUMNS: &str = "id, username, email, password, date_joined";

/// Inserts a user whose `password` is already hashed.
pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<User, RequestError> {
    let mut tx = pool.begin().await?;
    check_user_is_free(&mut tx, user).await?;

    // The UNIQUE constraints still catch a concurrent registration.
    let query = format!(
        "INSERT INTO users (username, email, password, date_joined) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&query)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(Utc::now())
        .fetch_one(&mut tx)
        .await
        .map_err(|e| {
            RequestError::from(e)
                .on_unique_violation("users.username", "username", USERNAME_TAKEN)
                .on_unique_violation("users.email", "email", EMAIL_TAKEN)
        })?;
    tx.commit().await?;
    Ok(user)
}

/// Reports a taken username and a taken email together.
async fn check_user_is_free(
    conn: &mut SqliteConnection,
    user: &NewUser,
) -> Result<(), RequestError> {
    let (username_taken, email_taken) = sqlx::query_as::<_, (bool, bool)>(
        r#"
        SELECT EXISTS (SELECT 1 FROM users WHERE username = $1),
               EXISTS (SELECT 1 FROM users WHERE email = $2)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .fetch_one(&mut *conn)
    .await?;

    let mut errors = FieldErrors::new();
    if username_taken {
        errors.add("username", USERNAME_TAKEN);
    }
    if email_taken {
        errors.add("email", EMAIL_TAKEN);
    }
    errors.into_result()
}

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, RequestError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
    let user = sqlx::query_as::<_, User>(&query)
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}
