//! Email validation tokens
//!
//! Every user has exactly one validation record. A fresh account holds a
//! random token that is mailed to the user; following the link marks the
//! account validated and clears the token, so each token works once.

use rand::distributions::Uniform;
use rand::Rng;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub const VALIDATION_TOKEN_LENGTH: usize = 64;

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random validation token of uppercase letters and digits
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let index = Uniform::from(0..TOKEN_ALPHABET.len());
    (0..VALIDATION_TOKEN_LENGTH)
        .map(|_| char::from(TOKEN_ALPHABET[rng.sample(index)]))
        .collect()
}

/// Create the validation record for a new user. Returns the raw token.
pub async fn create_validation(conn: &mut PgConnection, user_id: Uuid) -> Result<String, sqlx::Error> {
    let token = generate_token();

    sqlx::query(
        r#"
        INSERT INTO email_validations (user_id, is_validated, token)
        VALUES ($1, FALSE, $2)
        "#,
    )
    .bind(user_id)
    .bind(&token)
    .execute(conn)
    .await?;

    tracing::info!(user_id = %user_id, "Validation token created");

    Ok(token)
}

/// Validate the account holding `token` and clear the token.
///
/// Returns the validated user's ID.
pub async fn consume_token(pool: &PgPool, token: &str) -> Result<Uuid, TokenError> {
    let user_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE email_validations
        SET is_validated = TRUE, token = NULL
        WHERE token = $1
        RETURNING user_id
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let user_id = user_id.ok_or(TokenError::InvalidToken)?;
    tracing::info!(user_id = %user_id, "Email address validated");
    Ok(user_id)
}

/// Whether the user has validated their email address
pub async fn is_validated(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let validated: Option<bool> =
        sqlx::query_scalar("SELECT is_validated FROM email_validations WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(validated.unwrap_or(false))
}

/// Token validation errors
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_eq!(token1.len(), VALIDATION_TOKEN_LENGTH);
        assert_eq!(token2.len(), VALIDATION_TOKEN_LENGTH);
        assert_ne!(token1, token2);

        assert!(token1
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_token_is_single_use() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = devfaq_shared::create_pool(&url, 2).await.unwrap();
        devfaq_shared::run_migrations(&pool).await.unwrap();

        let user_id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, 'x')")
            .bind(user_id)
            .bind(format!("token-{}", user_id))
            .bind(format!("token-{}@example.com", user_id))
            .execute(&pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let token = create_validation(&mut conn, user_id).await.unwrap();
        drop(conn);

        assert!(!is_validated(&pool, user_id).await.unwrap());
        assert_eq!(consume_token(&pool, &token).await.unwrap(), user_id);
        assert!(is_validated(&pool, user_id).await.unwrap());
        assert!(matches!(
            consume_token(&pool, &token).await,
            Err(TokenError::InvalidToken)
        ));

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();
    }
}
