use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Role, User, UserWithCredential};

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, profile_picture, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn list(db: &PgPool) -> sqlx::Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, profile_picture, created_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(db)
        .await
    }

    pub async fn email_taken(db: &PgPool, email: &str) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(db)
            .await
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, profile_picture, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(db)
        .await
    }

    /// Partial update of name/email/role. The password_hash column is not
    /// in the statement, so re-saving a record can never rehash.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        role: Option<Role>,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name  = COALESCE($2, name),
                email = COALESCE($3, email),
                role  = COALESCE($4, role)
            WHERE id = $1
            RETURNING id, name, email, role, profile_picture, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(role)
        .fetch_optional(db)
        .await
    }

    pub async fn set_picture(
        db: &PgPool,
        id: Uuid,
        reference: &str,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET profile_picture = $2
            WHERE id = $1
            RETURNING id, name, email, role, profile_picture, created_at
            "#,
        )
        .bind(id)
        .bind(reference)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            DELETE FROM users
            WHERE id = $1
            RETURNING id, name, email, role, profile_picture, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }
}

impl UserWithCredential {
    /// The only read that includes the credential column; login uses it to
    /// verify the password and nothing else does.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<UserWithCredential>> {
        sqlx::query_as::<_, UserWithCredential>(
            r#"
            SELECT id, name, email, password_hash, role, profile_picture, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }
}
