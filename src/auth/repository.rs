use sqlx::PgPool;

use crate::auth::error::AuthError;
use crate::auth::models::{Role, RoleBinding};

/// Repository for principal resolution: account status and role bindings
#[derive(Clone)]
pub struct AuthRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct BindingRow {
    role: String,
    restaurant_id: Option<i32>,
    branch_id: Option<i32>,
}

impl AuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Account status for a user id, None if the user does not exist
    pub async fn find_user_status(&self, user_id: i32) -> Result<Option<String>, AuthError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(status)
    }

    /// All role bindings for a user. Rows with role names this binary does
    /// not know are skipped with a warning rather than failing the request.
    pub async fn load_role_bindings(&self, user_id: i32) -> Result<Vec<RoleBinding>, AuthError> {
        let rows = sqlx::query_as::<_, BindingRow>(
            r#"
            SELECT r.name AS role, ra.restaurant_id, ra.branch_id
            FROM user_role_assignments ra
            JOIN roles r ON r.id = ra.role_id
            WHERE ra.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let bindings = rows
            .into_iter()
            .filter_map(|row| match Role::from_str(&row.role) {
                Ok(role) => Some(RoleBinding {
                    role,
                    restaurant_id: row.restaurant_id,
                    branch_id: row.branch_id,
                }),
                Err(e) => {
                    tracing::warn!("Skipping unknown role binding for user {}: {}", user_id, e);
                    None
                }
            })
            .collect();

        Ok(bindings)
    }
}
