// Authentication middleware for protected routes

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::error::AuthError;
use crate::auth::models::{Role, RoleBinding};
use crate::AppState;

/// Authenticated principal extractor for protected routes.
///
/// Validates the bearer token, checks the account is active, and loads the
/// principal's role bindings so handlers can call the policy evaluator
/// exactly once per operation.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub email: String,
    pub bindings: Vec<RoleBinding>,
}

impl AuthenticatedUser {
    /// Whether any binding carries the given role, regardless of scope
    pub fn has_role(&self, role: Role) -> bool {
        self.bindings.iter().any(|b| b.role == role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(Role::SuperAdmin)
    }

    pub fn is_driver(&self) -> bool {
        self.bindings.iter().any(|b| b.role.is_driver())
    }

    /// Bindings that grant `role` over the given restaurant/branch pair
    pub fn binding_covering(&self, role: Role, restaurant_id: i32, branch_id: i32) -> bool {
        self.bindings
            .iter()
            .any(|b| b.covers(role, restaurant_id, branch_id))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        let token = parse_bearer(header)?;
        resolve_principal(&state, token).await
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let token = header.strip_prefix("Bearer ").ok_or(AuthError::InvalidToken)?;
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    Ok(token)
}

/// Token → principal resolution, shared with the WebSocket handshake
pub async fn resolve_principal(
    state: &AppState,
    token: &str,
) -> Result<AuthenticatedUser, AuthError> {
    let claims = state.token_service.validate(token)?;

    let status = state
        .auth_repo
        .find_user_status(claims.sub)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    if status != "active" {
        return Err(AuthError::AccountInactive);
    }

    let bindings = state.auth_repo.load_role_bindings(claims.sub).await?;

    Ok(AuthenticatedUser {
        user_id: claims.sub,
        email: claims.email,
        bindings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert!(parse_bearer("Basic abc").is_err());
        assert!(parse_bearer("Bearer ").is_err());
        assert!(parse_bearer("abc.def.ghi").is_err());
    }

    #[test]
    fn test_has_role_checks_all_bindings() {
        let user = AuthenticatedUser {
            user_id: 1,
            email: "staff@example.com".to_string(),
            bindings: vec![
                RoleBinding {
                    role: Role::KitchenStaff,
                    restaurant_id: Some(4),
                    branch_id: Some(2),
                },
                RoleBinding {
                    role: Role::Customer,
                    restaurant_id: None,
                    branch_id: None,
                },
            ],
        };
        assert!(user.has_role(Role::KitchenStaff));
        assert!(user.has_role(Role::Customer));
        assert!(!user.has_role(Role::Owner));
        assert!(!user.is_driver());
        assert!(user.binding_covering(Role::KitchenStaff, 4, 2));
        assert!(!user.binding_covering(Role::KitchenStaff, 4, 3));
    }
}
