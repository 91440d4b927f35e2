//! Authentication utilities: JWT validation and actor permissions
//!
//! Tokens are issued elsewhere; this worker only validates them and derives
//! the actor identity plus the import/export decisions from the claims.

use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Request;

pub const PERMISSION_IMPORT: &str = "leads:import";
pub const PERMISSION_VIEW_ALL: &str = "leads:view_all";

const ADMIN_ROLE: &str = "admin";

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    pub email: String,
    /// User role (admin, sales, ...)
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Authenticated actor extracted from a request
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthInfo {
    fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Whether this actor may run bulk imports
    pub fn can_import(&self) -> bool {
        self.role == ADMIN_ROLE || self.has_permission(PERMISSION_IMPORT)
    }

    /// Privileged actors see (and export) leads of every creator
    pub fn is_privileged(&self) -> bool {
        self.role == ADMIN_ROLE || self.has_permission(PERMISSION_VIEW_ALL)
    }
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

/// Extract authentication info from a NATS request.
pub fn extract_auth<T>(request: &Request<T>, jwt_secret: &str) -> Result<AuthInfo> {
    let token = request
        .token
        .as_deref()
        .ok_or_else(|| anyhow!("No authentication provided: JWT token is required"))?;

    let claims = validate_token(token, jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| anyhow!("Invalid user_id in token: {}", e))?;

    Ok(AuthInfo {
        user_id,
        email: claims.email,
        role: claims.role,
        permissions: claims.permissions,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EmptyPayload;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    fn token_for(user_id: Uuid, role: &str, permissions: &[&str], secret: &str) -> String {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            email: "sales@example.com".to_string(),
            role: role.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            iat: now,
            exp: now + 3600,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn auth(role: &str, permissions: &[&str]) -> AuthInfo {
        AuthInfo {
            user_id: Uuid::new_v4(),
            email: "sales@example.com".to_string(),
            role: role.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_extract_auth_with_valid_token() {
        let user_id = Uuid::new_v4();
        let token = token_for(user_id, "sales", &[PERMISSION_IMPORT], TEST_SECRET);
        let request = Request::with_token(token, EmptyPayload {});

        let info = extract_auth(&request, TEST_SECRET).unwrap();
        assert_eq!(info.user_id, user_id);
        assert_eq!(info.role, "sales");
        assert!(info.can_import());
        assert!(!info.is_privileged());
    }

    #[test]
    fn test_extract_auth_rejects_wrong_secret() {
        let token = token_for(Uuid::new_v4(), "admin", &[], "another-secret-key-that-is-32-bytes-long!!");
        let request = Request::with_token(token, EmptyPayload {});
        assert!(extract_auth(&request, TEST_SECRET).is_err());
    }

    #[test]
    fn test_extract_auth_requires_token() {
        let mut request = Request::with_token(String::new(), EmptyPayload {});
        request.token = None;
        assert!(extract_auth(&request, TEST_SECRET).is_err());
    }

    #[test]
    fn test_admin_can_import_and_export_everything() {
        let admin = auth("admin", &[]);
        assert!(admin.can_import());
        assert!(admin.is_privileged());
    }

    #[test]
    fn test_plain_user_cannot_import() {
        let user = auth("sales", &[]);
        assert!(!user.can_import());
        assert!(!user.is_privileged());
    }

    #[test]
    fn test_view_all_permission_is_privileged() {
        let manager = auth("manager", &[PERMISSION_VIEW_ALL]);
        assert!(manager.is_privileged());
        assert!(!manager.can_import());
    }
}
