//! Lead import handlers (synchronous and queued)

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{self, AuthInfo};
use crate::services::import::{LeadImporter, NoProgress};
use crate::services::import_processor::ImportProcessor;
use crate::types::{ErrorResponse, ImportLeadsRequest, Request, SuccessResponse};

/// Outcome of authenticating an import request
fn authorize_import(request: &Request<ImportLeadsRequest>, jwt_secret: &str) -> Result<AuthInfo, ErrorResponse> {
    let auth_info = auth::extract_auth(request, jwt_secret).map_err(|e| {
        warn!("Import request {} rejected: {}", request.id, e);
        ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required")
    })?;

    if !auth_info.can_import() {
        warn!("User {} is not allowed to import leads", auth_info.user_id);
        return Err(ErrorResponse::new(request.id, "FORBIDDEN", "You are not allowed to import leads"));
    }

    Ok(auth_info)
}

/// Handle leadbook.lead.import: runs the import and replies with the `ImportResult`
pub async fn handle_import(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
    importer: LeadImporter,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<ImportLeadsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse lead import request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth_info = match authorize_import(&request, &jwt_secret) {
            Ok(info) => info,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let result = importer.import(auth_info.user_id, &request.payload, &NoProgress).await;
        info!(
            "Import of '{}' by {} finished: {}",
            request.payload.filename, auth_info.email, result.message
        );

        let success = SuccessResponse::new(request.id, result);
        let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
    }

    Ok(())
}

/// Handle leadbook.lead.import.submit: queues the import and replies with the job id
pub async fn handle_import_submit(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
    processor: Arc<ImportProcessor>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<ImportLeadsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse lead import submit request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth_info = match authorize_import(&request, &jwt_secret) {
            Ok(info) => info,
            Err(error) => {
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match processor.submit_job(auth_info.user_id, request.payload).await {
            Ok(response) => {
                let success = SuccessResponse::new(request.id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to submit import job: {}", e);
                let error = ErrorResponse::new(request.id, "SUBMIT_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, PERMISSION_IMPORT};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    fn request_as(role: &str, permissions: &[&str]) -> Request<ImportLeadsRequest> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "sales@example.com".to_string(),
            role: role.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            iat: now,
            exp: now + 3600,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_SECRET.as_bytes())).unwrap();
        Request::with_token(
            token,
            ImportLeadsRequest {
                filename: "leads.xlsx".to_string(),
                mime_type: crate::defaults::XLSX_CONTENT_TYPE.to_string(),
                size_bytes: 0,
                file_base64: String::new(),
            },
        )
    }

    #[test]
    fn test_importer_permission_is_authorized() {
        assert!(authorize_import(&request_as("sales", &[PERMISSION_IMPORT]), TEST_SECRET).is_ok());
        assert!(authorize_import(&request_as("admin", &[]), TEST_SECRET).is_ok());
    }

    #[test]
    fn test_plain_user_is_forbidden() {
        let error = authorize_import(&request_as("sales", &[]), TEST_SECRET).unwrap_err();
        assert_eq!(error.error.code, "FORBIDDEN");
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let mut request = request_as("admin", &[]);
        request.token = None;
        let error = authorize_import(&request, TEST_SECRET).unwrap_err();
        assert_eq!(error.error.code, "UNAUTHORIZED");
        assert_eq!(error.id, request.id);
    }
}
