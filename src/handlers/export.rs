//! Template and export download handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth;
use crate::services::export::ExportBuilder;
use crate::services::template::TemplateBuilder;
use crate::types::{EmptyPayload, ErrorResponse, ExportFilter, Request, SuccessResponse};

/// Handle leadbook.lead.template requests
pub async fn handle_template(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
) -> Result<()> {
    let builder = TemplateBuilder::new();

    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if let Err(e) = auth::extract_auth(&request, &jwt_secret) {
            warn!("Template request {} rejected: {}", request.id, e);
            let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match builder.download() {
            Ok(download) => {
                let success = SuccessResponse::new(request.id, download);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to build import template: {:#}", e);
                let error = ErrorResponse::new(request.id, "EXPORT_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle leadbook.lead.export requests
pub async fn handle_export(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
    builder: Arc<ExportBuilder>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<ExportFilter> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth_info = match auth::extract_auth(&request, &jwt_secret) {
            Ok(info) => info,
            Err(e) => {
                warn!("Export request {} rejected: {}", request.id, e);
                let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match builder.export(&auth_info, request.payload).await {
            Ok(download) => {
                let success = SuccessResponse::new(request.id, download);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to export leads for {}: {:#}", auth_info.user_id, e);
                let error = ErrorResponse::new(request.id, "EXPORT_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
