use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::contact::mailer::OutboundMail;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub status: String,
    pub message: String,
}

/// POST /contact - Relay a contact form submission to the operational inbox.
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<Json<ContactResponse>, (StatusCode, Json<ContactResponse>)> {
    let mail = OutboundMail::from_contact(&req.name, &req.email, &req.message);

    match state.mailer.send(&mail).await {
        Ok(()) => Ok(Json(ContactResponse {
            status: "success".to_string(),
            message: "Message sent!".to_string(),
        })),
        Err(e) => {
            tracing::error!(error = %e, "Contact mail error");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ContactResponse {
                    status: "error".to_string(),
                    message: e.to_string(),
                }),
            ))
        }
    }
}
