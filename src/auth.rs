use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Verified caller identity, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid or expired token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token: user_id not found")]
    MissingSubject,
}

/// Issues and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct AccessGate {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AccessGate {
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        AccessGate {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        Uuid::parse_str(&data.claims.user_id).map_err(|_| AuthError::MissingSubject)
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::unauthorized("Authorization header is required"))?;

    let token = match auth_header.split(' ').collect::<Vec<_>>().as_slice() {
        ["Bearer", token] => token.to_string(),
        _ => {
            return Err(AppError::unauthorized(
                "Invalid authorization header format. Expected: Bearer <token>",
            ))
        }
    };

    let user_id = state.gate.verify(&token).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        AppError::unauthorized(e.to_string())
    })?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}
