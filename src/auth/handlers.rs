use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AccessTokenResponse, AuthResponse, LoginRequest, MessageResponse, RefreshTokenRequest,
            RegisterRequest,
        },
        jwt::TokenService,
        services,
    },
    error::AppError,
    rate_limit,
    state::AppState,
    validation::AppJson,
};

/// `/register` and `/login` sit behind the stricter credential limiter.
pub fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route_layer(middleware::from_fn_with_state(
            state.auth_limiter.clone(),
            rate_limit::enforce,
        ))
}

pub fn token_routes() -> Router<AppState> {
    Router::new()
        .route("/refresh-token", post(refresh))
        .route("/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let resp = services::register(state.users.as_ref(), &state.tokens, &payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let resp = services::login(state.users.as_ref(), &state.tokens, &payload).await?;
    Ok(Json(resp))
}

#[instrument(skip(tokens, payload))]
pub async fn refresh(
    State(tokens): State<TokenService>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let token = payload.and_then(|Json(p)| p.refresh_token);
    let resp = services::refresh(&tokens, token.as_deref()).await?;
    Ok(Json(resp))
}

/// Always answers 200, whether or not the token was known.
#[instrument(skip(tokens, payload))]
pub async fn logout(
    State(tokens): State<TokenService>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> Result<Json<MessageResponse>, AppError> {
    let token = payload.and_then(|Json(p)| p.refresh_token);
    services::logout(&tokens, token.as_deref()).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully".into(),
    }))
}
