use tracing::{info, warn};

use super::dto::{AccessTokenResponse, AuthResponse, LoginRequest, PublicUser, RegisterRequest};
use super::jwt::TokenService;
use super::password;
use super::repo::UserRepo;
use super::repo_types::User;
use crate::error::{AppError, StoreError};
use crate::validation::{is_valid_email, min_chars, required};

const MIN_PASSWORD_CHARS: usize = 6;

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn checked_email(raw: Option<&str>) -> Result<String, AppError> {
    let email = normalize_email(required("email", raw)?);
    if !is_valid_email(&email) {
        return Err(AppError::Validation(
            "\"email\" must be a valid email".into(),
        ));
    }
    Ok(email)
}

async fn issue_pair(tokens: &TokenService, user: User) -> Result<AuthResponse, AppError> {
    let token = tokens.issue_access(user.id)?;
    let refresh_token = tokens.issue_refresh(user.id).await?;
    Ok(AuthResponse {
        token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    })
}

pub async fn register(
    users: &dyn UserRepo,
    tokens: &TokenService,
    input: &RegisterRequest,
) -> Result<AuthResponse, AppError> {
    let name = required("name", input.name.as_deref())?.trim().to_owned();
    let email = checked_email(input.email.as_deref())?;
    let plain = required("password", input.password.as_deref())?;
    min_chars("password", plain, MIN_PASSWORD_CHARS)?;

    if users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict);
    }

    let hash = password::hash(plain.to_owned()).await?;
    let user = match users.create(&name, &email, &hash).await {
        Ok(u) => u,
        // lost a race with a concurrent registration
        Err(e) if e.downcast_ref::<StoreError>() == Some(&StoreError::UniqueViolation) => {
            warn!(%email, "email already registered");
            return Err(AppError::Conflict);
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_pair(tokens, user).await
}

pub async fn login(
    users: &dyn UserRepo,
    tokens: &TokenService,
    input: &LoginRequest,
) -> Result<AuthResponse, AppError> {
    let email = checked_email(input.email.as_deref())?;
    let plain = required("password", input.password.as_deref())?.to_owned();

    let Some(user) = users.find_by_email(&email).await? else {
        password::verify_dummy(plain).await;
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !password::verify(plain, user.password_hash.clone()).await? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    issue_pair(tokens, user).await
}

/// Mints a new access token. The refresh token itself stays valid.
pub async fn refresh(
    tokens: &TokenService,
    refresh_token: Option<&str>,
) -> Result<AccessTokenResponse, AppError> {
    let refresh_token = refresh_token
        .filter(|t| !t.is_empty())
        .ok_or(AppError::InvalidToken)?;
    let user_id = tokens.verify_refresh(refresh_token).await?;
    let token = tokens.issue_access(user_id)?;
    info!(%user_id, "access token refreshed");
    Ok(AccessTokenResponse { token })
}

/// Revokes the refresh token if it is known. Succeeds either way.
pub async fn logout(tokens: &TokenService, refresh_token: Option<&str>) -> Result<(), AppError> {
    if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
        tokens.revoke(token).await?;
    }
    Ok(())
}
