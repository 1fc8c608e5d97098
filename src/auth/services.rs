use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{AdminUserUpdate, RegisterRequest},
    jwt::TokenKind,
    password::{
        fingerprint, hash_password_blocking, is_acceptable_password, is_valid_email,
        normalize_email, verify_password_blocking,
    },
    repo::{EmailTaken, NewUser, User},
};
use crate::{error::ApiError, state::AppState};

/// A lost race on the unique email index is still the caller's error.
fn user_write_error(e: anyhow::Error, taken: &'static str) -> ApiError {
    if e.is::<EmailTaken>() {
        ApiError::bad_request(taken)
    } else {
        ApiError::Database(e)
    }
}

pub async fn register(st: &AppState, req: RegisterRequest) -> Result<User, ApiError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::bad_request("REGISTER_INVALID_EMAIL"));
    }
    if !is_acceptable_password(&req.password, &email) {
        return Err(ApiError::bad_request("REGISTER_INVALID_PASSWORD"));
    }
    if st
        .users
        .find_by_email(&email)
        .await
        .map_err(ApiError::Database)?
        .is_some()
    {
        warn!(%email, "email already registered");
        return Err(ApiError::bad_request("REGISTER_USER_ALREADY_EXISTS"));
    }

    let hashed_password = hash_password_blocking(req.password)
        .await
        .map_err(ApiError::Internal)?;
    let user = st
        .users
        .create(NewUser {
            email,
            hashed_password,
        })
        .await
        .map_err(|e| user_write_error(e, "REGISTER_USER_ALREADY_EXISTS"))?;

    info!(user_id = %user.id, "user has registered");
    Ok(user)
}

/// Checks credentials and issues an access token.
pub async fn authenticate(st: &AppState, email: &str, password: &str) -> Result<String, ApiError> {
    let email = normalize_email(email);
    let Some(user) = st
        .users
        .find_by_email(&email)
        .await
        .map_err(ApiError::Database)?
    else {
        // Burn comparable time so unknown emails are not distinguishable.
        let _ = hash_password_blocking(password.to_string()).await;
        warn!(%email, "login unknown email");
        return Err(ApiError::bad_request("LOGIN_BAD_CREDENTIALS"));
    };

    let ok = verify_password_blocking(password.to_string(), user.hashed_password.clone())
        .await
        .map_err(ApiError::Internal)?;
    if !ok || !user.is_active {
        warn!(user_id = %user.id, "login rejected");
        return Err(ApiError::bad_request("LOGIN_BAD_CREDENTIALS"));
    }
    if st.config.require_verification && !user.is_verified {
        return Err(ApiError::bad_request("LOGIN_USER_NOT_VERIFIED"));
    }

    let token = st.jwt
        .sign_access(user.id)
        .map_err(ApiError::Internal)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

/// Issues a reset token for an active user. Unknown emails are not revealed.
pub async fn forgot_password(st: &AppState, email: &str) -> Result<(), ApiError> {
    let email = normalize_email(email);
    let Some(user) = st
        .users
        .find_by_email(&email)
        .await
        .map_err(ApiError::Database)?
        .filter(|u| u.is_active)
    else {
        return Ok(());
    };

    let token = st.jwt
        .sign_reset(user.id, fingerprint(&user.hashed_password))
        .map_err(ApiError::Internal)?;
    info!(user_id = %user.id, %token, "user has forgot password");
    Ok(())
}

pub async fn reset_password(st: &AppState, token: &str, password: String) -> Result<(), ApiError> {
    let bad_token = || ApiError::bad_request("RESET_PASSWORD_BAD_TOKEN");
    let claims = st.jwt
        .verify(token, TokenKind::Reset)
        .map_err(|_| bad_token())?;

    let mut user = st
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(ApiError::Database)?
        .filter(|u| u.is_active)
        .ok_or_else(bad_token)?;
    if claims.fgpt.as_deref() != Some(fingerprint(&user.hashed_password).as_str()) {
        return Err(bad_token());
    }
    if !is_acceptable_password(&password, &user.email) {
        return Err(ApiError::bad_request("RESET_PASSWORD_INVALID_PASSWORD"));
    }

    user.hashed_password = hash_password_blocking(password)
        .await
        .map_err(ApiError::Internal)?;
    st.users.update(&user).await.map_err(ApiError::Database)?;
    info!(user_id = %user.id, "user has reset password");
    Ok(())
}

/// Issues a verification token for an active, unverified user.
pub async fn request_verify(st: &AppState, email: &str) -> Result<(), ApiError> {
    let email = normalize_email(email);
    let Some(user) = st
        .users
        .find_by_email(&email)
        .await
        .map_err(ApiError::Database)?
        .filter(|u| u.is_active && !u.is_verified)
    else {
        return Ok(());
    };

    let token = st.jwt
        .sign_verify(user.id, user.email.clone())
        .map_err(ApiError::Internal)?;
    info!(user_id = %user.id, %token, "verification requested");
    Ok(())
}

pub async fn verify(st: &AppState, token: &str) -> Result<User, ApiError> {
    let bad_token = || ApiError::bad_request("VERIFY_USER_BAD_TOKEN");
    let claims = st.jwt
        .verify(token, TokenKind::Verify)
        .map_err(|_| bad_token())?;

    let mut user = st
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(ApiError::Database)?
        .ok_or_else(bad_token)?;
    if claims.email.as_deref() != Some(user.email.as_str()) {
        return Err(bad_token());
    }
    if user.is_verified {
        return Err(ApiError::bad_request("VERIFY_USER_ALREADY_VERIFIED"));
    }

    user.is_verified = true;
    let user = st.users.update(&user).await.map_err(ApiError::Database)?;
    info!(user_id = %user.id, "user has been verified");
    Ok(user)
}

/// Applies `patch` to `user`. Flags are only honoured when `privileged`.
pub async fn update_user(
    st: &AppState,
    mut user: User,
    patch: AdminUserUpdate,
    privileged: bool,
) -> Result<User, ApiError> {
    if let Some(email) = patch.email {
        let email = normalize_email(&email);
        if email != user.email {
            if !is_valid_email(&email) {
                return Err(ApiError::bad_request("UPDATE_USER_INVALID_EMAIL"));
            }
            if st
                .users
                .find_by_email(&email)
                .await
                .map_err(ApiError::Database)?
                .is_some()
            {
                return Err(ApiError::bad_request("UPDATE_USER_EMAIL_ALREADY_EXISTS"));
            }
            user.email = email;
            user.is_verified = false;
        }
    }
    if let Some(password) = patch.password {
        if !is_acceptable_password(&password, &user.email) {
            return Err(ApiError::bad_request("UPDATE_USER_INVALID_PASSWORD"));
        }
        user.hashed_password = hash_password_blocking(password)
            .await
            .map_err(ApiError::Internal)?;
    }
    if privileged {
        if let Some(v) = patch.is_active {
            user.is_active = v;
        }
        if let Some(v) = patch.is_superuser {
            user.is_superuser = v;
        }
        if let Some(v) = patch.is_verified {
            user.is_verified = v;
        }
    }

    st.users
        .update(&user)
        .await
        .map_err(|e| user_write_error(e, "UPDATE_USER_EMAIL_ALREADY_EXISTS"))
}

/// Looks a user up by a raw path segment; malformed ids read as missing.
pub async fn get_user(st: &AppState, raw_id: &str) -> Result<User, ApiError> {
    let id = Uuid::parse_str(raw_id).map_err(|_| ApiError::not_found("Not Found"))?;
    st.users
        .find_by_id(id)
        .await
        .map_err(ApiError::Database)?
        .ok_or_else(|| ApiError::not_found("Not Found"))
}
