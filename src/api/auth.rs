// src/api/auth.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::api::client::{ApiClient, ApiError, Parsed};
use crate::models::{AuthResponse, User};
use crate::session::Session;

pub const MAX_AVATAR_BYTES: u64 = 5 * 1024 * 1024;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{}", join_messages(.0))]
    Invalid(BTreeMap<&'static str, String>),

    #[error("{0}")]
    Avatar(String),

    #[error("could not read avatar: {0}")]
    Io(#[from] std::io::Error),
}

fn join_messages(errors: &BTreeMap<&'static str, String>) -> String {
    errors.values().cloned().collect::<Vec<_>>().join("\n")
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> BTreeMap<&'static str, String> {
        let mut errors = BTreeMap::new();
        if self.email.trim().is_empty()
            || self.username.trim().is_empty()
            || self.password.trim().is_empty()
        {
            errors.insert("form", "Please fill in all fields".to_string());
            return errors;
        }
        if !self.email.contains('@') {
            errors.insert("email", "Please enter a valid email address".to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.insert(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
            );
        }
        errors
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub avatar: Option<PathBuf>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> BTreeMap<&'static str, String> {
        let mut errors = BTreeMap::new();
        if self.first_name.trim().is_empty() {
            errors.insert("first_name", "First name is required".to_string());
        }
        if self.last_name.trim().is_empty() {
            errors.insert("last_name", "Last name is required".to_string());
        }
        let phone = self.phone_number.trim();
        if phone.is_empty() {
            errors.insert("phone_number", "Phone number is required".to_string());
        } else if !LOOSE_PHONE.is_match(phone) {
            errors.insert("phone_number", "Please enter a valid phone number".to_string());
        }
        errors
    }
}

static LOOSE_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9\s-]+$").expect("static phone pattern"));

fn avatar_mime(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Login, signup and profile calls. Login and logout keep the [`Session`] in step.
#[derive(Clone)]
pub struct AuthApi {
    client: ApiClient,
    session: Session,
}

impl AuthApi {
    pub fn new(client: ApiClient, session: Session) -> Self {
        Self { client, session }
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, AuthError> {
        let endpoint = self.client.versioned("/auth/token/login/");
        let resp: AuthResponse = self.client.post_json(&endpoint, req).await?;

        // Not being able to write the session file does not undo the login.
        if let Err(e) = self.session.login(resp.auth_token.clone(), resp.user.clone()) {
            log::warn!("session persist failed username={} err={}", req.username, e);
        }
        Ok(resp)
    }

    pub async fn signup(&self, req: &SignupRequest) -> Result<User, AuthError> {
        let errors = req.validate();
        if !errors.is_empty() {
            return Err(AuthError::Invalid(errors));
        }
        let endpoint = self.client.versioned("/auth/users/");
        Ok(self.client.post_json(&endpoint, req).await?)
    }

    pub async fn me(&self) -> Result<User, AuthError> {
        let endpoint = self.client.versioned("/auth/users/me/");
        let user: User = self.client.get_json(&endpoint).await?;
        if let Err(e) = self.session.set_user(user.clone()) {
            log::warn!("session persist failed err={}", e);
        }
        Ok(user)
    }

    pub fn logout(&self) {
        if let Err(e) = self.session.logout() {
            log::warn!("session clear failed err={}", e);
        }
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Value, AuthError> {
        let errors = update.validate();
        if !errors.is_empty() {
            return Err(AuthError::Invalid(errors));
        }

        let mut form = Form::new()
            .text("first_name", update.first_name.trim().to_string())
            .text("last_name", update.last_name.trim().to_string())
            .text("phone_number", update.phone_number.trim().to_string());

        if let Some(dob) = update.date_of_birth {
            form = form.text("date_of_birth", dob.format("%Y-%m-%d").to_string());
        }

        if let Some(path) = &update.avatar {
            let mime = avatar_mime(path)
                .ok_or_else(|| AuthError::Avatar("Please upload an image file".to_string()))?;
            let meta = tokio::fs::metadata(path).await?;
            if meta.len() > MAX_AVATAR_BYTES {
                return Err(AuthError::Avatar(
                    "Please upload an image smaller than 5MB".to_string(),
                ));
            }
            let bytes = tokio::fs::read(path).await?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("avatar")
                .to_string();
            let part = Part::bytes(bytes)
                .file_name(filename)
                .mime_str(mime)
                .map_err(|e| AuthError::Avatar(e.to_string()))?;
            form = form.part("avatar", part);
        }

        let parsed = self
            .client
            .patch_multipart("/accounts/profile/update/", form)
            .await?;

        Ok(match parsed {
            Parsed::Json(value) => value,
            Parsed::Text(text) => Value::String(text),
            Parsed::Empty => Value::Null,
        })
    }
}
