// src/session.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::models::User;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// What survives between runs: the token and the last known user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub auth_token: Option<String>,
    pub user: Option<User>,
}

/// Process-wide authentication state.
///
/// Every outgoing request reads the token from here. Changes are published
/// through a `watch` channel, so screens can react to login/logout without
/// polling storage.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    tx: watch::Sender<SessionState>,
    file: Option<PathBuf>,
}

impl Session {
    pub fn in_memory() -> Self {
        Self::build(SessionState::default(), None)
    }

    /// Loads the session from `path` if it exists; later changes are written back.
    pub fn persistent(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionState::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::build(state, Some(path)))
    }

    fn build(state: SessionState, file: Option<PathBuf>) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self {
            inner: Arc::new(Inner { tx, file }),
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.inner.file.as_deref()
    }

    pub fn login(&self, token: impl Into<String>, user: Option<User>) -> Result<(), SessionError> {
        let state = SessionState {
            auth_token: Some(token.into()),
            user,
        };
        self.inner.tx.send_replace(state.clone());
        log::info!("session login user={:?}", state.user.as_ref().map(|u| &u.username));
        self.persist(&state)
    }

    pub fn set_user(&self, user: User) -> Result<(), SessionError> {
        self.inner.tx.send_modify(|state| state.user = Some(user));
        let state = self.inner.tx.borrow().clone();
        self.persist(&state)
    }

    /// Clears memory and disk. Requests already in flight keep the old token.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.inner.tx.send_replace(SessionState::default());
        log::info!("session logout");
        match &self.inner.file {
            Some(path) => match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            None => Ok(()),
        }
    }

    pub fn current_token(&self) -> Option<String> {
        self.inner.tx.borrow().auth_token.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.tx.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .tx
            .borrow()
            .auth_token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.tx.subscribe()
    }

    fn persist(&self, state: &SessionState) -> Result<(), SessionError> {
        let Some(path) = &self.inner.file else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::write(path, serde_json::to_vec_pretty(state)?)?;
        Ok(())
    }
}
