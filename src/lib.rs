pub mod api;
pub mod catalog;
pub mod config;
pub mod models;
pub mod phone;
pub mod purchase;
pub mod refresh;
pub mod session;
pub mod tickets;

use api::auth::AuthApi;
use api::client::{ApiClient, ApiError};
use api::events::EventsApi;
use config::AppConfig;
use session::Session;
use tickets::TicketBoard;

/// Everything a front end needs, sharing one HTTP client and one session.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub session: Session,
    pub events: EventsApi,
    pub auth: AuthApi,
}

impl AppState {
    pub fn new(config: AppConfig, session: Session) -> Result<Self, ApiError> {
        let client = ApiClient::new(&config, session.clone())?;
        Ok(Self {
            events: EventsApi::new(client.clone()),
            auth: AuthApi::new(client, session.clone()),
            config,
            session,
        })
    }

    /// A fresh ticket list using the configured refresh policy.
    pub fn ticket_board(&self) -> TicketBoard {
        TicketBoard::new(self.events.clone(), self.config.refresh.clone())
    }
}
