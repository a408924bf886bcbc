// src/api/events.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::client::{ApiClient, ApiError, Parsed};
use crate::models::{Category, Event, Ticket, TicketId, de};
use crate::phone;

pub const PAYMENT_METHOD_MOBILE_MONEY: &str = "mobile_money";

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseTicketRequest {
    pub ticket_type_id: String,
    pub quantity: u32,
    pub payment_method: &'static str,
}

/// What `POST /events/tickets/` returns: the pending ticket's id and the
/// backend's total, which may arrive as a string or a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PurchaseReceipt {
    pub id: TicketId,
    #[serde(default, deserialize_with = "de::opt_decimal")]
    pub total_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub phone: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "ticketId")]
    pub ticket_id: TicketId,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PaymentAck {
    #[serde(default)]
    pub status: Option<String>,
}

/// Typed calls for the catalog, ticket purchase and payment endpoints.
#[derive(Clone)]
pub struct EventsApi {
    client: ApiClient,
}

impl EventsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn home_events(&self) -> Result<Vec<Event>, ApiError> {
        self.client.get_json("/events/home-events/").await
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.client.get_json("/events/categories/").await
    }

    pub async fn events_by_category(&self, category_id: u64) -> Result<Vec<Event>, ApiError> {
        self.client
            .get_json(&format!("/events/categories/{category_id}/events/"))
            .await
    }

    /// There is no single-event endpoint; the event is looked up in the home listing.
    pub async fn find_event(&self, event_id: u64) -> Result<Option<Event>, ApiError> {
        let events = self.home_events().await?;
        Ok(events.into_iter().find(|e| e.id == event_id))
    }

    pub async fn purchase_ticket(
        &self,
        ticket_type_id: u64,
        quantity: u32,
    ) -> Result<PurchaseReceipt, ApiError> {
        let body = PurchaseTicketRequest {
            ticket_type_id: ticket_type_id.to_string(),
            quantity,
            payment_method: PAYMENT_METHOD_MOBILE_MONEY,
        };
        log::info!("purchase ticket ticket_type_id={} quantity={}", ticket_type_id, quantity);
        self.client.post_json("/events/tickets/", &body).await
    }

    pub async fn request_mobile_money_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentAck, ApiError> {
        log::info!(
            "mobile money request ticket_id={} phone={} amount={}",
            request.ticket_id,
            phone::mask(&request.phone),
            request.amount
        );
        let parsed = self
            .client
            .post("/payments/request-mobile-money-payment", Some(request))
            .await?;

        Ok(match parsed {
            Parsed::Json(value) => serde_json::from_value(value).unwrap_or_default(),
            Parsed::Text(text) => PaymentAck { status: Some(text) },
            Parsed::Empty => PaymentAck::default(),
        })
    }

    /// The signed-in user's tickets, with every total filled in.
    pub async fn user_tickets(&self) -> Result<Vec<Ticket>, ApiError> {
        let mut tickets: Vec<Ticket> = self.client.get_json("/events/tickets/").await?;
        for ticket in &mut tickets {
            ticket.normalize_total();
        }
        Ok(tickets)
    }
}
