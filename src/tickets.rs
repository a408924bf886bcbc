// src/tickets.rs
//
// The "My Tickets" view-model. Ticket state is owned by the backend; this
// only re-derives what to show from the latest fetch.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::api::client::ApiError;
use crate::api::events::{EventsApi, PaymentRequest};
use crate::models::{PaymentStatus, Ticket, TicketId, TicketStatus};
use crate::phone;
use crate::refresh::{self, RefreshPolicy, ScheduledRefresh};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TicketDisplay {
    /// Scanned at the venue. No actions.
    Attended,
    /// Paid and confirmed: the redemption code may be shown.
    Redeemable { secret_code: String },
    RetryPayment,
    PaymentProcessing,
    Issued,
}

pub fn classify(ticket: &Ticket) -> TicketDisplay {
    match (&ticket.status, &ticket.payment_status) {
        (TicketStatus::Attended, _) => TicketDisplay::Attended,
        // No code yet means nothing to redeem at the gate.
        (TicketStatus::Confirmed, PaymentStatus::Successful)
            if !ticket.secret_code.trim().is_empty() =>
        {
            TicketDisplay::Redeemable {
                secret_code: ticket.secret_code.clone(),
            }
        }
        (_, PaymentStatus::Failed | PaymentStatus::NotProcessed) => TicketDisplay::RetryPayment,
        (_, PaymentStatus::Pending) => TicketDisplay::PaymentProcessing,
        _ => TicketDisplay::Issued,
    }
}

pub fn status_label(status: &PaymentStatus) -> String {
    match status {
        PaymentStatus::Successful => "Payment Complete".to_string(),
        PaymentStatus::Pending => "Payment Pending".to_string(),
        PaymentStatus::Failed => "Payment Failed".to_string(),
        other => other.as_str().to_string(),
    }
}

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("ticket {0} not found")]
    UnknownTicket(TicketId),

    #[error("ticket {0} has no failed payment to retry")]
    NotRetryable(TicketId),

    #[error("Please enter a valid Zambian mobile phone number")]
    InvalidPhone,

    #[error("{0}")]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TicketView {
    pub ticket: Ticket,
    pub display: TicketDisplay,
    pub payment_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardSummary {
    pub total: usize,
    pub redeemable: usize,
    pub processing: usize,
    pub retryable: usize,
    pub attended: usize,
    pub issued: usize,
}

#[derive(Default)]
struct BoardState {
    tickets: Vec<Ticket>,
    /// Tickets with a payment request in flight, keyed to the payment status
    /// they had when it was sent.
    awaiting: HashMap<TicketId, PaymentStatus>,
}

impl BoardState {
    fn display(&self, ticket: &Ticket) -> TicketDisplay {
        if self.awaiting.contains_key(&ticket.id) {
            TicketDisplay::PaymentProcessing
        } else {
            classify(ticket)
        }
    }
}

/// The user's ticket list. Clones share the same state.
#[derive(Clone)]
pub struct TicketBoard {
    api: EventsApi,
    policy: RefreshPolicy,
    state: Arc<RwLock<BoardState>>,
}

impl TicketBoard {
    pub fn new(api: EventsApi, policy: RefreshPolicy) -> Self {
        Self {
            api,
            policy,
            state: Arc::new(RwLock::new(BoardState::default())),
        }
    }

    /// Replaces the list with a fresh fetch. Returns the ticket count.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        let tickets = self.api.user_tickets().await?;
        let mut state = self.state.write().await;

        // A ticket stops awaiting once the backend reports anything new for it.
        let fresh: HashMap<&TicketId, &PaymentStatus> =
            tickets.iter().map(|t| (&t.id, &t.payment_status)).collect();
        let settled: Vec<TicketId> = state
            .awaiting
            .iter()
            .filter(|(id, sent_with)| fresh.get(id).is_none_or(|now| *now != *sent_with))
            .map(|(id, _)| id.clone())
            .collect();
        for id in settled {
            state.awaiting.remove(&id);
        }

        state.tickets = tickets;
        log::debug!("tickets refreshed count={}", state.tickets.len());
        Ok(state.tickets.len())
    }

    pub async fn views(&self) -> Vec<TicketView> {
        let state = self.state.read().await;
        state
            .tickets
            .iter()
            .map(|t| TicketView {
                ticket: t.clone(),
                display: state.display(t),
                payment_label: status_label(&t.payment_status),
            })
            .collect()
    }

    pub async fn ticket(&self, id: &TicketId) -> Option<Ticket> {
        let state = self.state.read().await;
        state.tickets.iter().find(|t| &t.id == id).cloned()
    }

    pub async fn display_for(&self, id: &TicketId) -> Option<TicketDisplay> {
        let state = self.state.read().await;
        state.tickets.iter().find(|t| &t.id == id).map(|t| state.display(t))
    }

    pub async fn is_awaiting(&self, id: &TicketId) -> bool {
        self.state.read().await.awaiting.contains_key(id)
    }

    /// Drops the awaiting mark so the ticket shows its fetched state again.
    pub async fn release(&self, id: &TicketId) {
        self.state.write().await.awaiting.remove(id);
    }

    pub async fn summary(&self) -> BoardSummary {
        let state = self.state.read().await;
        let mut summary = BoardSummary {
            total: state.tickets.len(),
            ..BoardSummary::default()
        };
        for ticket in &state.tickets {
            match state.display(ticket) {
                TicketDisplay::Attended => summary.attended += 1,
                TicketDisplay::Redeemable { .. } => summary.redeemable += 1,
                TicketDisplay::RetryPayment => summary.retryable += 1,
                TicketDisplay::PaymentProcessing => summary.processing += 1,
                TicketDisplay::Issued => summary.issued += 1,
            }
        }
        summary
    }

    /// Sends a new mobile-money request for an existing ticket whose payment
    /// failed. `phone` falls back to the phone stored on the ticket.
    ///
    /// On success the ticket shows as processing and a re-fetch is scheduled.
    /// On failure nothing changes and the user may try again.
    pub async fn retry_payment(
        &self,
        ticket_id: &TicketId,
        phone: Option<&str>,
    ) -> Result<ScheduledRefresh, TicketError> {
        let (ticket, display) = {
            let state = self.state.read().await;
            let ticket = state
                .tickets
                .iter()
                .find(|t| &t.id == ticket_id)
                .cloned()
                .ok_or_else(|| TicketError::UnknownTicket(ticket_id.clone()))?;
            let display = state.display(&ticket);
            (ticket, display)
        };

        if display != TicketDisplay::RetryPayment {
            return Err(TicketError::NotRetryable(ticket_id.clone()));
        }

        let raw_phone = phone
            .map(str::to_string)
            .or_else(|| ticket.customer_phone.clone())
            .unwrap_or_default();
        if !phone::is_valid(&raw_phone) {
            return Err(TicketError::InvalidPhone);
        }

        let request = PaymentRequest {
            phone: phone::normalize(&raw_phone),
            amount: ticket.total(),
            ticket_id: ticket.id.clone(),
        };

        if let Err(e) = self.api.request_mobile_money_payment(&request).await {
            log::error!("payment retry failed ticket_id={} err={}", ticket.id, e);
            return Err(e.into());
        }

        log::info!("payment retry sent ticket_id={} amount={}", ticket.id, request.amount);
        self.state
            .write()
            .await
            .awaiting
            .insert(ticket.id.clone(), ticket.payment_status.clone());

        Ok(refresh::spawn_settlement(
            self.clone(),
            ticket.id,
            self.policy.clone(),
        ))
    }
}
