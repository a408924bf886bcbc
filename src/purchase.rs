// src/purchase.rs
//
// Ticket purchase workflow: pick a ticket type and quantity, enter the
// mobile-money phone, then create the ticket and request the payment, in
// that order.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::api::client::ApiError;
use crate::api::events::{EventsApi, PaymentRequest};
use crate::models::{Event, TicketId, TicketType};
use crate::phone;
use crate::session::Session;

/// Per-order limit, independent of stock.
pub const ORDER_CAP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    TicketType,
    Quantity,
    Phone,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::TicketType => "ticketType",
            Field::Quantity => "quantity",
            Field::Phone => "phone",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ValidationErrors = BTreeMap<Field, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseSelection {
    pub ticket_type: Option<TicketType>,
    pub quantity: u32,
    /// Raw input, normalized only when the payment is requested.
    pub phone: String,
}

impl Default for PurchaseSelection {
    fn default() -> Self {
        Self {
            ticket_type: None,
            quantity: 1,
            phone: String::new(),
        }
    }
}

/// A purchase whose payment request was accepted. The ticket is still
/// `pending` until the provider confirms; the ticket list shows the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOutcome {
    pub ticket_id: TicketId,
    pub ticket_type_id: u64,
    pub quantity: u32,
    pub amount: Decimal,
    pub phone: String,
    pub payment_status: Option<String>,
}

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("{}", first_message(.0))]
    Validation(ValidationErrors),

    #[error("Please log in to purchase tickets")]
    AuthenticationRequired,

    #[error("{0}")]
    Purchase(ApiError),

    /// The ticket exists server-side in `pending`; pay for it again from the ticket list.
    #[error("{source}")]
    Payment { ticket_id: TicketId, source: ApiError },
}

fn first_message(errors: &ValidationErrors) -> String {
    errors.values().next().cloned().unwrap_or_default()
}

impl PurchaseError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

pub struct PurchaseFlow {
    ticket_types: Vec<TicketType>,
    selection: PurchaseSelection,
    errors: ValidationErrors,
    phase: Phase,
}

impl PurchaseFlow {
    pub fn new(ticket_types: Vec<TicketType>) -> Self {
        Self {
            ticket_types,
            selection: PurchaseSelection::default(),
            errors: ValidationErrors::new(),
            phase: Phase::Idle,
        }
    }

    pub fn for_event(event: &Event) -> Self {
        Self::new(event.ticket_types.clone())
    }

    pub fn ticket_types(&self) -> &[TicketType] {
        &self.ticket_types
    }

    pub fn selection(&self) -> &PurchaseSelection {
        &self.selection
    }

    pub fn quantity(&self) -> u32 {
        self.selection.quantity
    }

    /// Errors surfaced by the last submit, minus the ones cleared by edits since.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The submit control is disabled while this is true.
    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    /// Upper bound for the quantity stepper; 0 when nothing is selected.
    pub fn max_quantity(&self) -> u32 {
        self.selection
            .ticket_type
            .as_ref()
            .map(|t| t.quantity_available.min(ORDER_CAP))
            .unwrap_or(0)
    }

    /// Unknown ids leave nothing selected; that only becomes an error on submit.
    pub fn select_ticket_type(&mut self, id: u64) {
        self.selection.ticket_type = self.ticket_types.iter().find(|t| t.id == id).cloned();
        self.selection.quantity = 1;
        self.errors.remove(&Field::TicketType);
        self.errors.remove(&Field::Quantity);
    }

    /// Steps the quantity within `[1, min(available, ORDER_CAP)]`.
    /// Steps past either bound are ignored.
    pub fn change_quantity(&mut self, change: QuantityChange) {
        if self.selection.ticket_type.is_none() {
            return;
        }
        let current = self.selection.quantity;
        let next = match change {
            QuantityChange::Increment => current.checked_add(1),
            QuantityChange::Decrement => current.checked_sub(1),
        };
        if let Some(next) = next {
            if next >= 1 && next <= self.max_quantity() {
                self.selection.quantity = next;
            }
        }
    }

    /// Steps the quantity to exactly `requested`. Out of reach (zero, past
    /// stock or past [`ORDER_CAP`]) is an error and the quantity is left alone.
    pub fn request_quantity(&mut self, requested: u32) -> Result<(), PurchaseError> {
        if self.selection.ticket_type.is_none() {
            let mut errors = ValidationErrors::new();
            errors.insert(Field::TicketType, "Please select a ticket type".to_string());
            self.errors.extend(errors.clone());
            return Err(PurchaseError::Validation(errors));
        }

        let max = self.max_quantity();
        if requested < 1 || requested > max {
            let mut errors = ValidationErrors::new();
            errors.insert(Field::Quantity, format!("Quantity must be between 1 and {max}"));
            self.errors.extend(errors.clone());
            return Err(PurchaseError::Validation(errors));
        }

        while self.selection.quantity < requested {
            self.change_quantity(QuantityChange::Increment);
        }
        while self.selection.quantity > requested {
            self.change_quantity(QuantityChange::Decrement);
        }
        self.errors.remove(&Field::Quantity);
        Ok(())
    }

    pub fn set_phone(&mut self, value: impl Into<String>) {
        self.selection.phone = value.into();
        self.errors.remove(&Field::Phone);
    }

    /// Every violated rule at once; empty when the selection can be submitted.
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        match &self.selection.ticket_type {
            None => {
                errors.insert(Field::TicketType, "Please select a ticket type".to_string());
            }
            Some(ticket_type) => {
                let available = ticket_type.quantity_available;
                let quantity = self.selection.quantity;
                if quantity < 1 || quantity > available {
                    errors.insert(
                        Field::Quantity,
                        format!("Quantity must be between 1 and {available}"),
                    );
                }
            }
        }

        let phone = self.selection.phone.trim();
        if phone.is_empty() {
            errors.insert(Field::Phone, "Phone number is required".to_string());
        } else if !phone::is_valid(phone) {
            errors.insert(
                Field::Phone,
                "Please enter a valid Zambian mobile phone number".to_string(),
            );
        }

        errors
    }

    pub fn total(&self) -> Decimal {
        match &self.selection.ticket_type {
            Some(t) => t.price * Decimal::from(self.selection.quantity),
            None => Decimal::ZERO,
        }
    }

    /// Creates the ticket, then asks for the mobile-money payment.
    ///
    /// Nothing is sent when validation fails or nobody is logged in. The
    /// payment is only requested once the ticket exists; if the payment
    /// request fails the pending ticket stays on the backend and is paid
    /// later through the ticket list.
    pub async fn submit(
        &mut self,
        api: &EventsApi,
        session: &Session,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let errors = self.validate();
        if !errors.is_empty() {
            self.errors = errors.clone();
            self.phase = Phase::Idle;
            return Err(PurchaseError::Validation(errors));
        }

        if !session.is_authenticated() {
            log::warn!("purchase attempted without a session");
            self.phase = Phase::Idle;
            return Err(PurchaseError::AuthenticationRequired);
        }

        let Some(ticket_type) = self.selection.ticket_type.clone() else {
            return Err(PurchaseError::Validation(self.validate()));
        };
        let quantity = self.selection.quantity;

        self.errors.clear();
        self.phase = Phase::Submitting;

        let receipt = match api.purchase_ticket(ticket_type.id, quantity).await {
            Ok(r) => r,
            Err(e) => {
                log::error!(
                    "ticket purchase failed ticket_type_id={} quantity={} err={}",
                    ticket_type.id,
                    quantity,
                    e
                );
                self.phase = Phase::Failed(e.message());
                return Err(PurchaseError::Purchase(e));
            }
        };

        let local_total = self.total();
        let amount = match receipt.total_price {
            Some(backend_total) => {
                if backend_total != local_total {
                    log::warn!(
                        "backend total differs ticket_id={} backend={} local={}",
                        receipt.id,
                        backend_total,
                        local_total
                    );
                }
                backend_total
            }
            None => local_total,
        };

        let request = PaymentRequest {
            phone: phone::normalize(&self.selection.phone),
            amount,
            ticket_id: receipt.id.clone(),
        };

        match api.request_mobile_money_payment(&request).await {
            Ok(ack) => {
                log::info!(
                    "payment initiated ticket_id={} amount={} status={:?}",
                    request.ticket_id,
                    request.amount,
                    ack.status
                );
                self.phase = Phase::Succeeded;
                self.selection = PurchaseSelection::default();
                Ok(PurchaseOutcome {
                    ticket_id: request.ticket_id,
                    ticket_type_id: ticket_type.id,
                    quantity,
                    amount: request.amount,
                    phone: request.phone,
                    payment_status: ack.status,
                })
            }
            Err(e) => {
                log::error!(
                    "payment request failed ticket_id={} err={}",
                    request.ticket_id,
                    e
                );
                self.phase = Phase::Failed(e.message());
                Err(PurchaseError::Payment {
                    ticket_id: request.ticket_id,
                    source: e,
                })
            }
        }
    }
}
