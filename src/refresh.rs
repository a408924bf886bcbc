// src/refresh.rs
//
// Payment status only changes server-side, after the mobile-money provider
// calls back. After a payment request we re-fetch the ticket list later,
// either once after a fixed delay or a few times with growing delays.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::models::TicketId;
use crate::tickets::{TicketBoard, TicketDisplay};

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPolicy {
    pub initial_delay: Duration,
    pub max_attempts: u32,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl RefreshPolicy {
    /// One re-fetch after `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_attempts: 1,
            multiplier: 1.0,
            max_delay: delay,
        }
    }

    /// Up to `max_attempts` re-fetches, doubling the wait each time (capped at 60s).
    pub fn backoff(initial_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_attempts: max_attempts.max(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60).max(initial_delay),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_delay)
    }
}

/// How a scheduled re-fetch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// The backend moved the ticket on; this is its new display state.
    Settled(TicketDisplay),
    /// Attempts ran out while the ticket still looked unchanged.
    Unsettled,
}

/// Handle to a background re-fetch. Dropping it does not cancel the task.
#[derive(Debug)]
pub struct ScheduledRefresh {
    pub ticket_id: TicketId,
    handle: JoinHandle<Settlement>,
}

impl ScheduledRefresh {
    pub async fn wait(self) -> Settlement {
        match self.handle.await {
            Ok(settlement) => settlement,
            Err(e) => {
                log::warn!("refresh task ended abnormally ticket_id={} err={}", self.ticket_id, e);
                Settlement::Unsettled
            }
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

pub(crate) fn spawn_settlement(
    board: TicketBoard,
    ticket_id: TicketId,
    policy: RefreshPolicy,
) -> ScheduledRefresh {
    let task_ticket = ticket_id.clone();
    let handle = tokio::spawn(async move {
        for attempt in 0..policy.max_attempts {
            tokio::time::sleep(policy.delay_for(attempt)).await;

            if let Err(e) = board.refresh().await {
                log::warn!(
                    "ticket refresh failed ticket_id={} attempt={} err={}",
                    task_ticket,
                    attempt + 1,
                    e
                );
                continue;
            }

            if !board.is_awaiting(&task_ticket).await {
                let display = board
                    .display_for(&task_ticket)
                    .await
                    .unwrap_or(TicketDisplay::Issued);
                log::info!("ticket settled ticket_id={} display={:?}", task_ticket, display);
                return Settlement::Settled(display);
            }
        }

        // Give the retry action back to the user.
        board.release(&task_ticket).await;
        log::info!("ticket still unsettled ticket_id={}", task_ticket);
        Settlement::Unsettled
    });

    ScheduledRefresh { ticket_id, handle }
}
