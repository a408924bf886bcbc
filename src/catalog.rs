// src/catalog.rs

use rust_decimal::Decimal;

use crate::models::{Event, TicketType};

/// Below this many tickets left across all types an event shows as limited.
pub const LIMITED_THRESHOLD: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    SoldOut,
    Limited,
    Available,
}

impl Availability {
    pub fn label(self) -> &'static str {
        match self {
            Availability::SoldOut => "Sold Out",
            Availability::Limited => "Few Left",
            Availability::Available => "Available",
        }
    }
}

pub fn availability(ticket_types: &[TicketType]) -> Availability {
    let total: u32 = ticket_types.iter().map(|t| t.quantity_available).sum();
    match total {
        0 => Availability::SoldOut,
        n if n < LIMITED_THRESHOLD => Availability::Limited,
        _ => Availability::Available,
    }
}

pub fn price_range(ticket_types: &[TicketType]) -> Option<(Decimal, Decimal)> {
    let min = ticket_types.iter().map(|t| t.price).min()?;
    let max = ticket_types.iter().map(|t| t.price).max()?;
    Some((min, max))
}

/// `1500` -> `1.5K`, `2000` -> `2K`, `750` -> `750`.
pub fn format_price(price: Decimal) -> String {
    let thousand = Decimal::from(1000);
    if price >= thousand {
        let k = (price / thousand).round_dp(1).normalize();
        format!("{k}K")
    } else {
        price.normalize().to_string()
    }
}

/// `K50` or `K50 - K1.5K`, in Zambian kwacha.
pub fn price_label(ticket_types: &[TicketType]) -> Option<String> {
    let (min, max) = price_range(ticket_types)?;
    if min == max {
        Some(format!("K{}", format_price(min)))
    } else {
        Some(format!("K{} - K{}", format_price(min), format_price(max)))
    }
}

pub fn filter_by_category(events: &[Event], category_id: Option<u64>) -> Vec<&Event> {
    events
        .iter()
        .filter(|e| match category_id {
            None => true,
            Some(id) => e.category.as_ref().is_some_and(|c| c.id == id),
        })
        .collect()
}

/// Event images are stored relative to the CDN root unless already absolute.
pub fn image_url(image_base_url: &str, image: &str) -> String {
    if image.starts_with("http://") || image.starts_with("https://") {
        return image.to_string();
    }
    format!(
        "{}/{}",
        image_base_url.trim_end_matches('/'),
        image.trim_start_matches('/')
    )
}
