#![allow(dead_code)]

use std::time::Duration;

use httpmock::MockServer;
use serde_json::{Value, json};

use nyamix_tickets::AppState;
use nyamix_tickets::config::AppConfig;
use nyamix_tickets::refresh::RefreshPolicy;
use nyamix_tickets::session::Session;

pub const TOKEN: &str = "tok-abc123";

pub fn test_config(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default().with_base_url(server.base_url());
    config.timeout = Duration::from_millis(500);
    config.refresh = RefreshPolicy::fixed(Duration::from_millis(100));
    config
}

pub fn build_state(server: &MockServer) -> AppState {
    AppState::new(test_config(server), Session::in_memory()).expect("build state")
}

pub fn authed_state(server: &MockServer) -> AppState {
    let state = build_state(server);
    state.session.login(TOKEN, None).expect("login");
    state
}

pub fn ticket_type_json(id: u64, name: &str, price: Value, available: u32) -> Value {
    json!({
        "id": id,
        "name": name,
        "price": price,
        "quantity_available": available,
        "event": 7
    })
}

pub fn event_json(id: u64, category_id: u64, ticket_types: Vec<Value>) -> Value {
    json!({
        "id": id,
        "title": format!("Lusaka Jazz Night {id}"),
        "description": "Live jazz at the showgrounds",
        "location": "Lusaka Showgrounds",
        "date": "2026-12-05T19:00:00Z",
        "image": "image/upload/v1/jazz.jpg",
        "phone_number": "+260971000000",
        "category": { "id": category_id, "name": "Music" },
        "ticket_types": ticket_types
    })
}

pub fn ticket_json(id: &str, status: &str, payment_status: &str) -> Value {
    json!({
        "id": id,
        "secret_code": format!("SECRET-{id}"),
        "ticket_number": format!("NX-{id}"),
        "quantity": 2,
        "ticket_price": "75.00",
        "status": status,
        "payment_status": payment_status,
        "event_title": "Lusaka Jazz Night",
        "event_date": "2026-12-05T19:00:00Z",
        "event_location": "Lusaka Showgrounds",
        "ticket_type_name": "VIP",
        "customer_first_name": "Mwila",
        "customer_last_name": "Banda",
        "customer_phone": "0971234567"
    })
}
