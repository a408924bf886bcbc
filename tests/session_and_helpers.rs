use std::io::Write;

use httpmock::Method::{PATCH, POST};
use httpmock::MockServer;
use rust_decimal::Decimal;
use serde_json::json;

use nyamix_tickets::api::auth::{AuthError, ProfileUpdate, SignupRequest};
use nyamix_tickets::api::client::AuthScheme;
use nyamix_tickets::catalog::{self, Availability};
use nyamix_tickets::models::{Event, TicketType, User};
use nyamix_tickets::phone;
use nyamix_tickets::session::Session;

mod support;

fn user() -> User {
    User {
        id: "5".to_string(),
        email: "mwila@example.com".to_string(),
        username: "mwila".to_string(),
        avatar: None,
    }
}

fn ticket_types(spec: &[(&str, u32)]) -> Vec<TicketType> {
    spec.iter()
        .enumerate()
        .map(|(i, (price, available))| TicketType {
            id: i as u64 + 1,
            name: format!("T{i}"),
            price: price.parse().unwrap(),
            quantity_available: *available,
            event: None,
        })
        .collect()
}

#[test]
fn session_survives_restart_and_logout_clears_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/session.json");

    let session = Session::persistent(&path).unwrap();
    assert!(!session.is_authenticated());
    session.login("tok-1", Some(user())).unwrap();
    assert!(path.exists());

    let reloaded = Session::persistent(&path).unwrap();
    assert_eq!(reloaded.current_token().as_deref(), Some("tok-1"));
    assert_eq!(reloaded.current_user(), Some(user()));

    reloaded.logout().unwrap();
    assert!(!path.exists());
    assert!(!reloaded.is_authenticated());
    assert_eq!(Session::persistent(&path).unwrap().current_token(), None);
}

#[test]
fn corrupt_session_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{ not json").unwrap();
    assert!(Session::persistent(file.path()).is_err());
}

#[test]
fn empty_token_is_not_authenticated() {
    let session = Session::in_memory();
    session.login("", None).unwrap();
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn subscribers_see_login_and_logout() {
    let session = Session::in_memory();
    let mut rx = session.subscribe();

    session.login("tok-2", None).unwrap();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().auth_token.as_deref(), Some("tok-2"));

    session.logout().unwrap();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().auth_token, None);
}

#[test]
fn phone_validation() {
    for ok in ["0971234567", "971234567", "+260971234567", "260761234567", "077 123-4567"] {
        assert!(phone::is_valid(ok), "{ok} should be valid");
    }
    for bad in ["", "0881234567", "09712345", "+26097123456789", "abc"] {
        assert!(!phone::is_valid(bad), "{bad} should be invalid");
    }
}

#[test]
fn phone_normalization() {
    assert_eq!(phone::normalize("0971234567"), "+260971234567");
    assert_eq!(phone::normalize("+260971234567"), "+260971234567");
    assert_eq!(phone::normalize("971234567"), "+260971234567");
    assert_eq!(phone::normalize("260971234567"), "+260971234567");
    assert_eq!(phone::normalize(" 097-123-4567 "), "+260971234567");
}

#[test]
fn availability_thresholds() {
    assert_eq!(catalog::availability(&[]), Availability::SoldOut);
    let cases = [
        ([("10", 0), ("20", 0)], Availability::SoldOut),
        ([("10", 12), ("20", 7)], Availability::Limited),
        ([("10", 12), ("20", 8)], Availability::Available),
    ];
    for (spec, expected) in cases {
        assert_eq!(catalog::availability(&ticket_types(&spec)), expected);
    }
    assert_eq!(Availability::Limited.label(), "Few Left");
}

#[test]
fn prices_in_k_notation() {
    assert_eq!(catalog::format_price(Decimal::from(750)), "750");
    assert_eq!(catalog::format_price("50.00".parse().unwrap()), "50");
    assert_eq!(catalog::format_price(Decimal::from(1500)), "1.5K");
    assert_eq!(catalog::format_price(Decimal::from(2000)), "2K");

    let types = ticket_types(&[("1500.00", 3), ("50.00", 3), ("300", 3)]);
    assert_eq!(
        catalog::price_range(&types),
        Some((Decimal::from(50), Decimal::from(1500)))
    );
    assert_eq!(catalog::price_label(&types).as_deref(), Some("K50 - K1.5K"));
    assert_eq!(catalog::price_label(&ticket_types(&[("80", 1)])).as_deref(), Some("K80"));
    assert_eq!(catalog::price_label(&[]), None);
}

#[test]
fn category_filter_and_image_urls() {
    let events: Vec<Event> = serde_json::from_value(json!([
        support::event_json(1, 10, vec![]),
        support::event_json(2, 20, vec![]),
        support::event_json(3, 10, vec![]),
    ]))
    .unwrap();

    let music: Vec<u64> = catalog::filter_by_category(&events, Some(10))
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(music, vec![1, 3]);
    assert_eq!(catalog::filter_by_category(&events, None).len(), 3);

    assert_eq!(
        catalog::image_url("https://res.cloudinary.com/demo/", &events[0].image),
        "https://res.cloudinary.com/demo/image/upload/v1/jazz.jpg"
    );
    assert_eq!(
        catalog::image_url("https://res.cloudinary.com/demo/", "https://cdn.example.com/a.png"),
        "https://cdn.example.com/a.png"
    );
}

#[test]
fn auth_scheme_parsing() {
    assert_eq!("raw".parse::<AuthScheme>(), Ok(AuthScheme::Raw));
    assert_eq!("Bearer".parse::<AuthScheme>(), Ok(AuthScheme::Bearer));
    assert_eq!("TOKEN".parse::<AuthScheme>(), Ok(AuthScheme::Token));
    assert!("basic".parse::<AuthScheme>().is_err());
    assert_eq!(AuthScheme::Bearer.header_value("x"), "Bearer x");
}

#[test]
fn signup_validation() {
    let blank = SignupRequest {
        email: "a@b.c".to_string(),
        username: " ".to_string(),
        password: "secret1".to_string(),
    };
    assert_eq!(
        blank.validate().get("form").map(String::as_str),
        Some("Please fill in all fields")
    );

    let bad = SignupRequest {
        email: "nobody".to_string(),
        username: "mwila".to_string(),
        password: "123".to_string(),
    };
    let errors = bad.validate();
    assert!(errors.contains_key("email"));
    assert!(errors.contains_key("password"));
}

#[tokio::test]
async fn invalid_signup_is_not_sent() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST).path("/auth/users/");
        then.status(201);
    });

    let state = support::build_state(&server);
    let err = state
        .auth
        .signup(&SignupRequest {
            email: "mwila".to_string(),
            username: "mwila".to_string(),
            password: "secret1".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Invalid(_)));
    mock.assert_hits(0);
}

#[test]
fn profile_validation() {
    let update = ProfileUpdate {
        first_name: "Mwila".to_string(),
        last_name: "".to_string(),
        phone_number: "097 123 4567".to_string(),
        ..ProfileUpdate::default()
    };
    let errors = update.validate();
    assert_eq!(errors.len(), 1);
    assert!(errors.contains_key("last_name"));

    let update = ProfileUpdate {
        first_name: "Mwila".to_string(),
        last_name: "Banda".to_string(),
        phone_number: "call me".to_string(),
        ..ProfileUpdate::default()
    };
    assert!(update.validate().contains_key("phone_number"));
}

#[tokio::test]
async fn profile_update_sends_multipart_with_avatar() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(PATCH)
            .path("/accounts/profile/update/")
            .header("Authorization", support::TOKEN)
            .body_includes("name=\"first_name\"")
            .body_includes("Mwila")
            .body_includes("filename=\"me.png\"");
        then.status(200)
            .json_body(json!({ "first_name": "Mwila", "last_name": "Banda" }));
    });

    let dir = tempfile::tempdir().unwrap();
    let avatar = dir.path().join("me.png");
    std::fs::write(&avatar, b"fake png bytes").unwrap();

    let state = support::authed_state(&server);
    let body = state
        .auth
        .update_profile(&ProfileUpdate {
            first_name: "Mwila".to_string(),
            last_name: "Banda".to_string(),
            phone_number: "+260971234567".to_string(),
            date_of_birth: "1994-03-02".parse().ok(),
            avatar: Some(avatar),
        })
        .await
        .expect("update");

    mock.assert();
    assert_eq!(body["last_name"], "Banda");
}

#[tokio::test]
async fn oversized_or_non_image_avatar_is_rejected() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(PATCH).path("/accounts/profile/update/");
        then.status(200);
    });

    let dir = tempfile::tempdir().unwrap();
    let big = dir.path().join("big.jpg");
    std::fs::File::create(&big)
        .unwrap()
        .set_len(6 * 1024 * 1024)
        .unwrap();
    let doc = dir.path().join("cv.pdf");
    std::fs::write(&doc, b"%PDF").unwrap();

    let state = support::authed_state(&server);
    for avatar in [big, doc] {
        let err = state
            .auth
            .update_profile(&ProfileUpdate {
                first_name: "Mwila".to_string(),
                last_name: "Banda".to_string(),
                phone_number: "0971234567".to_string(),
                date_of_birth: None,
                avatar: Some(avatar),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Avatar(_)));
    }
    mock.assert_hits(0);
}

#[test]
fn phone_mask_keeps_last_four() {
    assert_eq!(phone::mask("+260971234567"), "*********4567");
    assert_eq!(phone::mask("4567"), "4567");
    assert_eq!(phone::mask("12"), "12");
    assert_eq!(phone::mask(""), "");
}
