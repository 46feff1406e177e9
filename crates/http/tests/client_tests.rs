//! Integration tests for the hotel API client

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use hotelier_core::MemoryTokenStore;
use hotelier_http::types::{BookingStatus, LoginCredentials, RoomType};
use hotelier_http::{ApiRequest, ApiResponse, ClientError, ErrorKind, HotelClient, Stage};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_body() -> serde_json::Value {
    json!({"id": 1, "email": "desk@hotel.test", "is_active": true, "is_superuser": false})
}

#[tokio::test]
async fn test_client_builder() {
    let client = HotelClient::builder()
        .base_url("http://localhost:8000/api/v1/")
        .build()
        .unwrap();

    assert_eq!(client.base_url(), "http://localhost:8000/api/v1");
    assert!(client.stage_names().is_empty());
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = HotelClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));

    let result = HotelClient::new("not a url");
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_token_store_installs_bearer_stage_first() {
    struct Noop;

    #[async_trait]
    impl Stage for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }
    }

    let client = HotelClient::builder()
        .base_url("http://localhost:8000")
        .stage(Arc::new(Noop))
        .token_store(Arc::new(MemoryTokenStore::new()))
        .build()
        .unwrap();

    assert_eq!(client.stage_names(), vec!["bearer", "noop"]);
}

#[tokio::test]
async fn test_login_posts_form() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("password=secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-1", "token_type": "bearer"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HotelClient::new(mock_server.uri()).unwrap();
    let token = client
        .login(&LoginCredentials {
            username: "desk@hotel.test".into(),
            password: "secret".into(),
        })
        .await
        .unwrap();

    assert_eq!(token.access_token, "tok-1");
}

#[tokio::test]
async fn test_login_failure_reports_detail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Incorrect email or password"})),
        )
        .mount(&mock_server)
        .await;

    let client = HotelClient::new(mock_server.uri()).unwrap();
    let err = client
        .login(&LoginCredentials {
            username: "desk@hotel.test".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth);
    match err {
        ClientError::AuthenticationFailed(message) => {
            assert_eq!(message, "Incorrect email or password");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_stored_token_is_attached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rooms"))
        .and(header("authorization", "Bearer stored-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 1,
            "number": "101",
            "type": "GUEST_HOUSE",
            "floor": 1,
            "capacity": 2,
            "price_per_night": 80.0,
            "is_available": true,
            "description": null,
            "amenities": null
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HotelClient::builder()
        .base_url(mock_server.uri())
        .token_store(Arc::new(MemoryTokenStore::with_token("stored-token")))
        .build()
        .unwrap();

    let rooms = client.list_rooms().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].room_type, RoomType::GuestHouse);
}

#[tokio::test]
async fn test_current_user_prefers_explicit_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HotelClient::builder()
        .base_url(mock_server.uri())
        .token_store(Arc::new(MemoryTokenStore::with_token("stale")))
        .build()
        .unwrap();

    let user = client.current_user(Some("fresh")).await.unwrap();
    assert_eq!(user.email, "desk@hotel.test");
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/guests/9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Guest not found"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bookings/3/checkin"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"detail": "Booking must be confirmed to check in"})),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard/stats"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = HotelClient::new(mock_server.uri()).unwrap();

    let err = client.get_guest(9).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(ref message) if message == "Guest not found"));

    let err = client.check_in(3).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation { status: 400, .. }));

    let err = client.dashboard_stats().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_current_tariff_sends_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tariffs/current"))
        .and(query_param("room_type", "FRAME"))
        .and(query_param("date", "2024-07-06"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4,
            "room_type": "FRAME",
            "price_per_night": 120.0,
            "weekend_price_per_night": 150.0,
            "min_nights": 2,
            "start_date": "2024-06-01",
            "end_date": "2024-08-31"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HotelClient::new(mock_server.uri()).unwrap();
    let tariff = client
        .current_tariff(RoomType::Frame, NaiveDate::from_ymd_opt(2024, 7, 6))
        .await
        .unwrap();

    assert_eq!(tariff.min_nights, 2);
    assert_eq!(tariff.weekend_price_per_night, Some(150.0));
}

#[tokio::test]
async fn test_tariff_list_filters_by_room_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tariffs"))
        .and(query_param("room_type", "GUEST_HOUSE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HotelClient::new(mock_server.uri()).unwrap();
    let tariffs = client.list_tariffs(Some(RoomType::GuestHouse)).await.unwrap();

    assert!(tariffs.is_empty());
}

#[tokio::test]
async fn test_booking_delete_returns_ack() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/bookings/12"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "Booking deleted successfully", "booking_id": 12})),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bookings/12/checkin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12,
            "guest_id": 1,
            "room_id": 2,
            "check_in_date": "2024-06-01",
            "check_out_date": "2024-06-04",
            "status": "checked_in"
        })))
        .mount(&mock_server)
        .await;

    let client = HotelClient::new(mock_server.uri()).unwrap();

    let booking = client.check_in(12).await.unwrap();
    assert_eq!(booking.status, BookingStatus::CheckedIn);

    let ack = client.delete_booking(12).await.unwrap();
    assert_eq!(ack.booking_id, Some(12));
}

/// Recovers any server error with a canned body
struct Fallback {
    calls: AtomicUsize,
}

#[async_trait]
impl Stage for Fallback {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn handle_error(
        &self,
        _request: &ApiRequest,
        _sent: &ApiRequest,
        error: ClientError,
        _client: &HotelClient,
    ) -> Result<ApiResponse, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if error.kind() != ErrorKind::Server {
            return Err(error);
        }
        Ok(ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(
                br#"{"totalRooms":0,"occupiedRooms":0,"totalBookings":0,"activeGuests":0}"#,
            ),
        })
    }
}

#[tokio::test]
async fn test_stage_can_recover_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dashboard/stats"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rooms/5"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fallback = Arc::new(Fallback {
        calls: AtomicUsize::new(0),
    });
    let client = HotelClient::new(mock_server.uri())
        .unwrap()
        .with_stage(fallback.clone());

    let stats = client.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_rooms, 0);

    let err = client.get_room(5).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 2);
}
