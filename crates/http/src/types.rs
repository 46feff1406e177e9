//! Wire types of the hotel management REST API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Credentials submitted to the login endpoint as a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCredentials {
    /// Account e-mail
    pub username: String,
    pub password: String,
}

/// Registration payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCredentials {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
}

impl RegisterCredentials {
    /// Login credentials for the identity being registered
    pub fn as_login(&self) -> LoginCredentials {
        LoginCredentials {
            username: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// Access token issued by login and refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Authenticated back-office user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    GuestHouse,
    Frame,
}

impl RoomType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GuestHouse => "GUEST_HOUSE",
            Self::Frame => "FRAME",
        }
    }
}

impl std::str::FromStr for RoomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GUEST_HOUSE" => Ok(Self::GuestHouse),
            "FRAME" => Ok(Self::Frame),
            other => Err(format!("unknown room type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub number: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub floor: Option<i32>,
    pub capacity: Option<i32>,
    #[serde(default)]
    pub price_per_night: Option<f64>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub description: Option<String>,
    pub amenities: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomCreate {
    pub number: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub floor: i32,
    pub capacity: i32,
    pub price_per_night: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amenities: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub room_type: Option<RoomType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_night: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amenities: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    pub preferences: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCreate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

/// Guest fields embedded in a booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestSummary {
    pub first_name: String,
    pub last_name: String,
}

/// Room fields embedded in a booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub number: String,
    #[serde(rename = "type")]
    pub room_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub guest_id: i64,
    pub room_id: i64,
    #[serde(with = "api_date")]
    pub check_in_date: NaiveDate,
    #[serde(with = "api_date")]
    pub check_out_date: NaiveDate,
    pub status: BookingStatus,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub guest: Option<GuestSummary>,
    #[serde(default)]
    pub room: Option<RoomSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCreate {
    pub guest_id: i64,
    pub room_id: i64,
    #[serde(with = "api_date")]
    pub check_in_date: NaiveDate,
    #[serde(with = "api_date")]
    pub check_out_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingUpdate {
    #[serde(
        default,
        with = "api_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub check_in_date: Option<NaiveDate>,
    #[serde(
        default,
        with = "api_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub check_out_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTariff {
    pub id: i64,
    pub room_type: String,
    pub price_per_night: f64,
    pub weekend_price_per_night: Option<f64>,
    pub min_nights: i32,
    #[serde(with = "api_date")]
    pub start_date: NaiveDate,
    #[serde(with = "api_date")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffCreate {
    pub room_type: String,
    pub price_per_night: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekend_price_per_night: Option<f64>,
    pub min_nights: i32,
    #[serde(with = "api_date")]
    pub start_date: NaiveDate,
    #[serde(with = "api_date")]
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_night: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekend_price_per_night: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_nights: Option<i32>,
    #[serde(
        default,
        with = "api_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<NaiveDate>,
    #[serde(
        default,
        with = "api_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialTransaction {
    pub id: i64,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: String,
    pub description: String,
    pub payment_method: PaymentMethod,
    #[serde(with = "api_date")]
    pub transaction_date: NaiveDate,
    #[serde(default)]
    pub booking_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionCreate {
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: String,
    pub description: String,
    pub payment_method: PaymentMethod,
    #[serde(with = "api_date")]
    pub transaction_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(
        default,
        with = "api_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_date: Option<NaiveDate>,
}

/// Headline numbers for the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_rooms: u64,
    pub occupied_rooms: u64,
    pub total_bookings: u64,
    pub active_guests: u64,
}

/// Acknowledgement returned by deletions that don't echo the resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAck {
    pub message: String,
    #[serde(default)]
    pub booking_id: Option<i64>,
}

const fn default_true() -> bool {
    true
}

/// Dates travel as `YYYY-MM-DD`; the API sometimes answers with a full timestamp,
/// in which case only the date part is kept.
mod api_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<NaiveDate, String> {
        let date_part = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, FORMAT).map_err(|err| format!("invalid date {raw:?}: {err}"))
    }

    pub mod option {
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
