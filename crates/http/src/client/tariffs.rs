//! Tariff API client methods

use super::pipeline::ApiRequest;
use super::{ClientError, HotelClient};
use crate::types::{RoomTariff, RoomType, TariffCreate, TariffUpdate};
use chrono::NaiveDate;

impl HotelClient {
    /// List tariffs, optionally only those of one room type
    pub async fn list_tariffs(
        &self,
        room_type: Option<RoomType>,
    ) -> Result<Vec<RoomTariff>, ClientError> {
        let mut request = ApiRequest::get("/tariffs");
        if let Some(room_type) = room_type {
            request = request.query("room_type", room_type.as_str());
        }
        self.execute(request).await
    }

    /// Tariff applicable to `room_type` on `date` (today when omitted)
    pub async fn current_tariff(
        &self,
        room_type: RoomType,
        date: Option<NaiveDate>,
    ) -> Result<RoomTariff, ClientError> {
        let mut request =
            ApiRequest::get("/tariffs/current").query("room_type", room_type.as_str());
        if let Some(date) = date {
            request = request.query("date", date.format("%Y-%m-%d").to_string());
        }
        self.execute(request).await
    }

    pub async fn get_tariff(&self, id: i64) -> Result<RoomTariff, ClientError> {
        self.execute(ApiRequest::get(format!("/tariffs/{id}"))).await
    }

    pub async fn create_tariff(&self, tariff: &TariffCreate) -> Result<RoomTariff, ClientError> {
        self.execute(ApiRequest::post("/tariffs").json(tariff)?).await
    }

    pub async fn update_tariff(
        &self,
        id: i64,
        update: &TariffUpdate,
    ) -> Result<RoomTariff, ClientError> {
        self.execute(ApiRequest::put(format!("/tariffs/{id}")).json(update)?)
            .await
    }

    pub async fn delete_tariff(&self, id: i64) -> Result<RoomTariff, ClientError> {
        self.execute(ApiRequest::delete(format!("/tariffs/{id}"))).await
    }
}
