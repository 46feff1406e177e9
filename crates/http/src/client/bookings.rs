//! Booking API client methods

use super::pipeline::ApiRequest;
use super::{ClientError, HotelClient};
use crate::types::{Booking, BookingCreate, BookingUpdate, DeleteAck};

impl HotelClient {
    pub async fn list_bookings(&self) -> Result<Vec<Booking>, ClientError> {
        self.execute(ApiRequest::get("/bookings")).await
    }

    pub async fn get_booking(&self, id: i64) -> Result<Booking, ClientError> {
        self.execute(ApiRequest::get(format!("/bookings/{id}"))).await
    }

    pub async fn create_booking(&self, booking: &BookingCreate) -> Result<Booking, ClientError> {
        self.execute(ApiRequest::post("/bookings").json(booking)?).await
    }

    pub async fn update_booking(
        &self,
        id: i64,
        update: &BookingUpdate,
    ) -> Result<Booking, ClientError> {
        self.execute(ApiRequest::put(format!("/bookings/{id}")).json(update)?)
            .await
    }

    /// Delete a booking; the API answers with an acknowledgement only
    pub async fn delete_booking(&self, id: i64) -> Result<DeleteAck, ClientError> {
        self.execute(ApiRequest::delete(format!("/bookings/{id}")))
            .await
    }

    /// Mark the guest as arrived
    pub async fn check_in(&self, id: i64) -> Result<Booking, ClientError> {
        self.execute(ApiRequest::post(format!("/bookings/{id}/checkin")))
            .await
    }
}
