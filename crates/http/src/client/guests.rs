//! Guest API client methods

use super::pipeline::ApiRequest;
use super::{ClientError, HotelClient};
use crate::types::{Guest, GuestCreate, GuestUpdate};

impl HotelClient {
    pub async fn list_guests(&self) -> Result<Vec<Guest>, ClientError> {
        self.execute(ApiRequest::get("/guests")).await
    }

    pub async fn get_guest(&self, id: i64) -> Result<Guest, ClientError> {
        self.execute(ApiRequest::get(format!("/guests/{id}"))).await
    }

    pub async fn create_guest(&self, guest: &GuestCreate) -> Result<Guest, ClientError> {
        self.execute(ApiRequest::post("/guests").json(guest)?).await
    }

    pub async fn update_guest(&self, id: i64, update: &GuestUpdate) -> Result<Guest, ClientError> {
        self.execute(ApiRequest::put(format!("/guests/{id}")).json(update)?)
            .await
    }

    pub async fn delete_guest(&self, id: i64) -> Result<Guest, ClientError> {
        self.execute(ApiRequest::delete(format!("/guests/{id}"))).await
    }
}
