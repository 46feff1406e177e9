//! Room API client methods

use super::pipeline::ApiRequest;
use super::{ClientError, HotelClient};
use crate::types::{Room, RoomCreate, RoomUpdate};

impl HotelClient {
    pub async fn list_rooms(&self) -> Result<Vec<Room>, ClientError> {
        self.execute(ApiRequest::get("/rooms")).await
    }

    pub async fn get_room(&self, id: i64) -> Result<Room, ClientError> {
        self.execute(ApiRequest::get(format!("/rooms/{id}"))).await
    }

    pub async fn create_room(&self, room: &RoomCreate) -> Result<Room, ClientError> {
        self.execute(ApiRequest::post("/rooms").json(room)?).await
    }

    pub async fn update_room(&self, id: i64, update: &RoomUpdate) -> Result<Room, ClientError> {
        self.execute(ApiRequest::put(format!("/rooms/{id}")).json(update)?)
            .await
    }

    /// Delete a room, returning its last state
    pub async fn delete_room(&self, id: i64) -> Result<Room, ClientError> {
        self.execute(ApiRequest::delete(format!("/rooms/{id}"))).await
    }
}
