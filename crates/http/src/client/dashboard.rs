use super::pipeline::ApiRequest;
use super::{ClientError, HotelClient};
use crate::types::DashboardStats;

impl HotelClient {
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ClientError> {
        self.execute(ApiRequest::get("/dashboard/stats")).await
    }
}
