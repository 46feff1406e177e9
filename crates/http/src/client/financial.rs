//! Financial transaction API client methods

use super::pipeline::ApiRequest;
use super::{ClientError, HotelClient};
use crate::types::{FinancialTransaction, TransactionCreate, TransactionUpdate};

impl HotelClient {
    pub async fn list_transactions(&self) -> Result<Vec<FinancialTransaction>, ClientError> {
        self.execute(ApiRequest::get("/financial")).await
    }

    pub async fn get_transaction(&self, id: i64) -> Result<FinancialTransaction, ClientError> {
        self.execute(ApiRequest::get(format!("/financial/{id}"))).await
    }

    pub async fn create_transaction(
        &self,
        transaction: &TransactionCreate,
    ) -> Result<FinancialTransaction, ClientError> {
        self.execute(ApiRequest::post("/financial").json(transaction)?)
            .await
    }

    pub async fn update_transaction(
        &self,
        id: i64,
        update: &TransactionUpdate,
    ) -> Result<FinancialTransaction, ClientError> {
        self.execute(ApiRequest::put(format!("/financial/{id}")).json(update)?)
            .await
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<FinancialTransaction, ClientError> {
        self.execute(ApiRequest::delete(format!("/financial/{id}")))
            .await
    }
}
