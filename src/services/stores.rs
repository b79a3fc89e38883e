//! Stores service

use crate::{
    error::AppResult,
    models::store::{CreateStore, Store, UpdateStore},
    repository::Repository,
};

#[derive(Clone)]
pub struct StoresService {
    repository: Repository,
}

impl StoresService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<Store>> {
        self.repository.stores.list().await
    }

    /// Stores whose assigned technician is `username`
    pub async fn list_assigned_to(&self, username: &str) -> AppResult<Vec<Store>> {
        self.repository.stores.list_assigned_to(username).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Store> {
        self.repository.stores.get_by_id(id).await
    }

    pub async fn create(&self, data: &CreateStore) -> AppResult<Store> {
        self.repository.stores.create(data).await
    }

    pub async fn update(&self, id: i32, data: &UpdateStore) -> AppResult<Store> {
        self.repository.stores.update(id, data).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.stores.delete(id).await
    }
}
