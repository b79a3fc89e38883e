//! Redis service backing the reminder de-duplication keys

use async_trait::async_trait;
use redis::Client;

use crate::error::{AppError, AppResult};
use crate::services::reminder::DedupStore;

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Create a new Redis service.
    ///
    /// An unreachable server is only logged: de-duplication fails open.
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;
        let service = Self { client };

        match service.ping().await {
            Ok(()) => tracing::info!("Connected to Redis"),
            Err(e) => tracing::warn!("Redis not reachable, reminder de-duplication disabled: {}", e),
        }

        Ok(service)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }

    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;
        Ok(())
    }

    /// `SET key 1 NX EX ttl`; true when this call created the key
    pub async fn set_once(&self, key: &str, ttl_secs: u64) -> AppResult<bool> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to set key in Redis: {}", e)))?;
        Ok(reply.is_some())
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete key from Redis: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl DedupStore for RedisService {
    async fn claim(&self, key: &str, ttl_secs: u64) -> bool {
        match self.set_once(key, ttl_secs).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::warn!("Dedup check failed for {}, sending anyway: {}", key, e);
                true
            }
        }
    }

    async fn release(&self, key: &str) {
        if let Err(e) = self.delete(key).await {
            tracing::warn!("Failed to release dedup key {}: {}", key, e);
        }
    }
}
