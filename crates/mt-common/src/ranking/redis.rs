//! Redis-backed `RankedStore` over sorted sets.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{RankedStore, RankingStoreError};

/// One sorted set per prefix key; all mutations map to single Redis
/// commands, so atomicity comes from the server.
#[derive(Clone)]
pub struct RedisRankedStore {
    conn: ConnectionManager,
}

impl RedisRankedStore {
    /// Connects and returns a store backed by an auto-reconnecting
    /// connection manager.
    pub async fn connect(redis_url: &str) -> Result<Self, RankingStoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| RankingStoreError::Backend(err.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|err| RankingStoreError::Backend(err.to_string()))?;
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn backend_err(err: redis::RedisError) -> RankingStoreError {
    RankingStoreError::Backend(err.to_string())
}

#[async_trait]
impl RankedStore for RedisRankedStore {
    async fn increment_score(
        &self,
        key: &str,
        member: &str,
        delta: f64,
    ) -> Result<f64, RankingStoreError> {
        let mut conn = self.conn.clone();
        conn.zincr(key, member, delta).await.map_err(backend_err)
    }

    async fn set_score(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<(), RankingStoreError> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(key, member, score)
            .await
            .map_err(backend_err)
    }

    async fn member_score(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<f64>, RankingStoreError> {
        let mut conn = self.conn.clone();
        conn.zscore(key, member).await.map_err(backend_err)
    }

    async fn top_members(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<String>, RankingStoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        conn.zrevrange(key, 0, limit as isize - 1)
            .await
            .map_err(backend_err)
    }

    async fn cardinality(&self, key: &str) -> Result<usize, RankingStoreError> {
        let mut conn = self.conn.clone();
        conn.zcard(key).await.map_err(backend_err)
    }

    async fn remove_lowest(&self, key: &str, count: usize) -> Result<(), RankingStoreError> {
        if count == 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.zremrangebyrank::<_, ()>(key, 0, count as isize - 1)
            .await
            .map_err(backend_err)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), RankingStoreError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl.as_secs() as i64)
            .await
            .map_err(backend_err)
    }
}
