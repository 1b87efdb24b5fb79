//! Redis-backed driver store
//!
//! Each driver is one JSON string under `{prefix}:driver:{id}`; the set
//! `{prefix}:drivers` indexes every registered id. Saves go through a Lua
//! compare-and-set on the stored `version` field.

use super::DriverStore;
use crate::driver::DriverRoute;
use crate::error::{DriverStoreError, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use rideshare_types::DriverId;
use tracing::{debug, warn};

const SAVE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return -1
end
local stored = cjson.decode(current)
if tonumber(stored['version']) ~= tonumber(ARGV[1]) then
    return -2
end
redis.call('SET', KEYS[1], ARGV[2])
return tonumber(ARGV[3])
"#;

/// Driver store shared by the simulator and matcher processes
#[derive(Clone)]
pub struct RedisDriverStore {
    connection_manager: ConnectionManager,
    prefix: String,
    save_script: Script,
}

impl RedisDriverStore {
    pub async fn new(redis_url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let connection_manager = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(connection_manager, prefix))
    }

    pub fn with_connection(connection_manager: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self { connection_manager, prefix: prefix.into(), save_script: Script::new(SAVE_SCRIPT) }
    }

    fn driver_key(&self, driver_id: DriverId) -> String {
        format!("{}:driver:{}", self.prefix, driver_id)
    }

    fn index_key(&self) -> String {
        format!("{}:drivers", self.prefix)
    }
}

#[async_trait::async_trait]
impl DriverStore for RedisDriverStore {
    async fn register(&self, mut driver: DriverRoute) -> Result<DriverId> {
        let mut conn = self.connection_manager.clone();
        let id = driver.driver_id();
        driver.set_version(0);
        let payload = serde_json::to_string(&driver)?;

        let created: Option<String> = redis::cmd("SET")
            .arg(self.driver_key(id))
            .arg(payload)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        if created.is_none() {
            return Err(DriverStoreError::AlreadyExists(id));
        }
        conn.sadd::<_, _, ()>(self.index_key(), id.get()).await?;
        debug!(driver_id = %id, "Registered driver");
        Ok(id)
    }

    async fn load(&self, driver_id: DriverId) -> Result<DriverRoute> {
        let mut conn = self.connection_manager.clone();
        let payload: Option<String> = conn.get(self.driver_key(driver_id)).await?;
        let payload = payload.ok_or(DriverStoreError::NotFound(driver_id))?;
        Ok(serde_json::from_str(&payload)?)
    }

    async fn list_active(&self) -> Result<Vec<DriverRoute>> {
        let mut conn = self.connection_manager.clone();
        let ids: Vec<u64> = conn.smembers(self.index_key()).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.driver_key(DriverId(*id))).collect();
        let payloads: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        Ok(decode_active(ids.into_iter().map(DriverId).zip(payloads)))
    }

    async fn save(&self, driver: &DriverRoute) -> Result<u64> {
        let mut conn = self.connection_manager.clone();
        let next_version = driver.version() + 1;
        let mut next = driver.clone();
        next.set_version(next_version);
        let payload = serde_json::to_string(&next)?;

        let result: i64 = self
            .save_script
            .key(self.driver_key(driver.driver_id()))
            .arg(driver.version())
            .arg(payload)
            .arg(next_version)
            .invoke_async(&mut conn)
            .await?;
        save_outcome(driver, result)
    }

    async fn delete(&self, driver_id: DriverId) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let removed: i64 = conn.del(self.driver_key(driver_id)).await?;
        conn.srem::<_, _, ()>(self.index_key(), driver_id.get()).await?;
        if removed == 0 {
            return Err(DriverStoreError::NotFound(driver_id));
        }
        debug!(driver_id = %driver_id, "Deleted driver");
        Ok(())
    }
}

/// Simulating drivers from `MGET` payloads, ordered by id.
///
/// A record deleted since the index was read is skipped. A record that fails to
/// decode is logged and skipped so the remaining drivers still advance.
fn decode_active<I>(payloads: I) -> Vec<DriverRoute>
where
    I: IntoIterator<Item = (DriverId, Option<String>)>,
{
    let mut drivers = Vec::new();
    for (driver_id, payload) in payloads {
        let Some(payload) = payload else {
            continue;
        };
        match serde_json::from_str::<DriverRoute>(&payload) {
            Ok(driver) if driver.is_simulating() => drivers.push(driver),
            Ok(_) => {}
            Err(e) => warn!(driver_id = %driver_id, "Skipping undecodable driver record: {}", e),
        }
    }
    drivers.sort_by_key(|d| d.driver_id());
    drivers
}

/// Map the compare-and-set script reply onto the new version
fn save_outcome(driver: &DriverRoute, reply: i64) -> Result<u64> {
    match reply {
        -1 => Err(DriverStoreError::NotFound(driver.driver_id())),
        -2 => Err(super::conflict(driver)),
        version if version > 0 => Ok(version as u64),
        other => Err(DriverStoreError::UnexpectedReply { driver_id: driver.driver_id(), reply: other }),
    }
}
