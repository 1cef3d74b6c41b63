use std::collections::BTreeSet;

use redis::{Client, Commands, Connection, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use super::{build_id_from_key, record_key, MetadataStore, QUEUE_KEY, RECORD_PATTERN};
use crate::{rlog_debug, rlog_trace, rlog_warn, Result};

/// Keys requested per SCAN page.
const SCAN_PAGE: usize = 1000;

/// Redis-backed metadata store.
///
/// Only the client (connection parameters) is kept; each call opens its
/// own connection, so the handle can be shared freely.
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Connects once to verify the server is reachable. Failure here is
    /// fatal for the pass.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_string(), port),
            redis: RedisConnectionInfo::default(),
        };
        let store = Self {
            client: Client::open(info)?,
        };
        let mut con = store.connection()?;
        redis::cmd("PING").query::<String>(&mut con)?;
        rlog_debug!("RedisStore::connect reachable at {}:{}", host, port);
        Ok(store)
    }

    fn connection(&self) -> Result<Connection> {
        Ok(self.client.get_connection()?)
    }

    /// Walks the SCAN cursor to completion. Any page that fails fails the
    /// whole listing; a partial key set would make live builds look dead.
    fn scan_record_keys(&self, con: &mut Connection) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, page): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(RECORD_PATTERN)
                .arg("COUNT")
                .arg(SCAN_PAGE)
                .query(con)?;
            keys.extend(decode_keys(page));
            if next == 0 {
                break;
            }
            cursor = next;
        }
        rlog_trace!("SCAN {} -> {} keys", RECORD_PATTERN, keys.len());
        Ok(keys)
    }
}

/// Keys that are not UTF-8 cannot name a build directory and are left
/// out with a warning.
fn decode_keys(page: Vec<Vec<u8>>) -> Vec<String> {
    page.into_iter()
        .filter_map(|raw| match String::from_utf8(raw) {
            Ok(key) => Some(key),
            Err(e) => {
                rlog_warn!(
                    "Ignoring non-UTF-8 key {}",
                    String::from_utf8_lossy(e.as_bytes())
                );
                None
            }
        })
        .collect()
}

impl MetadataStore for RedisStore {
    fn list_build_ids(&self) -> Result<BTreeSet<String>> {
        let mut con = self.connection()?;
        let keys = self.scan_record_keys(&mut con)?;
        Ok(keys
            .iter()
            .filter_map(|k| build_id_from_key(k))
            .map(str::to_string)
            .collect())
    }

    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let mut con = self.connection()?;
        let raw: Option<Vec<u8>> = con.get(record_key(id))?;
        rlog_trace!("GET {} -> {:?} bytes", record_key(id), raw.as_ref().map(Vec::len));
        Ok(raw)
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        let mut con = self.connection()?;
        let removed: usize = con.del(record_key(id))?;
        Ok(removed > 0)
    }

    fn delete_records(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = ids.iter().map(|id| record_key(id)).collect();
        let mut con = self.connection()?;
        let removed: usize = con.del(&keys)?;
        rlog_trace!("DEL {} keys -> {}", keys.len(), removed);
        Ok(removed)
    }

    fn queue_length(&self) -> Result<usize> {
        let mut con = self.connection()?;
        Ok(con.llen(QUEUE_KEY)?)
    }

    fn clear_queue(&self) -> Result<bool> {
        let mut con = self.connection()?;
        let removed: usize = con.del(QUEUE_KEY)?;
        Ok(removed > 0)
    }

    fn delete_all_records(&self) -> Result<usize> {
        let mut con = self.connection()?;
        let keys = self.scan_record_keys(&mut con)?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: usize = con.del(&keys)?;
        Ok(removed)
    }
}
