use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::geocode::{CachedCoordinates, Coordinates};

/// Backing storage for resolved coordinates, keyed by normalized place
/// string. Implementations must tolerate concurrent readers.
pub trait CoordinateStore: Send + Sync {
    fn get(&self, place: &str) -> Result<Option<CachedCoordinates>>;
    fn put(&self, place: &str, coords: Coordinates) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CachedCoordinates>>,
}

impl CoordinateStore for MemoryStore {
    fn get(&self, place: &str) -> Result<Option<CachedCoordinates>> {
        let guard = self.entries.lock().expect("coordinate store mutex poisoned");
        Ok(guard.get(place).copied())
    }

    fn put(&self, place: &str, coords: Coordinates) -> Result<()> {
        let mut guard = self.entries.lock().expect("coordinate store mutex poisoned");
        guard.insert(
            place.to_string(),
            CachedCoordinates {
                coords,
                cached_at: Utc::now(),
            },
        );
        Ok(())
    }
}

const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS geocode_cache (
    place TEXT PRIMARY KEY,
    lat REAL NOT NULL,
    lng REAL NOT NULL,
    cached_at TEXT NOT NULL
);
"#;

/// Cross-session cache backing. One table, one row per distinct place.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(BASE_MIGRATION)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CoordinateStore for SqliteStore {
    fn get(&self, place: &str) -> Result<Option<CachedCoordinates>> {
        let conn = self.conn.lock().expect("sqlite store mutex poisoned");
        let mut stmt =
            conn.prepare("SELECT lat, lng, cached_at FROM geocode_cache WHERE place = ?1")?;
        let result = stmt.query_row(params![place], |row| {
            Ok((
                row.get::<_, f64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
            ))
        });
        match result {
            Ok((lat, lng, cached_at_raw)) => {
                let cached_at = DateTime::parse_from_rfc3339(&cached_at_raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                Ok(Some(CachedCoordinates {
                    coords: Coordinates { lat, lng },
                    cached_at,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, place: &str, coords: Coordinates) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite store mutex poisoned");
        conn.execute(
            r#"
INSERT INTO geocode_cache(place, lat, lng, cached_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(place) DO UPDATE SET lat = ?2, lng = ?3, cached_at = ?4
"#,
            params![place, coords.lat, coords.lng, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::default();
        assert!(store.get("dallas, tx").unwrap().is_none());
        store
            .put("dallas, tx", Coordinates { lat: 32.8, lng: -96.8 })
            .unwrap();
        let entry = store.get("dallas, tx").unwrap().expect("missing entry");
        assert_eq!(entry.coords.lat, 32.8);
    }

    #[test]
    fn sqlite_store_round_trips_and_upserts() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("atlanta, ga").unwrap().is_none());
        store
            .put("atlanta, ga", Coordinates { lat: 33.7, lng: -84.4 })
            .unwrap();
        store
            .put("atlanta, ga", Coordinates { lat: 33.75, lng: -84.39 })
            .unwrap();
        let entry = store.get("atlanta, ga").unwrap().expect("missing entry");
        assert_eq!(entry.coords.lat, 33.75);
    }
}
