use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::worklog::WorkLog;

use super::SyncKeyStorage;

pub const DATABASE_FILE_NAME: &str = "toggl-sync.db";

const DATABASE_INIT_SCRIPT: &str = "
CREATE TABLE IF NOT EXISTS sync_key
(
    master_key integer NOT NULL,
    second_key integer NOT NULL,
    CONSTRAINT pk_sync_key PRIMARY KEY (master_key, second_key),
    CONSTRAINT unique_master_key UNIQUE (master_key),
    CONSTRAINT unique_second_key UNIQUE (second_key)
)";

/// The main realization of [SyncKeyStorage], a single table in a SQLite file.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn database_path(dir: &Path) -> PathBuf {
        dir.join(DATABASE_FILE_NAME)
    }

    /// Opens the database in `dir`, creating the file and the table when they are missing.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = Self::database_path(dir);
        debug!("Opening sync database {path:?}");
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database '{}'", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(DATABASE_INIT_SCRIPT)?;
        Ok(Self { conn })
    }
}

impl SyncKeyStorage for SqliteStorage {
    fn add(&self, worklog: &WorkLog) -> Result<()> {
        let (Some(master_id), Some(second_id)) = (worklog.master_id, worklog.second_id) else {
            return Err(anyhow!(
                "Can't store worklog ids, both are required: master {:?}, second {:?}",
                worklog.master_id,
                worklog.second_id
            ));
        };

        self.conn.execute(
            "INSERT INTO sync_key (master_key, second_key) VALUES (?1, ?2)",
            params![master_id, second_id],
        )?;
        Ok(())
    }

    fn get_second_id(&self, master_id: i64) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT second_key FROM sync_key WHERE master_key = ?1",
                params![master_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get_master_id(&self, second_id: i64) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT master_key FROM sync_key WHERE second_key = ?1",
                params![second_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn delete(&self, master_id: i64, second_id: i64) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM sync_key WHERE master_key = ?1 AND second_key = ?2",
            params![master_id, second_id],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDateTime;
    use tempfile::tempdir;

    use crate::{storage::SyncKeyStorage, worklog::WorkLog};

    use super::SqliteStorage;

    fn worklog(master_id: Option<i64>, second_id: Option<i64>) -> WorkLog {
        let start = NaiveDateTime::parse_from_str("2020-10-29 17:15", "%Y-%m-%d %H:%M").unwrap();
        let mut wl = WorkLog::new(start, start, 60);
        wl.master_id = master_id;
        wl.second_id = second_id;
        wl
    }

    #[test]
    fn lookup_both_directions() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;
        storage.add(&worklog(Some(100), Some(7)))?;

        assert_eq!(storage.get_second_id(100)?, Some(7));
        assert_eq!(storage.get_master_id(7)?, Some(100));
        assert_eq!(storage.get_second_id(7)?, None);
        assert_eq!(storage.get_master_id(100)?, None);
        Ok(())
    }

    #[test]
    fn add_requires_both_ids() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;

        assert!(storage.add(&worklog(Some(100), None)).is_err());
        assert!(storage.add(&worklog(None, Some(7))).is_err());
        assert_eq!(storage.get_second_id(100)?, None);
        Ok(())
    }

    #[test]
    fn ids_are_unique_on_both_sides() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;
        storage.add(&worklog(Some(100), Some(7)))?;

        assert!(storage.add(&worklog(Some(100), Some(8))).is_err());
        assert!(storage.add(&worklog(Some(101), Some(7))).is_err());
        Ok(())
    }

    #[test]
    fn delete_removes_only_matching_pair() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;
        storage.add(&worklog(Some(100), Some(7)))?;

        assert!(!storage.delete(100, 8)?);
        assert_eq!(storage.get_second_id(100)?, Some(7));

        assert!(storage.delete(100, 7)?);
        assert_eq!(storage.get_second_id(100)?, None);

        // The pair can be stored again after removal.
        storage.add(&worklog(Some(100), Some(9)))?;
        assert_eq!(storage.get_second_id(100)?, Some(9));
        Ok(())
    }

    #[test]
    fn data_survives_reopening() -> Result<()> {
        let dir = tempdir()?;
        {
            let storage = SqliteStorage::open(dir.path())?;
            storage.add(&worklog(Some(1), Some(2)))?;
        }

        let storage = SqliteStorage::open(dir.path())?;
        assert_eq!(storage.get_second_id(1)?, Some(2));
        assert!(SqliteStorage::database_path(dir.path()).is_file());
        Ok(())
    }
}
