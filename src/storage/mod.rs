//!  Storage keeps the correspondence between time tracker entries and Tempo worklogs.
//!  The basic idea is:
//!   - Every uploaded time tracker entry (master) has exactly one Tempo worklog (second).
//!   - Both sides are unique, a worklog can't be claimed by two entries.
//!   - Nothing else is stored, worklog content is always reloaded from the services.

pub mod sqlite_storage;

use std::ops::Deref;

use anyhow::Result;

use crate::worklog::WorkLog;

/// Interface for abstracting storage of id pairs.
pub trait SyncKeyStorage {
    /// Stores the pair of ids of `worklog`. Both ids must be present.
    fn add(&self, worklog: &WorkLog) -> Result<()>;

    fn get_second_id(&self, master_id: i64) -> Result<Option<i64>>;

    fn get_master_id(&self, second_id: i64) -> Result<Option<i64>>;

    /// Removes the pair. Returns whether anything was removed.
    fn delete(&self, master_id: i64, second_id: i64) -> Result<bool>;
}

impl<T: Deref> SyncKeyStorage for T
where
    T::Target: SyncKeyStorage,
{
    fn add(&self, worklog: &WorkLog) -> Result<()> {
        self.deref().add(worklog)
    }

    fn get_second_id(&self, master_id: i64) -> Result<Option<i64>> {
        self.deref().get_second_id(master_id)
    }

    fn get_master_id(&self, second_id: i64) -> Result<Option<i64>> {
        self.deref().get_master_id(second_id)
    }

    fn delete(&self, master_id: i64, second_id: i64) -> Result<bool> {
        self.deref().delete(master_id, second_id)
    }
}
