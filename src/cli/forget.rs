use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::info;

use crate::storage::SyncKeyStorage;

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
pub struct ForgetCommand {
    #[arg(long, help = "Toggl time entry id")]
    toggl_id: Option<i64>,
    #[arg(long, help = "Tempo worklog id")]
    tempo_id: Option<i64>,
}

/// Removes one pair from the correspondence table. After that the Toggl entry is uploaded again
/// as new on the next sync. Returns the removed pair.
pub fn forget(storage: &impl SyncKeyStorage, command: ForgetCommand) -> Result<Option<(i64, i64)>> {
    let pair = match (command.toggl_id, command.tempo_id) {
        (Some(master_id), _) => storage
            .get_second_id(master_id)?
            .map(|second_id| (master_id, second_id)),
        (None, Some(second_id)) => storage
            .get_master_id(second_id)?
            .map(|master_id| (master_id, second_id)),
        (None, None) => None,
    };

    let Some((master_id, second_id)) = pair else {
        return Ok(None);
    };

    storage.delete(master_id, second_id)?;
    info!("Forgot pair Toggl {master_id} - Tempo {second_id}");
    Ok(Some((master_id, second_id)))
}
