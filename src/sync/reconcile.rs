//! Classification of time tracker worklogs against the worklogs already present in Tempo.

use std::{collections::HashSet, fmt::Display};

use anyhow::{bail, Result};

use crate::{
    storage::SyncKeyStorage,
    worklog::{WorkLog, WorkLogState},
};

/// Assigns a [WorkLogState] to every time tracker worklog. Mapped worklogs get their
/// `second_id` filled in. Returns whether any worklog is incomplete.
///
/// A mapping that points to a worklog missing from `tempo_worklogs` is an error: the
/// correspondence table no longer reflects Tempo and nothing should be uploaded.
pub fn calculate_worklogs_statuses(
    toggl_worklogs: &mut [WorkLog],
    tempo_worklogs: &[WorkLog],
    storage: &impl SyncKeyStorage,
) -> Result<bool> {
    let mut has_incomplete_worklog = false;

    for toggl in toggl_worklogs.iter_mut() {
        if toggl.is_invalid() {
            toggl.state = WorkLogState::Incomplete;
            has_incomplete_worklog = true;
            continue;
        }

        let second_id = match toggl.master_id {
            Some(master_id) => storage.get_second_id(master_id)?,
            None => None,
        };

        let Some(second_id) = second_id else {
            toggl.state = WorkLogState::New;
            continue;
        };
        toggl.second_id = Some(second_id);

        let Some(tempo) = tempo_worklogs
            .iter()
            .find(|tempo| tempo.second_id == Some(second_id))
        else {
            bail!("Tempo worklog [TempoId={second_id}] doesn't exists");
        };

        toggl.state = if worklog_was_moved(toggl, tempo) {
            WorkLogState::Moved
        } else if worklog_was_updated(toggl, tempo) {
            WorkLogState::Updated
        } else {
            WorkLogState::Synced
        };
    }

    Ok(has_incomplete_worklog)
}

/// A worklog is moved when it now points to another issue. Tempo can't change the issue of a
/// worklog, so moved worklogs are recreated.
pub fn worklog_was_moved(toggl: &mut WorkLog, tempo: &WorkLog) -> bool {
    if tempo.key == toggl.key {
        return false;
    }

    toggl.tooltip = Some(change_line(
        "Task key was changed",
        display_opt(&tempo.key),
        display_opt(&toggl.key),
    ));
    true
}

pub fn worklog_was_updated(toggl: &mut WorkLog, tempo: &WorkLog) -> bool {
    let mut changes = vec![];

    if tempo.activity != toggl.activity {
        changes.push(change_line(
            "Activity",
            display_opt(&tempo.activity),
            display_opt(&toggl.activity),
        ));
    }
    if tempo.start != toggl.start {
        changes.push(change_line("Start time", tempo.start, toggl.start));
    }
    if tempo.duration != toggl.duration {
        changes.push(change_line("Duration", tempo.duration, toggl.duration));
    }
    if tempo.description != toggl.description {
        changes.push(change_line(
            "Description",
            display_opt(&tempo.description),
            display_opt(&toggl.description),
        ));
    }

    if changes.is_empty() {
        return false;
    }
    toggl.tooltip = Some(changes.join("\n"));
    true
}

/// Keys of the worklogs that are about to be sent to Tempo, without duplicates.
pub fn keys_to_verify(worklogs: &[WorkLog]) -> Vec<String> {
    let mut keys = worklogs
        .iter()
        .filter(|wl| will_be_uploaded(wl.state))
        .filter_map(|wl| wl.key.clone())
        .collect::<Vec<_>>();
    keys.sort();
    keys.dedup();
    keys
}

/// Turns worklogs referencing issues outside of `existing_keys` into incomplete ones. Keys are
/// compared ignoring case, as JIRA does. Returns how many worklogs were affected.
pub fn mark_unknown_issues(worklogs: &mut [WorkLog], existing_keys: &HashSet<String>) -> usize {
    let existing_keys = existing_keys
        .iter()
        .map(|key| key.to_uppercase())
        .collect::<HashSet<_>>();

    let mut marked = 0;
    for wl in worklogs
        .iter_mut()
        .filter(|wl| will_be_uploaded(wl.state))
    {
        let Some(key) = wl.key.as_deref() else {
            continue;
        };
        if existing_keys.contains(&key.to_uppercase()) {
            continue;
        }
        wl.tooltip = Some(format!("Issue {key} doesn't exist"));
        wl.state = WorkLogState::Incomplete;
        marked += 1;
    }
    marked
}

fn will_be_uploaded(state: WorkLogState) -> bool {
    matches!(
        state,
        WorkLogState::New | WorkLogState::Updated | WorkLogState::Moved
    )
}

fn change_line(field: &str, old: impl Display, new: impl Display) -> String {
    format!("{field}: {old} -> {new}")
}

fn display_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<none>")
}
