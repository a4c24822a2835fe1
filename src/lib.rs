//! Command line tool for moving Toggl time entries into Tempo worklogs.
//! Every run compares both sides for a range of days and only sends what changed. The link
//! between an entry and its worklog is kept in a small SQLite database.
//!

pub mod api;
pub mod cli;
pub mod config;
pub mod import;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod worklog;
