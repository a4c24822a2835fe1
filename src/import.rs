//! Import of a configuration and a sync database prepared on another machine or by an older
//! installation.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::{
    config::{Config, CONFIG_FILE_NAME},
    storage::sqlite_storage::{SqliteStorage, DATABASE_FILE_NAME},
    utils::dir::ensure_dir,
};

/// Outcome of [validate].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceValidation {
    Valid,
    /// The message is missing when there is nothing to explain, e.g. no directory was given.
    Invalid(Option<String>),
}

/// Checks that `source_dir` contains a valid configuration and a database.
pub fn validate(source_dir: &Path) -> SourceValidation {
    if source_dir.as_os_str().is_empty() {
        return SourceValidation::Invalid(None);
    }

    let db_path = SqliteStorage::database_path(source_dir);
    let config_path = Config::path(source_dir);
    if !db_path.exists() || !config_path.exists() {
        return SourceValidation::Invalid(Some(format!(
            "The directory should contain two files: '{CONFIG_FILE_NAME}' and '{DATABASE_FILE_NAME}'."
        )));
    }

    match Config::validate_file(&config_path) {
        Ok(_) => SourceValidation::Valid,
        Err(e) => SourceValidation::Invalid(Some(e.to_string())),
    }
}

/// Copies the configuration and the database from `source_dir` into `target_dir`.
pub fn import_artifacts(source_dir: &Path, target_dir: &Path) -> Result<()> {
    let db_path = SqliteStorage::database_path(source_dir);
    let config_path = Config::path(source_dir);

    if !db_path.is_file() {
        bail!("DB file '{}' doesn't exists", db_path.display());
    }
    if !config_path.is_file() {
        bail!("Config file '{}' doesn't exists", config_path.display());
    }

    let target_dir = ensure_dir(target_dir.to_path_buf())?;

    fs::copy(&db_path, SqliteStorage::database_path(&target_dir))
        .with_context(|| format!("Can't copy '{}'", db_path.display()))?;
    fs::copy(&config_path, Config::path(&target_dir))
        .with_context(|| format!("Can't copy '{}'", config_path.display()))?;

    info!("Imported configuration from {source_dir:?} into {target_dir:?}");
    Ok(())
}

/// Whether `dir` already holds a configuration or a database.
pub fn configuration_exists(dir: &Path) -> bool {
    SqliteStorage::database_path(dir).exists() || Config::path(dir).exists()
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use anyhow::Result;
    use tempfile::tempdir;

    use crate::{
        config::Config,
        storage::{sqlite_storage::SqliteStorage, SyncKeyStorage},
    };

    use super::{configuration_exists, import_artifacts, validate, SourceValidation};

    fn message(validation: SourceValidation) -> String {
        match validation {
            SourceValidation::Invalid(Some(message)) => message,
            other => panic!("Expected invalid source with message, got {other:?}"),
        }
    }

    fn prepare_source(dir: &Path) -> Result<()> {
        let mut config = Config::default();
        config.toggl.token = "token".into();
        config.save(dir)?;
        SqliteStorage::open(dir)?;
        Ok(())
    }

    #[test]
    fn empty_path_is_invalid_without_message() {
        assert_eq!(validate(Path::new("")), SourceValidation::Invalid(None));
    }

    #[test]
    fn directory_without_database_is_invalid() -> Result<()> {
        let source = tempdir()?;
        Config::default().save(source.path())?;

        let message = message(validate(source.path()));

        assert!(message.starts_with("The directory should contain two files"));
        Ok(())
    }

    #[test]
    fn broken_config_is_invalid() -> Result<()> {
        let source = tempdir()?;
        prepare_source(source.path())?;
        fs::write(Config::path(source.path()), "[]")?;

        let message = message(validate(source.path()));

        assert!(message.starts_with("JSON config is incorrect"));
        Ok(())
    }

    #[test]
    fn artifacts_are_copied() -> Result<()> {
        let source = tempdir()?;
        prepare_source(source.path())?;
        {
            let storage = SqliteStorage::open(source.path())?;
            let mut wl = crate::worklog::WorkLog::new(
                chrono::NaiveDateTime::default(),
                chrono::NaiveDateTime::default(),
                1,
            );
            wl.master_id = Some(1);
            wl.second_id = Some(2);
            storage.add(&wl)?;
        }
        let target = tempdir()?;
        let target_dir = target.path().join("toggl2tempo");

        assert_eq!(validate(source.path()), SourceValidation::Valid);
        assert!(!configuration_exists(&target_dir));

        import_artifacts(source.path(), &target_dir)?;

        assert!(configuration_exists(&target_dir));
        assert_eq!(Config::load(&target_dir)?.toggl.token, "token");
        assert_eq!(SqliteStorage::open(&target_dir)?.get_second_id(1)?, Some(2));
        Ok(())
    }

    #[test]
    fn import_requires_both_files() -> Result<()> {
        let source = tempdir()?;
        Config::default().save(source.path())?;
        let target = tempdir()?;

        let error = import_artifacts(source.path(), target.path()).unwrap_err();

        assert!(error.to_string().starts_with("DB file"));
        Ok(())
    }
}
