use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    #[command(about = "Change configuration values. Missing configuration is created")]
    Set {
        #[command(flatten)]
        values: ConfigValues,
    },
    #[command(about = "Validate configuration file and credentials")]
    Check {},
}

#[derive(Parser, Debug)]
pub struct ConfigValues {
    #[arg(long, help = "JIRA address, for example https://company.atlassian.net")]
    jira_host: Option<String>,
    #[arg(long, help = "JIRA user email")]
    jira_user: Option<String>,
    #[arg(long, help = "JIRA API token")]
    jira_token: Option<String>,
    #[arg(long, help = "Tempo API token")]
    tempo_token: Option<String>,
    #[arg(long, help = "Tempo API address")]
    tempo_url: Option<String>,
    #[arg(long, help = "Toggl API token")]
    toggl_token: Option<String>,
    #[arg(long, help = "Email sent to Toggl reports API as user agent")]
    toggl_user_agent: Option<String>,
    #[arg(long, help = "Toggl API address")]
    toggl_url: Option<String>,
    #[arg(
        long,
        value_parser = clap::value_parser!(u8).range(1..=7),
        help = "First day of week used by --week. 1 is Monday, 7 is Sunday"
    )]
    first_day_of_week: Option<u8>,
}

impl ConfigValues {
    fn apply(self, config: &mut Config) {
        fn set(target: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut config.jira.host, self.jira_host);
        set(&mut config.jira.user, self.jira_user);
        set(&mut config.jira.token, self.jira_token);
        set(&mut config.tempo.token, self.tempo_token);
        set(&mut config.tempo.url, self.tempo_url);
        set(&mut config.toggl.token, self.toggl_token);
        set(&mut config.toggl.user_agent, self.toggl_user_agent);
        set(&mut config.toggl.url, self.toggl_url);
        if let Some(day) = self.first_day_of_week {
            config.application.first_date_of_week = day;
        }
    }
}

pub fn process_config_command(app_dir: &Path, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Set { values } => {
            let mut config = Config::load_or_default(app_dir)?;
            values.apply(&mut config);
            config.save(app_dir)?;
            println!("Configuration saved to {}", Config::path(app_dir).display());
            Ok(())
        }
        ConfigCommand::Check {} => {
            for line in check(app_dir) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

/// Returns a report line per configuration section.
fn check(app_dir: &Path) -> Vec<String> {
    let config = match Config::validate_file(&Config::path(app_dir)) {
        Ok(config) => config,
        Err(e) => return vec![format!("Configuration: {e}")],
    };

    let status = |result: Result<()>| match result {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    };

    vec![
        "Configuration: ok".into(),
        format!("Toggl: {}", status(config.toggl.validate())),
        format!("JIRA: {}", status(config.jira.validate())),
        format!("Tempo: {}", status(config.tempo.validate())),
    ]
}
