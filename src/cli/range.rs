use std::fmt::Display;

use anyhow::Result;
use chrono::NaiveDate;
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::utils::{clock::Clock, time::beginning_of_week};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct RangeArgs {
    #[arg(
        long = "start",
        short,
        help = "First day to sync. Examples are \"yesterday\", \"monday\", \"15/03/2025\". Defaults to today"
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Last day to sync. Examples are \"yesterday\", \"friday\", \"15/03/2025\". Defaults to today"
    )]
    end_date: Option<String>,
    #[arg(
        long,
        short,
        conflicts_with = "start_date",
        help = "Start from the first day of the current week. The first day is taken from the configuration"
    )]
    week: bool,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

impl RangeArgs {
    /// Turns the arguments into an inclusive range of days.
    pub fn resolve(
        &self,
        clock: &impl Clock,
        first_day_of_week: u8,
    ) -> Result<(NaiveDate, NaiveDate)> {
        let today = clock.today();

        let start = if self.week {
            beginning_of_week(today, first_day_of_week)
        } else {
            self.parse(self.start_date.as_deref(), clock, "start")?
                .unwrap_or(today)
        };
        let end = self
            .parse(self.end_date.as_deref(), clock, "end")?
            .unwrap_or(today);

        if start > end {
            return Err(validation_error(
                "Start date shouldn't be less than end date".into(),
            ));
        }

        Ok((start, end))
    }

    fn parse(
        &self,
        value: Option<&str>,
        clock: &impl Clock,
        name: &str,
    ) -> Result<Option<NaiveDate>> {
        let Some(value) = value else {
            return Ok(None);
        };

        match parse_date_string(value, clock.now(), self.date_style.into()) {
            Ok(v) => Ok(Some(v.date_naive())),
            Err(e) => Err(validation_error(format!("Failed to valiate {name} date {e}"))),
        }
    }
}

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}
