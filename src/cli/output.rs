use std::io::IsTerminal;

use ansi_term::Colour;
use anyhow::Result;

use crate::{
    sync::events::{EventProcessor, SyncEvent},
    worklog::{WorkLog, WorkLogState},
};

const HEADERS: [&str; 6] = ["Key", "Activity", "Description", "Date", "Time", "State"];
const MAX_DESCRIPTION_WIDTH: usize = 50;

/// Prints sync events into the terminal.
#[derive(Debug)]
pub struct ConsolePrinter {
    /// Disables colouring.
    plain: bool,
}

impl ConsolePrinter {
    /// Colours rows only when stdout is a terminal, so that piped output stays plain.
    pub fn for_stdout() -> Self {
        Self::new(!std::io::stdout().is_terminal())
    }

    pub fn new(plain: bool) -> Self {
        Self { plain }
    }

    fn render(&self, worklogs: &[WorkLog]) -> Vec<String> {
        render_table(worklogs, self.plain)
    }
}

impl EventProcessor for ConsolePrinter {
    async fn process_next(&mut self, event: SyncEvent) -> Result<()> {
        match event {
            SyncEvent::Status(message) => println!("{message}"),
            SyncEvent::Worklogs(worklogs) => {
                for line in self.render(&worklogs) {
                    println!("{line}");
                }
            }
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

fn columns(wl: &WorkLog) -> [String; 6] {
    let mut description = wl.description.clone().unwrap_or_default();
    if description.chars().count() > MAX_DESCRIPTION_WIDTH {
        description = description
            .chars()
            .take(MAX_DESCRIPTION_WIDTH - 3)
            .chain("...".chars())
            .collect();
    }

    [
        wl.key.clone().unwrap_or_default(),
        wl.activity.clone().unwrap_or_default(),
        description,
        wl.start.format("%Y-%m-%d").to_string(),
        format!("{} - {}", wl.start.format("%H:%M"), wl.end.format("%H:%M")),
        wl.state.to_string(),
    ]
}

fn paint(state: WorkLogState, text: String) -> String {
    match state {
        WorkLogState::Incomplete => Colour::Red.paint(text).to_string(),
        WorkLogState::New => Colour::Green.paint(text).to_string(),
        WorkLogState::Updated | WorkLogState::Moved => Colour::Yellow.paint(text).to_string(),
        WorkLogState::Unknown | WorkLogState::Synced => text,
    }
}

/// Renders worklogs as an aligned table. Rows are coloured by state, tooltips go below their row.
pub fn render_table(worklogs: &[WorkLog], plain: bool) -> Vec<String> {
    if worklogs.is_empty() {
        return vec!["No worklogs found.".into()];
    }

    let rows = worklogs.iter().map(columns).collect::<Vec<_>>();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let join = |cells: &[String]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![join(&HEADERS.map(String::from))];
    for (wl, row) in worklogs.iter().zip(rows) {
        let line = join(&row);
        lines.push(if plain { line } else { paint(wl.state, line) });

        if let Some(tooltip) = &wl.tooltip {
            lines.extend(tooltip.lines().map(|v| format!("    {v}")));
        }
    }
    lines
}
