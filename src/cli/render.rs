//! Terminal output of the tracker. The whole screen is redrawn on every tick.

use std::io::{self, IsTerminal, Stdout, Write};

use ansi_term::{Colour, Style};
use chrono::{DateTime, Local, Utc};

use crate::{
    tracker::aggregator::ActivityShare,
    utils::time::{format_elapsed_time, SESSION_START_FORMAT},
};

/// Resets the terminal, which clears the screen and the scrollback.
const CLEAR_SCREEN: &str = "\x1bc";

/// What a single redraw shows.
#[derive(Debug)]
pub struct Summary<'a> {
    pub tracking_seconds: u64,
    pub session: Option<SessionSummary<'a>>,
    pub top_activities: usize,
    pub activities: &'a [ActivityShare],
    /// Outcome of the last command, kept on screen until the next one.
    pub notice: Option<&'a str>,
}

#[derive(Debug)]
pub struct SessionSummary<'a> {
    pub label: &'a str,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
}

pub struct Console<W> {
    out: W,
    styled: bool,
}

impl Console<Stdout> {
    pub fn stdout() -> Self {
        let out = io::stdout();
        let styled = out.is_terminal();
        Self { out, styled }
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self { out, styled }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn heading(&self, text: &str) -> String {
        if self.styled {
            Style::new().bold().paint(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn highlight(&self, text: &str) -> String {
        if self.styled {
            Colour::Cyan.paint(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    /// Writes `text` without a newline so the answer is typed right after it.
    pub fn prompt(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "{text}")?;
        self.out.flush()
    }

    pub fn redraw(&mut self, summary: &Summary<'_>) -> io::Result<()> {
        let mut screen = String::from(CLEAR_SCREEN);
        screen.push_str(&format!(
            "Tracking for {}.\n",
            self.highlight(&format_elapsed_time(summary.tracking_seconds))
        ));

        match &summary.session {
            Some(session) => {
                let started_at = session.started_at.with_timezone(&Local);
                screen.push_str(&format!(
                    "Current session: {}\n",
                    self.heading(session.label)
                ));
                screen.push_str(&format!(
                    "Session started at: {} (Elapsed: {})\n",
                    started_at.format(SESSION_START_FORMAT),
                    format_elapsed_time(session.elapsed_seconds)
                ));
            }
            None => screen.push_str("No active session.\n"),
        }

        if summary.activities.is_empty() {
            screen.push_str("No activities to display.\n");
        } else {
            screen.push('\n');
            screen.push_str(&self.heading(&format!("Top {} Activities:", summary.top_activities)));
            screen.push('\n');
            for share in summary.activities {
                screen.push_str(&format!("{}: {:.2}\n", share.key, share.percentage));
            }
        }

        if let Some(notice) = summary.notice {
            screen.push('\n');
            screen.push_str(notice);
            screen.push('\n');
        }

        self.out.write_all(screen.as_bytes())?;
        self.out.flush()
    }
}
