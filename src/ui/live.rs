// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::time::Duration;

use chrono::NaiveDateTime;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table},
    Frame,
};

use super::text::short_start;
use crate::pbs::date::format_day;
use crate::pbs::types::UNASSIGNED;
use crate::pbs::walltime::format_duration;
use crate::pbs::{JobDetail, JobState};
use crate::report::Summary;

const HEADER_BG: Color = Color::Blue;
const HEADER_FG: Color = Color::White;

/// Column widths
const COL_JOBID: u16 = 16;
const COL_USER: u16 = 12;
const COL_MACHINE: u16 = 12;
const COL_STATE: u16 = 3;
const COL_QUEUE: u16 = 10;
const COL_CPUS: u16 = 5;
const COL_START: u16 = 17;
const COL_WALLTIME: u16 = 14;
const COL_JOBS: u16 = 8;

/// What the watch screen currently shows
pub enum WatchRows {
    Summary(Summary),
    Detail(Vec<JobDetail>),
}

pub struct WatchView {
    pub rows: WatchRows,
    pub interval: Duration,
    pub updated_at: NaiveDateTime,
}

pub fn render_watch(frame: &mut Frame, view: &WatchView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(0),    // Job table
            Constraint::Length(1), // Footer
        ])
        .split(frame.area());

    render_title(frame, chunks[0], view);
    match &view.rows {
        WatchRows::Summary(summary) => render_summary_table(frame, chunks[1], summary),
        WatchRows::Detail(jobs) => render_detail_table(frame, chunks[1], jobs),
    }
    render_footer(frame, chunks[2], view);
}

fn render_title(frame: &mut Frame, area: Rect, view: &WatchView) {
    let title = " pbsmon - current jobs ";
    let updated = format!("every {}s, updated {} ", view.interval.as_secs(), view.updated_at.format("%H:%M:%S"));
    let padding = (area.width as usize).saturating_sub(title.len() + updated.len());

    let line = Line::from(vec![
        Span::styled(title, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
        Span::styled(updated, Style::default().fg(Color::Gray)),
    ]);
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(Color::DarkGray)), area);
}

fn header_row(names: &[&'static str]) -> Row<'static> {
    let style = Style::default().fg(HEADER_FG).bg(HEADER_BG).add_modifier(Modifier::BOLD);
    Row::new(names.iter().map(|name| Cell::from(*name))).style(style)
}

fn render_summary_table(frame: &mut Frame, area: Rect, summary: &Summary) {
    let rows: Vec<Row> = summary
        .rows
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.user.clone()).style(Style::default().fg(Color::Magenta)),
                Cell::from(row.machine.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(format!("{:>width$}", row.jobs, width = COL_JOBS as usize))
                    .style(Style::default().fg(Color::Green)),
                Cell::from(row.last_run.map(format_day).unwrap_or_else(|| UNASSIGNED.to_string())),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(COL_USER),
            Constraint::Length(COL_MACHINE),
            Constraint::Length(COL_JOBS),
            Constraint::Min(10),
        ],
    )
    .header(header_row(&["USER", "MACHINE", "    JOBS", "SINCE"]));
    frame.render_widget(table, area);
}

fn render_detail_table(frame: &mut Frame, area: Rect, jobs: &[JobDetail]) {
    let rows: Vec<Row> = jobs.iter().map(detail_row).collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(COL_JOBID),
            Constraint::Length(COL_USER),
            Constraint::Length(COL_MACHINE),
            Constraint::Length(COL_STATE),
            Constraint::Length(COL_QUEUE),
            Constraint::Length(COL_CPUS),
            Constraint::Length(COL_START),
            Constraint::Length(COL_WALLTIME),
            Constraint::Min(8),
        ],
    )
    .header(header_row(&[
        "JOBID", "USER", "MACHINE", "S", "QUEUE", " CPUS", "STARTED", "USED", "NAME",
    ]));
    frame.render_widget(table, area);
}

fn detail_row(job: &JobDetail) -> Row<'static> {
    let cpus = job
        .requested
        .cpus
        .map(|c| c.to_string())
        .unwrap_or_else(|| UNASSIGNED.to_string());
    let used = job
        .used
        .walltime
        .map(format_duration)
        .unwrap_or_else(|| UNASSIGNED.to_string());

    Row::new(vec![
        Cell::from(job.job_id.clone()).style(Style::default().fg(Color::Yellow)),
        Cell::from(job.user.clone()).style(Style::default().fg(Color::Magenta)),
        Cell::from(job.machine.clone()).style(Style::default().fg(Color::Cyan)),
        Cell::from(format!("{:^width$}", job.state.code(), width = COL_STATE as usize))
            .style(Style::default().fg(state_color(&job.state))),
        Cell::from(job.queue.clone()),
        Cell::from(format!("{:>width$}", cpus, width = COL_CPUS as usize)),
        Cell::from(short_start(&job.start_time)).style(Style::default().fg(Color::Gray)),
        Cell::from(used).style(Style::default().fg(Color::Green)),
        Cell::from(job.job_name.clone()),
    ])
}

fn state_color(state: &JobState) -> Color {
    match state {
        s if s.is_running() => Color::Green,
        JobState::Queued | JobState::Waiting => Color::Yellow,
        JobState::Held | JobState::Suspended | JobState::UserSuspended => Color::Red,
        _ => Color::Gray,
    }
}

fn render_footer(frame: &mut Frame, area: Rect, view: &WatchView) {
    let count = match &view.rows {
        WatchRows::Summary(summary) => summary.total_jobs as usize,
        WatchRows::Detail(jobs) => jobs.len(),
    };
    let text = Span::styled(format!(" {} jobs | q:quit ", count), Style::default().fg(Color::Gray));
    frame.render_widget(Paragraph::new(Line::from(text)), area);
}
