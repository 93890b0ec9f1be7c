// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Plain-text report tables for `pbsmon stats`.

use crate::pbs::date::{format_day, parse_pbs_date};
use crate::pbs::types::UNASSIGNED;
use crate::pbs::walltime::format_duration;
use crate::pbs::JobDetail;
use crate::report::Summary;

const NO_MATCHES: &str = "No jobs found matching the specified criteria.";

pub fn render_summary(summary: &Summary) -> String {
    let mut lines = vec![
        format!("PBS Job Statistics - {}", summary.period_description),
        format!("Total Jobs: {}", summary.total_jobs),
        String::new(),
    ];

    if summary.rows.is_empty() {
        lines.push(NO_MATCHES.to_string());
        return finish(lines);
    }

    lines.push(format!("{:<20} {:<15} {:<10} {:<15}", "User", "Machine", "Jobs", "Last Run"));
    lines.push("-".repeat(60));
    for row in &summary.rows {
        let last_run = row.last_run.map(format_day).unwrap_or_else(|| "N/A".to_string());
        lines.push(format!("{:<20} {:<15} {:<10} {:<15}", row.user, row.machine, row.jobs, last_run));
    }
    finish(lines)
}

pub fn render_detail(period_description: &str, jobs: &[JobDetail]) -> String {
    let mut lines = vec![
        format!("PBS Job Details - {}", period_description),
        format!("Jobs: {}", jobs.len()),
        String::new(),
    ];

    if jobs.is_empty() {
        lines.push(NO_MATCHES.to_string());
        return finish(lines);
    }

    lines.push(format!(
        "{:<16} {:<12} {:<10} {:<16} {:<8} {:<1} {:>5} {:>14} {:>14} {:>5}  {}",
        "Job ID", "User", "Machine", "Started", "Queue", "S", "CPUs", "Walltime", "Used", "Exit", "Name"
    ));
    lines.push("-".repeat(120));
    for job in jobs {
        lines.push(format!(
            "{:<16} {:<12} {:<10} {:<16} {:<8} {:<1} {:>5} {:>14} {:>14} {:>5}  {}",
            job.job_id,
            job.user,
            job.machine,
            short_start(&job.start_time),
            job.queue,
            job.state.code(),
            or_unassigned(job.requested.cpus),
            job.requested.walltime.map(format_duration).unwrap_or_else(|| UNASSIGNED.to_string()),
            job.used.walltime.map(format_duration).unwrap_or_else(|| UNASSIGNED.to_string()),
            or_unassigned(job.exit_status),
            job.job_name,
        ));
    }
    finish(lines)
}

/// Join report lines, newline-terminated
fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// `Wed Sep 25 14:30:45 2024` -> `2024-09-25 14:30`; other text passes through
pub fn short_start(start_time: &str) -> String {
    match parse_pbs_date(start_time) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None if start_time.is_empty() => UNASSIGNED.to_string(),
        None => start_time.to_string(),
    }
}

fn or_unassigned<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| UNASSIGNED.to_string())
}
