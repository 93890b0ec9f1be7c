// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Collector: one poll of `pbsnodes` and `qstat` into the store.
//!
//! The node half and the job half are independent. A failing `qstat` does not
//! lose the node snapshots of the same poll, and the other way round.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::backup::write_backup;
use crate::pbs::date::{now_utc, Clock};
use crate::pbs::parser::{parse_jobs, parse_nodes};
use crate::pbs::{CommandError, PayloadError, PbsCli};
use crate::store::{Store, StoreError};

/// Why one half (or both halves) of a poll failed
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("node poll failed: {nodes}; job poll failed: {jobs}")]
    Both {
        nodes: Box<PollError>,
        jobs: Box<PollError>,
    },
}

/// What a poll wrote, plus the error of a failed half
#[derive(Debug, Default)]
pub struct PollReport {
    pub nodes_stored: usize,
    pub jobs_stored: usize,
    pub jobs_skipped: usize,
    pub node_error: Option<PollError>,
    pub job_error: Option<PollError>,
}

impl PollReport {
    pub fn is_complete(&self) -> bool {
        self.node_error.is_none() && self.job_error.is_none()
    }
}

pub struct Collector {
    cli: PbsCli,
    window: Duration,
    backup_dir: Option<PathBuf>,
    clock: Clock,
}

impl Collector {
    pub fn new(cli: PbsCli, window: Duration, backup_dir: Option<PathBuf>) -> Self {
        Self {
            cli,
            window,
            backup_dir,
            clock: now_utc,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run one poll cycle.
    ///
    /// Returns `Err` only if neither nodes nor jobs could be stored.
    pub fn poll(&self, store: &mut Store) -> Result<PollReport, PollError> {
        let now = (self.clock)();
        let mut report = PollReport::default();

        match self.poll_nodes(store, now) {
            Ok(stored) => report.nodes_stored = stored,
            Err(e) => {
                tracing::error!(error = %e, "node poll failed");
                report.node_error = Some(e);
            }
        }

        match self.poll_jobs(store, now) {
            Ok((stored, skipped)) => {
                report.jobs_stored = stored;
                report.jobs_skipped = skipped;
            }
            Err(e) => {
                tracing::error!(error = %e, "job poll failed");
                report.job_error = Some(e);
            }
        }

        match (report.node_error.take(), report.job_error.take()) {
            (Some(nodes), Some(jobs)) => Err(PollError::Both {
                nodes: Box::new(nodes),
                jobs: Box::new(jobs),
            }),
            (node_error, job_error) => {
                tracing::info!(
                    nodes = report.nodes_stored,
                    jobs = report.jobs_stored,
                    skipped = report.jobs_skipped,
                    "poll complete"
                );
                Ok(PollReport {
                    node_error,
                    job_error,
                    ..report
                })
            }
        }
    }

    fn poll_nodes(&self, store: &mut Store, now: NaiveDateTime) -> Result<usize, PollError> {
        let payload = self.cli.fetch_nodes()?;
        self.backup("nodes", now, &payload);
        let snapshots = parse_nodes(&payload, now)?;
        Ok(store.insert_nodes(&snapshots)?)
    }

    fn poll_jobs(&self, store: &mut Store, now: NaiveDateTime) -> Result<(usize, usize), PollError> {
        let payload = self.cli.fetch_jobs(true)?;
        self.backup("jobs", now, &payload);
        let observations = parse_jobs(&payload, Some(now))?;
        let counts = store.insert_jobs_if_not_duplicate(&observations, self.window, now)?;
        Ok((counts.stored, counts.skipped))
    }

    fn backup(&self, dataset: &str, now: NaiveDateTime, payload: &[u8]) {
        let Some(dir) = &self.backup_dir else {
            return;
        };
        if let Err(e) = write_backup(dir, dataset, now, payload) {
            tracing::warn!(dir = %dir.display(), dataset, error = %e, "could not write payload backup");
        }
    }
}
