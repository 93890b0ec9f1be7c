// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Live view: ask `qstat` directly for the jobs it currently knows,
//! bypassing the database.
//!
//! Failures never propagate; a refresh loop gets an empty list and tries
//! again on its next tick.

use crate::pbs::date::{format_pbs_date, now_local, Clock};
use crate::pbs::parser::parse_jobs;
use crate::pbs::types::QstatJob;
use crate::pbs::{JobObservation, JobState, PbsCli};

pub struct LiveProber {
    cli: PbsCli,
    clock: Clock,
}

impl LiveProber {
    pub fn new(cli: PbsCli) -> Self {
        Self {
            cli,
            clock: now_local,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current, unfinished jobs, optionally narrowed to one user and/or machine.
    ///
    /// Each result's start time is the moment of the query.
    pub fn fetch_live(&self, user: Option<&str>, machine: Option<&str>) -> Vec<JobObservation> {
        let payload = match self.cli.fetch_jobs(false) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "live job query failed");
                return Vec::new();
            }
        };

        let now = (self.clock)();
        let jobs = match parse_jobs(&payload, Some(now)) {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(error = %e, "live job query returned unusable output");
                return Vec::new();
            }
        };

        let observed_at = format_pbs_date(now);
        let mut live: Vec<JobObservation> = jobs
            .into_iter()
            .filter(|job| !live_state(job).is_finished())
            .filter(|job| user.is_none() || job.user.as_deref() == user)
            .filter(|job| machine.is_none() || job.machine.as_deref() == machine)
            .map(|mut job| {
                job.start_time = observed_at.clone();
                job
            })
            .collect();
        live.sort_by(|a, b| a.job_id.cmp(&b.job_id));

        tracing::debug!(jobs = live.len(), "live query complete");
        live
    }
}

fn live_state(job: &JobObservation) -> JobState {
    let state = QstatJob::from_attributes(&job.attributes).job_state;
    JobState::from(state.as_deref().unwrap_or(""))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pbs::cli::{CommandError, CommandRunner, SchedulerCommand};
    use chrono::{NaiveDate, NaiveDateTime};
    use std::time::Duration;

    /// Scripted stand-in for the scheduler binaries
    pub(crate) enum FakeRunner {
        Output(&'static str),
        TimedOut,
        Exited,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, command: &SchedulerCommand) -> Result<Vec<u8>, CommandError> {
            match self {
                FakeRunner::Output(out) => Ok(out.as_bytes().to_vec()),
                FakeRunner::TimedOut => Err(CommandError::Timeout {
                    command: command.to_string(),
                    timeout: Duration::from_secs(30),
                }),
                FakeRunner::Exited => Err(CommandError::Failed {
                    command: command.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "qstat: cannot connect to server".to_string(),
                }),
            }
        }
    }

    pub(crate) const LIVE_QSTAT: &str = r#"{
        "Jobs": {
            "201.pbs01": {
                "Job_Name": "md-run", "Job_Owner": "alice@login01", "job_state": "R",
                "queue": "workq", "exec_host": "node07/0*8",
                "stime": "Mon Sep 30 08:00:00 2024",
                "Resource_List": {"ncpus": 8, "walltime": "24:00:00"}
            },
            "202.pbs01": {
                "Job_Name": "post", "Job_Owner": "bob@login01", "job_state": "Q",
                "queue": "workq"
            },
            "203.pbs01": {
                "Job_Name": "done", "Job_Owner": "alice@login01", "job_state": "F",
                "queue": "workq", "exec_host": "node08/0",
                "stime": "Sun Sep 29 08:00:00 2024"
            },
            "204.pbs01": {
                "Job_Name": "mesh", "Job_Owner": "alice@login02", "job_state": "R",
                "queue": "long", "exec_host": "node09/1",
                "stime": "Mon Sep 30 09:00:00 2024"
            }
        }
    }"#;

    pub(crate) fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 30)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    pub(crate) fn prober(runner: FakeRunner) -> LiveProber {
        LiveProber::new(PbsCli::new(Box::new(runner), "pbsnodes", "qstat")).with_clock(fixed_now)
    }

    #[test]
    fn test_fetch_live_excludes_finished_jobs() {
        let jobs = prober(FakeRunner::Output(LIVE_QSTAT)).fetch_live(None, None);
        let ids: Vec<_> = jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["201.pbs01", "202.pbs01", "204.pbs01"]);
    }

    #[test]
    fn test_fetch_live_stamps_current_time() {
        let jobs = prober(FakeRunner::Output(LIVE_QSTAT)).fetch_live(None, None);
        for job in &jobs {
            assert_eq!(job.start_time, "Mon Sep 30 12:00:00 2024");
            assert_eq!(job.started_at(), Some(fixed_now()));
        }
    }

    #[test]
    fn test_fetch_live_filters_user_and_machine() {
        let live = prober(FakeRunner::Output(LIVE_QSTAT));
        let alice = live.fetch_live(Some("alice"), None);
        assert_eq!(alice.len(), 2);

        let on_node09 = live.fetch_live(Some("alice"), Some("node09"));
        assert_eq!(on_node09.len(), 1);
        assert_eq!(on_node09[0].job_id, "204.pbs01");

        assert!(live.fetch_live(Some("nobody"), None).is_empty());
    }

    #[test]
    fn test_fetch_live_timeout_yields_empty() {
        assert!(prober(FakeRunner::TimedOut).fetch_live(None, None).is_empty());
    }

    #[test]
    fn test_fetch_live_nonzero_exit_yields_empty() {
        assert!(prober(FakeRunner::Exited).fetch_live(None, None).is_empty());
    }

    #[test]
    fn test_fetch_live_malformed_json_yields_empty() {
        assert!(prober(FakeRunner::Output("{\"Jobs\": ")).fetch_live(None, None).is_empty());
        assert!(prober(FakeRunner::Output("qstat: Unknown Job Id")).fetch_live(None, None).is_empty());
    }

    #[test]
    fn test_fetch_live_with_unusable_binaries() {
        use crate::pbs::SystemRunner;

        // `false` rejects the qstat flags with a non-zero exit
        let runner = SystemRunner::new(Duration::from_secs(5)).unwrap();
        let live = LiveProber::new(PbsCli::new(Box::new(runner), "pbsnodes", "false"));
        assert!(live.fetch_live(None, None).is_empty());

        let runner = SystemRunner::new(Duration::from_secs(5)).unwrap();
        let live = LiveProber::new(PbsCli::new(Box::new(runner), "pbsnodes", "/nonexistent/qstat"));
        assert!(live.fetch_live(None, None).is_empty());
    }
}
