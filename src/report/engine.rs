// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};

use super::{QueryError, ReportRequest, Summary, SummaryRow};
use crate::live::LiveProber;
use crate::pbs::date::{format_day, now_local, Clock};
use crate::pbs::types::UNASSIGNED;
use crate::pbs::{JobDetail, JobObservation};
use crate::store::{JobFilter, Period, Store};

/// Answers summary and detail requests from the store or from the live prober
pub struct QueryEngine {
    store: Option<Store>,
    prober: LiveProber,
    clock: Clock,
}

impl QueryEngine {
    /// `store` may be `None` when only live requests will be made
    pub fn new(store: Option<Store>, prober: LiveProber) -> Self {
        Self {
            store,
            prober,
            clock: now_local,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn summarize(&self, request: &ReportRequest) -> Result<Summary, QueryError> {
        let now = (self.clock)();
        if request.live {
            let jobs = self.live_jobs(&request.filter);
            return Ok(summarize_live(&jobs, now));
        }

        let store = self.store()?;
        let rows: Vec<SummaryRow> = store
            .aggregate_jobs(&request.filter.predicate(now))?
            .into_iter()
            .map(|agg| SummaryRow {
                user: agg.user,
                machine: agg.machine,
                jobs: agg.count,
                last_run: agg.last_run,
            })
            .collect();
        let period_description = self.describe(request, now)?;

        tracing::debug!(rows = rows.len(), period = %period_description, "summarized job history");
        Ok(Summary {
            period_description,
            total_jobs: rows.iter().map(|row| row.jobs).sum(),
            rows,
        })
    }

    /// Human-readable description of the time range a request covers
    pub fn period_description(&self, request: &ReportRequest) -> Result<String, QueryError> {
        self.describe(request, (self.clock)())
    }

    fn describe(&self, request: &ReportRequest, now: NaiveDateTime) -> Result<String, QueryError> {
        if request.live {
            return Ok(live_description(now));
        }
        let period = &request.filter.period;
        Ok(match period {
            Period::AllTime => {
                let since = self.store()?.earliest_start(&request.filter.predicate(now))?;
                format!("Complete history (since {})", day_or_unknown(since))
            }
            Period::LastDays(days) => {
                format!("Last {} days (since {})", days, day_or_unknown(period.cutoff(now)))
            }
            Period::Between { from, to } => {
                format!("From {} to {}", from, last_included_day(*to))
            }
        })
    }

    /// One row per job, newest start first
    pub fn detail(&self, request: &ReportRequest) -> Result<Vec<JobDetail>, QueryError> {
        if request.live {
            let jobs = self.live_jobs(&request.filter);
            return Ok(jobs.iter().map(JobDetail::from_observation).collect());
        }

        let now = (self.clock)();
        let observations = self.store()?.query_jobs(&request.filter.predicate(now))?;
        Ok(latest_per_job(observations)
            .iter()
            .map(JobDetail::from_observation)
            .collect())
    }

    fn store(&self) -> Result<&Store, QueryError> {
        self.store.as_ref().ok_or(QueryError::NoStore)
    }

    fn live_jobs(&self, filter: &JobFilter) -> Vec<JobObservation> {
        self.prober
            .fetch_live(filter.user.as_deref(), filter.machine.as_deref())
    }
}

fn day_or_unknown(day: Option<NaiveDateTime>) -> String {
    day.map(format_day).unwrap_or_else(|| "unknown date".to_string())
}

/// `Between` holds an exclusive end; reports show the last day included
fn last_included_day(end: NaiveDate) -> NaiveDate {
    end.pred_opt().unwrap_or(end)
}

fn live_description(now: NaiveDateTime) -> String {
    format!("Current jobs (as of {})", now.format("%Y-%m-%d %H:%M:%S"))
}

fn summarize_live(jobs: &[JobObservation], now: NaiveDateTime) -> Summary {
    let mut groups: BTreeMap<(String, String), (u64, Option<NaiveDateTime>)> = BTreeMap::new();
    for job in jobs {
        let key = (
            job.user.clone().unwrap_or_else(|| UNASSIGNED.to_string()),
            job.machine.clone().unwrap_or_else(|| UNASSIGNED.to_string()),
        );
        let entry = groups.entry(key).or_default();
        entry.0 += 1;
        entry.1 = entry.1.max(job.started_at());
    }

    let mut rows: Vec<SummaryRow> = groups
        .into_iter()
        .map(|((user, machine), (jobs, last_run))| SummaryRow {
            user,
            machine,
            jobs,
            last_run,
        })
        .collect();
    // BTreeMap already yields user/machine order; the stable sort keeps it for equal counts
    rows.sort_by(|a, b| b.jobs.cmp(&a.jobs));

    Summary {
        period_description: live_description(now),
        total_jobs: jobs.len() as u64,
        rows,
    }
}

/// Keep one observation per job id.
///
/// The latest parseable start wins, unparseable starts lose to any parseable
/// one, and among equal starts the later insertion wins. `observations` must
/// be in insertion order.
fn latest_per_job(observations: Vec<JobObservation>) -> Vec<JobObservation> {
    let mut best: HashMap<String, (Option<NaiveDateTime>, JobObservation)> = HashMap::new();
    for obs in observations {
        let started = obs.started_at();
        match best.get(&obs.job_id) {
            Some((current, _)) if started < *current => {}
            _ => {
                best.insert(obs.job_id.clone(), (started, obs));
            }
        }
    }

    let mut latest: Vec<_> = best.into_values().collect();
    latest.sort_by(|(a_start, a), (b_start, b)| {
        b_start.cmp(a_start).then_with(|| a.job_id.cmp(&b.job_id))
    });
    latest.into_iter().map(|(_, obs)| obs).collect()
}
