// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use rusqlite::{params, Connection, TransactionBehavior};

use super::{Store, StoreError};
use crate::pbs::date::{pbs_date_epoch, poll_stamp};
use crate::pbs::{JobObservation, NodeSnapshot};

/// Outcome of a batch job insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobInsertCounts {
    pub stored: usize,
    pub skipped: usize,
}

impl Store {
    /// Append one node snapshot
    pub fn insert_node(&self, snapshot: &NodeSnapshot) -> Result<(), StoreError> {
        let attributes = serde_json::to_string(&snapshot.attributes).map_err(|source| StoreError::Encode {
            name: snapshot.node_name.clone(),
            source,
        })?;
        self.connection
            .prepare_cached("INSERT INTO nodes (poll_timestamp, node_name, raw_attributes) VALUES (?1, ?2, ?3)")?
            .execute(params![poll_stamp(snapshot.poll_timestamp), snapshot.node_name, attributes])?;
        Ok(())
    }

    /// Append a poll's worth of node snapshots in one transaction
    pub fn insert_nodes(&mut self, snapshots: &[NodeSnapshot]) -> Result<usize, StoreError> {
        let tx = self.connection.unchecked_transaction()?;
        for snapshot in snapshots {
            self.insert_node(snapshot)?;
        }
        tx.commit()?;
        Ok(snapshots.len())
    }

    /// Insert the observation unless the same (job_id, user, machine) was
    /// already stored by a poll within `window` before `now`.
    ///
    /// Returns whether a row was written.
    pub fn insert_job_if_not_duplicate(
        &mut self,
        observation: &JobObservation,
        window: Duration,
        now: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let counts = self.insert_jobs_if_not_duplicate(std::slice::from_ref(observation), window, now)?;
        Ok(counts.stored == 1)
    }

    /// Batch form of [`Store::insert_job_if_not_duplicate`].
    ///
    /// Check and insert share one IMMEDIATE transaction, so a concurrent
    /// writer cannot slip a duplicate in between.
    pub fn insert_jobs_if_not_duplicate(
        &mut self,
        observations: &[JobObservation],
        window: Duration,
        now: NaiveDateTime,
    ) -> Result<JobInsertCounts, StoreError> {
        let cutoff = TimeDelta::from_std(window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(NaiveDateTime::MIN);
        let cutoff = poll_stamp(cutoff);

        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut counts = JobInsertCounts::default();
        for observation in observations {
            if is_recent_duplicate(&tx, observation, &cutoff)? {
                tracing::trace!(job_id = %observation.job_id, "skipping repeat observation");
                counts.skipped += 1;
            } else {
                insert_job_row(&tx, observation, now)?;
                counts.stored += 1;
            }
        }
        tx.commit()?;
        Ok(counts)
    }
}

fn is_recent_duplicate(
    connection: &Connection,
    observation: &JobObservation,
    cutoff: &str,
) -> Result<bool, StoreError> {
    // IS compares NULL user/machine as equal
    let exists: bool = connection
        .prepare_cached(
            "SELECT EXISTS(
                SELECT 1 FROM jobs
                WHERE job_id = ?1 AND user IS ?2 AND machine IS ?3 AND poll_timestamp >= ?4
             )",
        )?
        .query_row(
            params![observation.job_id, observation.user, observation.machine, cutoff],
            |row| row.get(0),
        )?;
    Ok(exists)
}

fn insert_job_row(
    connection: &Connection,
    observation: &JobObservation,
    now: NaiveDateTime,
) -> Result<(), StoreError> {
    let attributes = serde_json::to_string(&observation.attributes).map_err(|source| StoreError::Encode {
        name: observation.job_id.clone(),
        source,
    })?;
    let start_time = (!observation.start_time.is_empty()).then_some(observation.start_time.as_str());
    connection
        .prepare_cached(
            "INSERT INTO jobs (job_id, user, machine, start_time, start_epoch, raw_attributes, poll_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?
        .execute(params![
            observation.job_id,
            observation.user,
            observation.machine,
            start_time,
            pbs_date_epoch(&observation.start_time),
            attributes,
            poll_stamp(observation.poll_timestamp.unwrap_or(now)),
        ])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pbs::date::parse_pbs_date;
    use crate::store::{JobFilter, Period};
    use serde_json::json;

    const WINDOW: Duration = Duration::from_secs(5 * 60);

    fn at(text: &str) -> NaiveDateTime {
        parse_pbs_date(text).unwrap()
    }

    fn job(job_id: &str, polled: NaiveDateTime) -> JobObservation {
        JobObservation {
            job_id: job_id.to_string(),
            user: Some("alice".to_string()),
            machine: Some("node07".to_string()),
            start_time: "Wed Sep 25 14:00:00 2024".to_string(),
            attributes: json!({"job_state": "R"}),
            poll_timestamp: Some(polled),
        }
    }

    #[test]
    fn test_repeat_poll_within_window_is_skipped() {
        let mut store = Store::open_in_memory().unwrap();
        let first = at("Wed Sep 25 14:30:00 2024");
        let second = at("Wed Sep 25 14:32:00 2024");

        assert!(store.insert_job_if_not_duplicate(&job("101", first), WINDOW, first).unwrap());
        assert!(!store.insert_job_if_not_duplicate(&job("101", second), WINDOW, second).unwrap());
        assert_eq!(store.count_jobs().unwrap(), 1);
    }

    #[test]
    fn test_repeat_poll_after_window_is_stored() {
        let mut store = Store::open_in_memory().unwrap();
        let first = at("Wed Sep 25 14:30:00 2024");
        let second = at("Wed Sep 25 14:36:00 2024");

        assert!(store.insert_job_if_not_duplicate(&job("101", first), WINDOW, first).unwrap());
        assert!(store.insert_job_if_not_duplicate(&job("101", second), WINDOW, second).unwrap());
        assert_eq!(store.count_jobs().unwrap(), 2);
    }

    #[test]
    fn test_window_boundary_counts_as_duplicate() {
        let mut store = Store::open_in_memory().unwrap();
        let first = at("Wed Sep 25 14:30:00 2024");
        let second = at("Wed Sep 25 14:35:00 2024");

        store.insert_job_if_not_duplicate(&job("101", first), WINDOW, first).unwrap();
        assert!(!store.insert_job_if_not_duplicate(&job("101", second), WINDOW, second).unwrap());
    }

    #[test]
    fn test_identity_includes_user_and_machine() {
        let mut store = Store::open_in_memory().unwrap();
        let now = at("Wed Sep 25 14:30:00 2024");

        let mut moved = job("101", now);
        moved.machine = Some("node08".to_string());
        let mut unassigned = job("101", now);
        unassigned.machine = None;

        let counts = store
            .insert_jobs_if_not_duplicate(&[job("101", now), moved, unassigned.clone()], WINDOW, now)
            .unwrap();
        assert_eq!(counts, JobInsertCounts { stored: 3, skipped: 0 });

        // NULL machine still participates in the identity
        assert!(!store.insert_job_if_not_duplicate(&unassigned, WINDOW, now).unwrap());
    }

    #[test]
    fn test_unparseable_start_time_is_stored_without_epoch() {
        let mut store = Store::open_in_memory().unwrap();
        let now = at("Wed Sep 25 14:30:00 2024");
        let mut odd = job("101", now);
        odd.start_time = "sometime".to_string();
        store.insert_job_if_not_duplicate(&odd, WINDOW, now).unwrap();

        let all_time = JobFilter {
            period: Period::AllTime,
            ..Default::default()
        };
        let rows = store.query_jobs(&all_time.predicate(now)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_time, "sometime");
        assert!(store.query_jobs(&JobFilter::default().predicate(now)).unwrap().is_empty());
    }

    #[test]
    fn test_insert_nodes_appends_every_poll() {
        let mut store = Store::open_in_memory().unwrap();
        let snapshot = |polled| NodeSnapshot {
            poll_timestamp: polled,
            node_name: "node07".to_string(),
            attributes: json!({"state": "free"}),
        };

        store.insert_nodes(&[snapshot(at("Wed Sep 25 14:30:00 2024"))]).unwrap();
        store.insert_node(&snapshot(at("Wed Sep 25 14:31:00 2024"))).unwrap();
        store.insert_node(&snapshot(at("Wed Sep 25 14:31:00 2024"))).unwrap();
        assert_eq!(store.count_nodes().unwrap(), 3);
    }

    #[test]
    fn test_insert_nodes_commits_one_batch() {
        let mut store = Store::open_in_memory().unwrap();
        let polled = at("Wed Sep 25 14:30:00 2024");
        let snapshots: Vec<_> = ["node07", "node08", "node09"]
            .into_iter()
            .map(|name| NodeSnapshot {
                poll_timestamp: polled,
                node_name: name.to_string(),
                attributes: json!({"state": "free"}),
            })
            .collect();

        assert_eq!(store.insert_nodes(&snapshots).unwrap(), 3);
        assert!(store.connection.is_autocommit());
        assert_eq!(store.count_nodes().unwrap(), 3);
        assert_eq!(store.insert_nodes(&[]).unwrap(), 0);
        assert_eq!(store.count_nodes().unwrap(), 3);
    }
}
