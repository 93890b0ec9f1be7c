// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use chrono::NaiveDateTime;
use rusqlite::params_from_iter;
use serde_json::Value;

use super::{JobAggregate, Predicate, Store, StoreError};
use crate::pbs::date::{from_epoch, parse_poll_stamp};
use crate::pbs::JobObservation;

impl Store {
    /// Observations matching the predicate, in insertion order
    pub fn query_jobs(&self, predicate: &Predicate) -> Result<Vec<JobObservation>, StoreError> {
        let sql = format!(
            "SELECT job_id, user, machine, start_time, raw_attributes, poll_timestamp
             FROM jobs WHERE {} ORDER BY rowid ASC",
            predicate.where_clause()
        );
        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(predicate.params()), |row| {
                let job_id: String = row.get(0)?;
                let raw: Option<String> = row.get(4)?;
                let polled: Option<String> = row.get(5)?;
                Ok(JobObservation {
                    attributes: decode_attributes(&job_id, raw.as_deref()),
                    job_id,
                    user: row.get(1)?,
                    machine: row.get(2)?,
                    start_time: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    poll_timestamp: polled.as_deref().and_then(parse_poll_stamp),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Observation counts and latest start per (user, machine), busiest first
    pub fn aggregate_jobs(&self, predicate: &Predicate) -> Result<Vec<JobAggregate>, StoreError> {
        let sql = format!(
            "SELECT user, machine, COUNT(*) AS job_count, MAX(start_epoch)
             FROM jobs WHERE {}
             GROUP BY user, machine
             ORDER BY job_count DESC, user ASC, machine ASC",
            predicate.where_clause()
        );
        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(predicate.params()), |row| {
                Ok(JobAggregate {
                    user: row.get(0)?,
                    machine: row.get(1)?,
                    count: row.get::<_, i64>(2)?.max(0) as u64,
                    last_run: row.get::<_, Option<i64>>(3)?.and_then(from_epoch),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Earliest parseable start time among matching rows
    pub fn earliest_start(&self, predicate: &Predicate) -> Result<Option<NaiveDateTime>, StoreError> {
        let sql = format!("SELECT MIN(start_epoch) FROM jobs WHERE {}", predicate.where_clause());
        let earliest: Option<i64> = self
            .connection
            .query_row(&sql, params_from_iter(predicate.params()), |row| row.get(0))?;
        Ok(earliest.and_then(from_epoch))
    }

    pub fn count_jobs(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn count_nodes(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn decode_attributes(job_id: &str, raw: Option<&str>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(job_id, error = %e, "stored job attributes are not valid JSON");
        Value::Null
    })
}
