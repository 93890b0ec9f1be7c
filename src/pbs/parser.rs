// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Parsing of `pbsnodes -F json` / `qstat -F json` output and
//! normalization of the fields we index on.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{JobObservation, NodeSnapshot, QstatJob};

/// Scheduler output that could not be understood
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("{dataset} output is not valid JSON: {source}")]
    Json {
        dataset: &'static str,
        source: serde_json::Error,
    },
    #[error("{dataset} output has unexpected layout: {reason}")]
    Layout {
        dataset: &'static str,
        reason: &'static str,
    },
}

/// Parse `pbsnodes -av -F json` output into one snapshot per node.
///
/// Current PBS wraps nodes in a `"nodes"` object next to `"timestamp"` and
/// `"pbs_version"`; older builds emit the node map at top level.
pub fn parse_nodes(payload: &[u8], polled_at: NaiveDateTime) -> Result<Vec<NodeSnapshot>, PayloadError> {
    let root = parse_object(payload, "nodes")?;
    let nodes = match root.get("nodes") {
        Some(Value::Object(nodes)) => nodes.clone(),
        Some(_) => {
            return Err(PayloadError::Layout {
                dataset: "nodes",
                reason: "\"nodes\" is not an object",
            })
        }
        None => root,
    };

    Ok(nodes
        .into_iter()
        .filter(|(_, attributes)| attributes.is_object())
        .map(|(node_name, attributes)| NodeSnapshot {
            poll_timestamp: polled_at,
            node_name,
            attributes,
        })
        .collect())
}

/// Parse `qstat -f -F json` output into job observations.
///
/// A payload without a `"Jobs"` key means the server knows no jobs.
pub fn parse_jobs(
    payload: &[u8],
    polled_at: Option<NaiveDateTime>,
) -> Result<Vec<JobObservation>, PayloadError> {
    let mut root = parse_object(payload, "jobs")?;
    let jobs = match root.remove("Jobs") {
        Some(Value::Object(jobs)) => jobs,
        Some(_) => {
            return Err(PayloadError::Layout {
                dataset: "jobs",
                reason: "\"Jobs\" is not an object",
            })
        }
        None => Map::new(),
    };

    Ok(jobs
        .into_iter()
        .map(|(job_id, attributes)| observation_from_qstat(job_id, attributes, polled_at))
        .collect())
}

/// Build an observation from one `Jobs` entry
pub fn observation_from_qstat(
    job_id: String,
    attributes: Value,
    polled_at: Option<NaiveDateTime>,
) -> JobObservation {
    let job = QstatJob::from_attributes(&attributes);
    JobObservation {
        job_id,
        user: job.job_owner.as_deref().and_then(normalize_owner),
        machine: job.exec_host.as_deref().and_then(normalize_exec_host),
        start_time: job.stime.unwrap_or_default().trim().to_string(),
        attributes,
        poll_timestamp: polled_at,
    }
}

/// `alice@login01.cluster` -> `alice`
pub fn normalize_owner(owner: &str) -> Option<String> {
    let user = owner.split('@').next().unwrap_or(owner).trim();
    (!user.is_empty()).then(|| user.to_string())
}

/// `node07/0*4+node08/0*4` -> `node07`
pub fn normalize_exec_host(exec_host: &str) -> Option<String> {
    let first = exec_host.split('+').next().unwrap_or(exec_host);
    let host = first.split('/').next().unwrap_or(first).trim();
    (!host.is_empty()).then(|| host.to_string())
}

fn parse_object(payload: &[u8], dataset: &'static str) -> Result<Map<String, Value>, PayloadError> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PayloadError::Layout {
            dataset,
            reason: "top level is not an object",
        }),
        Err(source) => Err(PayloadError::Json { dataset, source }),
    }
}
