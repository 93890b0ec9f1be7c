// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Node and job records as collected from PBS and as reported back out.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::date::parse_pbs_date;
use super::walltime::parse_walltime;

/// Job state as reported by PBS (`job_state` attribute)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Held,
    Waiting,
    Transit,
    Exiting,
    /// Array job with at least one subjob started
    Begun,
    Suspended,
    UserSuspended,
    /// Finished array subjob
    Expired,
    Finished,
    Moved,
    Unknown(String),
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s.trim() {
            "Q" => JobState::Queued,
            "R" => JobState::Running,
            "H" => JobState::Held,
            "W" => JobState::Waiting,
            "T" => JobState::Transit,
            "E" => JobState::Exiting,
            "B" => JobState::Begun,
            "S" => JobState::Suspended,
            "U" => JobState::UserSuspended,
            "X" => JobState::Expired,
            "F" => JobState::Finished,
            "M" => JobState::Moved,
            other => JobState::Unknown(other.to_string()),
        }
    }
}

impl JobState {
    /// Single-letter code as printed by `qstat`
    pub fn code(&self) -> &str {
        match self {
            JobState::Queued => "Q",
            JobState::Running => "R",
            JobState::Held => "H",
            JobState::Waiting => "W",
            JobState::Transit => "T",
            JobState::Exiting => "E",
            JobState::Begun => "B",
            JobState::Suspended => "S",
            JobState::UserSuspended => "U",
            JobState::Expired => "X",
            JobState::Finished => "F",
            JobState::Moved => "M",
            JobState::Unknown(code) => code,
        }
    }

    /// Check if the job currently holds resources
    pub fn is_running(&self) -> bool {
        matches!(self, JobState::Running | JobState::Exiting | JobState::Begun)
    }

    /// Check if the job has left the scheduler's active set
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Expired | JobState::Moved)
    }
}

impl Serialize for JobState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// One node as seen by a single poll
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub poll_timestamp: NaiveDateTime,
    pub node_name: String,
    /// Full `pbsnodes` attribute object, stored verbatim
    pub attributes: Value,
}

/// One job as seen by a single poll (or by a live query)
#[derive(Debug, Clone, PartialEq)]
pub struct JobObservation {
    pub job_id: String,
    /// Owner without the `@host` suffix
    pub user: Option<String>,
    /// First execution host, without slot suffix
    pub machine: Option<String>,
    /// Start time in PBS date text, as reported
    pub start_time: String,
    /// Full `qstat` attribute object, stored verbatim
    pub attributes: Value,
    pub poll_timestamp: Option<NaiveDateTime>,
}

impl JobObservation {
    /// Start time parsed into a comparable value
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        parse_pbs_date(&self.start_time)
    }
}

/// Subset of `qstat -f -F json` job attributes that reports use
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QstatJob {
    #[serde(rename = "Job_Name")]
    pub job_name: Option<String>,
    #[serde(rename = "Job_Owner")]
    pub job_owner: Option<String>,
    pub job_state: Option<String>,
    pub queue: Option<String>,
    pub exec_host: Option<String>,
    pub stime: Option<String>,
    #[serde(rename = "Resource_List")]
    pub resource_list: BTreeMap<String, Value>,
    pub resources_used: BTreeMap<String, Value>,
    #[serde(rename = "Exit_status")]
    pub exit_status: Option<Value>,
    #[serde(rename = "Submit_arguments")]
    pub submit_arguments: Option<String>,
}

impl QstatJob {
    /// Decode the attribute blob; fields with unexpected types degrade to defaults
    pub fn from_attributes(attributes: &Value) -> Self {
        match serde_json::from_value(attributes.clone()) {
            Ok(job) => job,
            Err(e) => {
                tracing::debug!(error = %e, "job attributes do not match the qstat layout");
                Self::default()
            }
        }
    }
}

/// Resources requested at submission (`Resource_List`)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceRequest {
    pub cpus: Option<u32>,
    pub mem: Option<String>,
    /// Seconds
    pub walltime: Option<u64>,
}

/// Resources consumed so far (`resources_used`)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub cpus: Option<u32>,
    pub mem: Option<String>,
    /// Seconds
    pub walltime: Option<u64>,
    /// Seconds
    pub cpu_time: Option<u64>,
}

/// Fully populated job row for detail and live reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDetail {
    pub job_id: String,
    pub user: String,
    pub machine: String,
    pub start_time: String,
    pub queue: String,
    pub job_name: String,
    pub state: JobState,
    pub requested: ResourceRequest,
    pub used: ResourceUsage,
    pub exit_status: Option<i64>,
    pub submit_args: Option<String>,
}

/// Placeholder for values PBS did not report
pub const UNASSIGNED: &str = "-";

impl JobDetail {
    pub fn from_observation(obs: &JobObservation) -> Self {
        let job = QstatJob::from_attributes(&obs.attributes);
        let requested = ResourceRequest {
            cpus: job.resource_list.get("ncpus").and_then(value_u32),
            mem: job.resource_list.get("mem").and_then(value_text),
            walltime: job
                .resource_list
                .get("walltime")
                .and_then(value_text)
                .and_then(|w| parse_walltime(&w)),
        };
        let used = ResourceUsage {
            cpus: job.resources_used.get("ncpus").and_then(value_u32),
            mem: job.resources_used.get("mem").and_then(value_text),
            walltime: job
                .resources_used
                .get("walltime")
                .and_then(value_text)
                .and_then(|w| parse_walltime(&w)),
            cpu_time: job
                .resources_used
                .get("cput")
                .and_then(value_text)
                .and_then(|w| parse_walltime(&w)),
        };

        JobDetail {
            job_id: obs.job_id.clone(),
            user: obs.user.clone().unwrap_or_else(|| UNASSIGNED.to_string()),
            machine: obs.machine.clone().unwrap_or_else(|| UNASSIGNED.to_string()),
            start_time: obs.start_time.clone(),
            queue: job.queue.unwrap_or_else(|| UNASSIGNED.to_string()),
            job_name: job.job_name.unwrap_or_else(|| UNASSIGNED.to_string()),
            state: JobState::from(job.job_state.as_deref().unwrap_or("?")),
            requested,
            used,
            exit_status: job.exit_status.as_ref().and_then(value_i64),
            submit_args: job.submit_arguments,
        }
    }
}

/// PBS JSON emits numeric attributes either as numbers or as strings
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_u32(value: &Value) -> Option<u32> {
    value_i64(value).and_then(|n| u32::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation(attributes: Value) -> JobObservation {
        JobObservation {
            job_id: "4711.pbs01".to_string(),
            user: Some("alice".to_string()),
            machine: Some("node07".to_string()),
            start_time: "Wed Sep 25 14:30:45 2024".to_string(),
            attributes,
            poll_timestamp: None,
        }
    }

    #[test]
    fn test_job_state_from_str() {
        assert_eq!(JobState::from("R"), JobState::Running);
        assert_eq!(JobState::from("Q"), JobState::Queued);
        assert_eq!(JobState::from("F"), JobState::Finished);
        assert!(matches!(JobState::from("Z"), JobState::Unknown(_)));
        assert_eq!(JobState::from("Z").code(), "Z");
    }

    #[test]
    fn test_job_state_is_finished() {
        assert!(JobState::Finished.is_finished());
        assert!(JobState::Expired.is_finished());
        assert!(JobState::Moved.is_finished());
        assert!(!JobState::Running.is_finished());
        assert!(!JobState::Queued.is_finished());
        assert!(!JobState::Held.is_finished());
    }

    #[test]
    fn test_job_state_is_running() {
        assert!(JobState::Running.is_running());
        assert!(JobState::Exiting.is_running());
        assert!(!JobState::Queued.is_running());
    }

    #[test]
    fn test_job_detail_from_full_attributes() {
        let obs = observation(json!({
            "Job_Name": "train",
            "Job_Owner": "alice@login01",
            "job_state": "R",
            "queue": "workq",
            "exec_host": "node07/0*4",
            "stime": "Wed Sep 25 14:30:45 2024",
            "Resource_List": {"ncpus": 4, "mem": "16gb", "walltime": "10:30:15"},
            "resources_used": {"ncpus": 4, "mem": "3145728kb", "walltime": "01:00:00", "cput": "03:59:10"},
            "Exit_status": 0,
            "Submit_arguments": "-l select=1:ncpus=4 run.sh"
        }));

        let detail = JobDetail::from_observation(&obs);
        assert_eq!(detail.job_id, "4711.pbs01");
        assert_eq!(detail.user, "alice");
        assert_eq!(detail.machine, "node07");
        assert_eq!(detail.queue, "workq");
        assert_eq!(detail.job_name, "train");
        assert_eq!(detail.state, JobState::Running);
        assert_eq!(detail.requested.cpus, Some(4));
        assert_eq!(detail.requested.mem.as_deref(), Some("16gb"));
        assert_eq!(detail.requested.walltime, Some(37815));
        assert_eq!(detail.used.walltime, Some(3600));
        assert_eq!(detail.used.cpu_time, Some(3 * 3600 + 59 * 60 + 10));
        assert_eq!(detail.exit_status, Some(0));
        assert_eq!(detail.submit_args.as_deref(), Some("-l select=1:ncpus=4 run.sh"));
    }

    #[test]
    fn test_job_detail_from_sparse_attributes() {
        let mut obs = observation(json!({"job_state": "Q", "Resource_List": {"ncpus": "2"}}));
        obs.machine = None;

        let detail = JobDetail::from_observation(&obs);
        assert_eq!(detail.machine, UNASSIGNED);
        assert_eq!(detail.queue, UNASSIGNED);
        assert_eq!(detail.state, JobState::Queued);
        assert_eq!(detail.requested.cpus, Some(2));
        assert_eq!(detail.used, ResourceUsage::default());
        assert_eq!(detail.exit_status, None);
    }

    #[test]
    fn test_job_detail_survives_mistyped_attributes() {
        let obs = observation(json!({"queue": 17, "Resource_List": "oops"}));
        let detail = JobDetail::from_observation(&obs);
        assert_eq!(detail.queue, UNASSIGNED);
        assert_eq!(detail.requested, ResourceRequest::default());
    }

    #[test]
    fn test_job_detail_drops_oversized_durations() {
        let obs = observation(json!({
            "job_state": "R",
            "Resource_List": {"walltime": "9999999999999999999:00:00"},
            "resources_used": {"walltime": "999999999999999+00:00:00", "cput": "00:10:00"}
        }));
        let detail = JobDetail::from_observation(&obs);
        assert_eq!(detail.requested.walltime, None);
        assert_eq!(detail.used.walltime, None);
        assert_eq!(detail.used.cpu_time, Some(600));
    }

    #[test]
    fn test_job_state_serializes_as_code() {
        let json = serde_json::to_string(&JobState::Held).unwrap();
        assert_eq!(json, "\"H\"");
    }
}
