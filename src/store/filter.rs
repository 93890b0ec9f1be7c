// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Report filters and their compilation to parameter-bound SQL.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Value;

use crate::pbs::date::to_epoch;

/// Time range of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    /// Jobs started at or after `now - N days`
    LastDays(u32),
    /// Jobs started in `[from, to)`, both at local midnight
    Between { from: NaiveDate, to: NaiveDate },
    AllTime,
}

impl Default for Period {
    fn default() -> Self {
        Period::LastDays(7)
    }
}

impl Period {
    /// Start of the window for relative periods
    pub fn cutoff(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Period::LastDays(days) => now.checked_sub_days(Days::new(u64::from(*days))),
            Period::Between { from, .. } => Some(from.and_time(NaiveTime::MIN)),
            Period::AllTime => None,
        }
    }
}

/// User-facing job filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub user: Option<String>,
    pub machine: Option<String>,
    pub period: Period,
}

impl JobFilter {
    /// Compile against a fixed "now" into a WHERE clause with bound values.
    ///
    /// Rows lacking user or machine are never reported.
    pub fn predicate(&self, now: NaiveDateTime) -> Predicate {
        let mut predicate = Predicate::default();
        predicate.push("user IS NOT NULL AND machine IS NOT NULL", None);

        if let Some(user) = &self.user {
            predicate.push("user = ?", Some(Value::Text(user.clone())));
        }
        if let Some(machine) = &self.machine {
            predicate.push("machine = ?", Some(Value::Text(machine.clone())));
        }

        match &self.period {
            Period::LastDays(_) => match self.period.cutoff(now) {
                Some(cutoff) => {
                    predicate.push("start_epoch >= ?", Some(Value::Integer(to_epoch(cutoff))));
                }
                // Cutoff before the representable range: any parseable start qualifies
                None => predicate.push("start_epoch IS NOT NULL", None),
            },
            Period::Between { from, to } => {
                predicate.push(
                    "start_epoch >= ?",
                    Some(Value::Integer(to_epoch(from.and_time(NaiveTime::MIN)))),
                );
                predicate.push(
                    "start_epoch < ?",
                    Some(Value::Integer(to_epoch(to.and_time(NaiveTime::MIN)))),
                );
            }
            Period::AllTime => {}
        }

        predicate
    }
}

/// A conjunction of static SQL fragments and the values bound to their `?`s
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<&'static str>,
    params: Vec<Value>,
}

impl Predicate {
    fn push(&mut self, clause: &'static str, param: Option<Value>) {
        self.clauses.push(clause);
        self.params.extend(param);
    }

    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            "1=1".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}
