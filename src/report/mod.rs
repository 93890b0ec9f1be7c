// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Reports over the job history or the live scheduler state.

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::store::{JobFilter, StoreError};

pub mod engine;

pub use engine::QueryEngine;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no job database is open")]
    NoStore,
}

/// What to report on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRequest {
    pub filter: JobFilter,
    /// Ask the scheduler instead of the database; the period is ignored
    pub live: bool,
}

/// Job counts per (user, machine)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub period_description: String,
    pub total_jobs: u64,
    pub rows: Vec<SummaryRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub user: String,
    pub machine: String,
    pub jobs: u64,
    pub last_run: Option<NaiveDateTime>,
}
