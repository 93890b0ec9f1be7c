// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! PBS integration: command invocation, payload parsing and the record
//! types shared by the collector, the store and the reports.

pub mod cli;
pub mod date;
pub mod parser;
pub mod types;
pub mod walltime;

pub use cli::{CommandError, CommandRunner, PbsCli, SchedulerCommand, SystemRunner};
pub use parser::PayloadError;
pub use types::{JobDetail, JobObservation, JobState, NodeSnapshot};
