// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

/// Full-screen table for `pbsmon watch`.
pub mod live;
/// Plain-text tables for `pbsmon stats`.
pub mod text;

pub use live::{render_watch, WatchRows, WatchView};
pub use text::{render_detail, render_summary};
