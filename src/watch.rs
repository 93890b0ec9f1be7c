// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Fixed-interval refresh loop with cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Granularity at which a waiting loop notices cancellation
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Shared stop flag, set from a signal handler or a key press
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancel on Ctrl-C (SIGINT).
    pub fn cancel_on_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || token.cancel())
    }
}

/// Runs `tick`, waits `interval`, repeats until cancelled or `tick` fails
pub struct RefreshLoop {
    interval: Duration,
    cancel: CancelToken,
}

impl RefreshLoop {
    pub fn new(interval: Duration, cancel: CancelToken) -> Self {
        Self { interval, cancel }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Loop with plain sleeps between ticks
    #[cfg(test)]
    pub fn run<E>(&self, tick: impl FnMut() -> Result<(), E>) -> Result<(), E> {
        self.run_with(tick, |slice| {
            std::thread::sleep(slice);
            Ok(())
        })
    }

    /// Loop with a custom wait, called repeatedly with slices of at most 100 ms.
    ///
    /// The terminal view waits by polling for key presses.
    pub fn run_with<E>(
        &self,
        mut tick: impl FnMut() -> Result<(), E>,
        mut wait: impl FnMut(Duration) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut ticks: u64 = 0;
        while !self.cancel.is_cancelled() {
            tick()?;
            ticks += 1;

            let mut waited = Duration::ZERO;
            while waited < self.interval && !self.cancel.is_cancelled() {
                let slice = WAIT_SLICE.min(self.interval - waited);
                wait(slice)?;
                waited += slice;
            }
        }
        tracing::debug!(ticks, "refresh loop stopped");
        Ok(())
    }
}
