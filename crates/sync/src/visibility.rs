// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Page visibility signal.
//!
//! The host forwards visibility changes here; the monitor's periodic probe and
//! the manager's background retry timer pause while the page is hidden.

use tokio::sync::watch;

/// Shared visibility flag. Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct PageVisibility {
    tx: watch::Sender<bool>,
}

impl PageVisibility {
    pub fn new(visible: bool) -> Self {
        let (tx, _) = watch::channel(visible);
        PageVisibility { tx }
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records a visibility change. Repeating the current value is a no-op.
    pub fn set_visible(&self, visible: bool) {
        self.tx.send_if_modified(|current| {
            if *current == visible {
                return false;
            }
            *current = visible;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for PageVisibility {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Waits until the page is visible. Returns `false` if the signal is gone.
pub(crate) async fn wait_until_visible(rx: &mut watch::Receiver<bool>) -> bool {
    rx.wait_for(|visible| *visible).await.is_ok()
}

#[cfg(test)]
#[path = "visibility_tests.rs"]
mod tests;
