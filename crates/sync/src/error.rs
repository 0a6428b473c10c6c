// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Replay failure type.

use ts_core::{ErrorClass, RemoteError};

/// Why one replay attempt of a queue entry failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// The monitor did not read online when the attempt started.
    #[error("connectivity is not online")]
    Offline,

    #[error("no remote session available")]
    NoSession,

    /// A remote call outlived the request timeout.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The write landed but no version record came back.
    #[error("remote store did not create a version")]
    VersionMissing,
}

impl ReplayError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ReplayError::Timeout { .. } => ErrorClass::Network,
            ReplayError::Remote(e) => e.class(),
            ReplayError::Offline | ReplayError::NoSession | ReplayError::VersionMissing => {
                ErrorClass::Application
            }
        }
    }

    /// The rejection to report to the connectivity monitor, if this failure
    /// counts against connectivity.
    pub fn connectivity_failure(&self) -> Option<RemoteError> {
        if self.class() != ErrorClass::Network {
            return None;
        }
        match self {
            ReplayError::Remote(e) => Some(e.clone()),
            _ => Some(RemoteError::Timeout),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
