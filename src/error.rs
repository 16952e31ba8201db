//! Error type shared by every device interface and binding.
//!
//! Queries that have no meaningful answer return an error (or `None` for pure
//! lookups) instead of a zero/false placeholder.

use std::panic::Location;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InputError>;

#[derive(Error, Debug)]
pub enum InputError {
    /// The concrete device does not implement this capability.
    ///
    /// Carries the source location where the refusal was raised.
    #[error("unsupported: {detail} ({file}:{line})")]
    Unsupported {
        detail: String,
        file: &'static str,
        line: u32,
    },

    /// State was queried before the binding received any data for it.
    #[error("{0} has not been initialized")]
    NotInitialized(&'static str),

    /// Key number not present in the active layout.
    #[error("key number {0:#06x} is not mapped in the active layout")]
    UnknownKey(u16),

    #[error("button {button} is out of range (device has {count} buttons)")]
    InvalidButton { button: u16, count: u16 },

    #[error("axis {axis} is out of range (device has {count} axes)")]
    InvalidAxis { axis: u16, count: u16 },

    /// A controller snapshot does not match the controller's layout.
    #[error(
        "snapshot has {axes} axes and {buttons} buttons, layout expects {expected_axes} and {expected_buttons}"
    )]
    SnapshotShape {
        axes: usize,
        buttons: usize,
        expected_axes: usize,
        expected_buttons: usize,
    },

    /// Inconsistent key layout (duplicate key number, scan code or NPK).
    #[error("invalid key layout: {0}")]
    Layout(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// An OS call failed; `code` is the platform error code when known.
    #[error("platform call {call} failed (code {code})")]
    Platform { call: &'static str, code: u32 },
}

impl InputError {
    /// Build an [`InputError::Unsupported`] tagged with the caller's location.
    #[track_caller]
    pub fn unsupported(detail: impl Into<String>) -> Self {
        let loc = Location::caller();
        InputError::Unsupported {
            detail: detail.into(),
            file: loc.file(),
            line: loc.line(),
        }
    }

    /// `true` for [`InputError::Unsupported`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, InputError::Unsupported { .. })
    }
}
