//! Load state machine for gallery images.

use std::sync::Arc;

use crate::domain::entities::ImageId;
use crate::domain::errors::LoadError;

/// Load state of an image's full-resolution source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    /// No fetch has been issued, or the record was invalidated.
    #[default]
    NotLoaded,
    /// A fetch is in flight.
    Loading,
    /// The fetch was suspended because the image left the load window.
    Paused,
    /// The source image is decoded and held in memory.
    Ready,
    /// The last fetch failed.
    Failed,
}

impl LoadState {
    /// Returns true if the source image is available.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if a fetch is in flight.
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns true if the last fetch failed.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true if the presentation should show a busy indicator.
    #[must_use]
    pub const fn shows_activity(self) -> bool {
        matches!(self, Self::Loading | Self::Paused)
    }

    /// Computes the state reached by applying `input`, or `None` when the
    /// input does not apply to this state.
    ///
    /// Completion inputs are accepted only from `Loading`; generation checks
    /// are the caller's responsibility.
    #[must_use]
    pub fn next(self, input: &LoadInput) -> Option<Self> {
        match (self, input) {
            (Self::NotLoaded | Self::Paused | Self::Failed, LoadInput::Start)
            | (Self::Paused, LoadInput::Resume) => Some(Self::Loading),
            (Self::Loading, LoadInput::Pause)
            | (Self::Loading | Self::Ready, LoadInput::Purge { .. }) => Some(Self::Paused),
            (Self::Loading | Self::Paused | Self::Ready | Self::Failed, LoadInput::Cancel) => {
                Some(Self::NotLoaded)
            }
            (Self::Loading, LoadInput::Succeeded { .. }) => Some(Self::Ready),
            (Self::Loading, LoadInput::Failed { .. }) => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "not-loaded"),
            Self::Loading => write!(f, "loading"),
            Self::Paused => write!(f, "paused"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Input driving a record's state machine.
///
/// Pause, purge and cancel are distinct inputs: pause suspends a transfer,
/// purge removes the record from the load window, cancel resets it.
#[derive(Debug, Clone)]
pub enum LoadInput {
    /// Issue a fetch unless one is in flight or the source is ready.
    Start,
    /// Suspend an in-flight fetch.
    Pause,
    /// Restart a paused fetch.
    Resume,
    /// Leave the load window.
    Purge {
        /// Drop the decoded source image to reclaim memory.
        release_source: bool,
    },
    /// Abort and discard everything except the thumbnail.
    Cancel,
    /// A fetch finished with a decoded image.
    Succeeded {
        /// Generation the fetch was issued under.
        generation: u64,
        /// Decoded source image.
        image: Arc<image::DynamicImage>,
    },
    /// A fetch finished with an error.
    Failed {
        /// Generation the fetch was issued under.
        generation: u64,
        /// Failure cause.
        error: LoadError,
    },
}

impl LoadInput {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Purge { .. } => "purge",
            Self::Cancel => "cancel",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }

    /// Generation carried by completion inputs.
    #[must_use]
    pub fn completion_generation(&self) -> Option<u64> {
        match self {
            Self::Succeeded { generation, .. } | Self::Failed { generation, .. } => {
                Some(*generation)
            }
            _ => None,
        }
    }
}

/// A state transition applied to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// Identity of the record.
    pub identity: ImageId,
    /// State before the transition.
    pub old: LoadState,
    /// State after the transition.
    pub new: LoadState,
    /// Record generation after the transition.
    pub generation: u64,
}
