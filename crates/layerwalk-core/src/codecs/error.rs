use thiserror::Error;

use crate::context::DecodeContext;
use crate::event::EventKind;

/// A read that would have gone past the end of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("header too short: need {needed} bytes, got {actual}")]
pub struct Truncated {
    pub needed: usize,
    pub actual: usize,
}

/// Why a header was rejected, in terms of the event it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct Violation {
    pub kind: EventKind,
    pub lengths: Option<(usize, usize)>,
}

impl Violation {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            lengths: None,
        }
    }

    pub fn with_lengths(kind: EventKind, expected: usize, actual: usize) -> Self {
        Self {
            kind,
            lengths: Some((expected, actual)),
        }
    }

    /// Adapter for `map_err` turning a short read into `kind`.
    pub fn truncated(kind: EventKind) -> impl FnOnce(Truncated) -> Self {
        move |err| Self::with_lengths(kind, err.needed, err.actual)
    }

    /// Emit the matching event and return the decoder failure value.
    pub fn report(self, ctx: &mut DecodeContext) -> bool {
        match self.lengths {
            Some((expected, actual)) => ctx.emit_lengths(self.kind, expected, actual),
            None => ctx.emit(self.kind),
        }
        false
    }
}
