use serde::{Deserialize, Serialize};

use crate::bus::CycleKind;

/// How the next instruction has to be fetched once a handler is done.
///
/// Every handler reports one of these and the step loop acts on it after the
/// instruction completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchKind {
    /// The next opcode follows the previous code fetch.
    Sequential,

    /// The bus was used for data in between, the code fetch restarts.
    NonSequential,

    /// PC was written: refill the whole prefetch from the new address.
    Branch,

    /// The handler already refilled the prefetch (exception entry).
    None,
}

impl FetchKind {
    /// Cycle kind of the single refill fetch, `None` when no fetch is due.
    #[must_use]
    pub const fn cycle_kind(self) -> Option<CycleKind> {
        match self {
            Self::Sequential => Some(CycleKind::Sequential),
            Self::NonSequential | Self::Branch => Some(CycleKind::NonSequential),
            Self::None => None,
        }
    }
}
