// Closures and upvalue cells.
//
// A closure pairs a body (compiled proto or host function) with the cells
// it captured. Cells are pool objects shared by identity: closing one is
// visible through every closure that holds it.

use std::rc::Rc;

use super::proto::Proto;
use super::value::{HostFunction, LkValue};
use crate::objects::{CellId, ThreadId};

pub enum LkClosure {
    Script {
        proto: Rc<Proto>,
        upvalues: Vec<CellId>,
    },
    /// A host function bound with upvalues (plain host functions without
    /// upvalues travel as `LkValue::HostFn` and never reach the pool).
    Host {
        func: HostFunction,
        upvalues: Vec<CellId>,
    },
}

impl LkClosure {
    #[inline(always)]
    pub fn upvalues(&self) -> &[CellId] {
        match self {
            LkClosure::Script { upvalues, .. } => upvalues,
            LkClosure::Host { upvalues, .. } => upvalues,
        }
    }

    #[inline(always)]
    pub fn proto(&self) -> Option<&Rc<Proto>> {
        match self {
            LkClosure::Script { proto, .. } => Some(proto),
            LkClosure::Host { .. } => None,
        }
    }

    #[inline(always)]
    pub fn is_host(&self) -> bool {
        matches!(self, LkClosure::Host { .. })
    }
}

/// An upvalue cell: open while its variable still lives in a frame
/// register, closed (owning the value) afterwards.
#[derive(Debug, Clone, Copy)]
pub enum UpvalueCell {
    Open { thread: ThreadId, slot: usize },
    Closed(LkValue),
}
