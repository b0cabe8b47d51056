// Open-upvalue bookkeeping.
//
// Each thread maps absolute register slots to cell handles. The map is
// what makes sibling closures share one cell per captured local; closing
// copies the register value into the cell and drops the map entry, so a
// second close of the same slot is a no-op.

use crate::lk_value::{LkValue, UpvalueCell};
use crate::lk_vm::LkVm;
use crate::objects::{CellId, ThreadId};

/// Cell for an in-stack capture, shared if the slot already has one.
pub(crate) fn find_or_create_cell(vm: &mut LkVm, thread: ThreadId, slot: usize) -> CellId {
    if let Some(id) = vm.thread(thread).open_upvalues.get(&slot) {
        return *id;
    }
    let id = vm.pool.create_cell(UpvalueCell::Open { thread, slot });
    vm.thread_mut(thread).open_upvalues.insert(slot, id);
    id
}

/// Close every open cell rooted at `from_slot` or above: materialise the
/// register value into the cell and unregister it.
pub(crate) fn close_upvalues(vm: &mut LkVm, thread: ThreadId, from_slot: usize) {
    let slots: Vec<usize> = vm
        .thread(thread)
        .open_upvalues
        .keys()
        .copied()
        .filter(|s| *s >= from_slot)
        .collect();
    for slot in slots {
        if let Some(cell) = vm.thread_mut(thread).open_upvalues.remove(&slot) {
            let value = vm.thread(thread).stack[slot];
            *vm.pool.cell_mut(cell) = UpvalueCell::Closed(value);
        }
    }
}

#[inline]
pub(crate) fn read_cell(vm: &LkVm, id: CellId) -> LkValue {
    match vm.pool.cell(id) {
        UpvalueCell::Open { thread, slot } => vm.thread(thread).stack[slot],
        UpvalueCell::Closed(v) => v,
    }
}

#[inline]
pub(crate) fn write_cell(vm: &mut LkVm, id: CellId, value: LkValue) {
    match vm.pool.cell(id) {
        UpvalueCell::Open { thread, slot } => {
            vm.thread_mut(thread).stack[slot] = value;
        }
        UpvalueCell::Closed(_) => {
            *vm.pool.cell_mut(id) = UpvalueCell::Closed(value);
        }
    }
}
