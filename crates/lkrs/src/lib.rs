// LK Runtime
// A compact LK VM with a bytecode compiler and cooperative coroutines.

#[cfg(test)]
mod test;

pub mod compiler;
pub mod lib_registry;
pub mod lk_value;
pub mod lk_vm;
pub mod objects;
pub mod stdlib;

pub use compiler::{compile, parse};
pub use lib_registry::{LibraryModule, LibraryRegistry};
pub use lk_value::{HostFunction, LkClosure, LkTable, LkType, LkValue, Proto};
pub use lk_vm::{
    Instruction, LkError, LkFullError, LkResult, LkStatus, LkVm, OpCode, ThreadStatus, VmOptions,
};

/// Run a source chunk on a fresh VM with the baseline libraries loaded.
pub fn execute(source: &str) -> Result<Vec<LkValue>, LkFullError> {
    let mut vm = LkVm::new(VmOptions::default());
    vm.open_libs();
    vm.execute_string(source)
        .map_err(|e| vm.into_full_error(e))
}
