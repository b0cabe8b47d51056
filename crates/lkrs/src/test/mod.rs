// Test module organization

pub mod test_basic;
pub mod test_closures;
pub mod test_coroutine;
pub mod test_errors;
pub mod test_functions;
pub mod test_host_api;
pub mod test_metamethods;
pub mod test_operators;
pub mod test_tables;

use crate::{LkValue, LkVm, VmOptions};

pub(crate) fn new_vm() -> LkVm {
    let mut vm = LkVm::new(VmOptions::default());
    vm.open_libs();
    vm
}

pub(crate) fn run(src: &str) -> Result<Vec<LkValue>, String> {
    let mut vm = new_vm();
    vm.execute_string(src)
        .map_err(|e| vm.into_full_error(e).to_string())
}

/// Run a script that checks itself with `assert`.
pub(crate) fn assert_ok(src: &str) {
    if let Err(e) = run(src) {
        panic!("script failed: {}", e);
    }
}

/// Run a script and hand back what `print` wrote.
pub(crate) fn output_of(src: &str) -> String {
    let mut vm = new_vm();
    vm.capture_output();
    if let Err(e) = vm.execute_string(src) {
        panic!("script failed: {}", vm.into_full_error(e));
    }
    vm.take_output()
}
