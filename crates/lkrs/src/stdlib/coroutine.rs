// Coroutine library: thin wrappers over the VM transfer primitives.
// Installed as the `coroutine` module and aliased into the globals, so
// scripts can use bare `create`/`resume`/`yield`.

use crate::lib_registry::LibraryModule;
use crate::lk_value::LkValue;
use crate::lk_vm::{LkResult, LkVm, ThreadStatus};
use crate::objects::ThreadId;

pub fn create_coroutine_lib() -> LibraryModule {
    crate::lib_module!("coroutine", {
        "create" => co_create,
        "resume" => co_resume,
        "yield" => co_yield,
        "status" => co_status,
        "running" => co_running,
        "isyieldable" => co_isyieldable,
        "wrap" => co_wrap,
    })
    .with_initializer(alias_into_globals)
}

fn alias_into_globals(vm: &mut LkVm) {
    for (name, func) in [
        ("create", co_create as crate::lk_value::HostFunction),
        ("resume", co_resume),
        ("yield", co_yield),
        ("status", co_status),
        ("isyieldable", co_isyieldable),
        ("wrap", co_wrap),
    ] {
        vm.register(name, func);
    }
}

/// create(f) - new thread in state `new`, `f` at its stack bottom.
fn co_create(vm: &mut LkVm) -> LkResult<usize> {
    let f = vm.check_callable(1)?;
    let co = vm.create_thread(f);
    vm.push(co);
    Ok(1)
}

/// resume(co, ...) - (true, results-or-yields...) or (false, error).
fn co_resume(vm: &mut LkVm) -> LkResult<usize> {
    let co = vm.check_thread(1)?;
    let args = vm.get_args();
    let rest = if args.len() > 1 {
        args[1..].to_vec()
    } else {
        Vec::new()
    };
    let (ok, results) = vm.resume_thread(co, rest)?;
    vm.push_bool(ok);
    let n = results.len();
    for r in results {
        vm.push(r);
    }
    Ok(1 + n)
}

/// yield(...) - suspend the running coroutine.
fn co_yield(vm: &mut LkVm) -> LkResult<usize> {
    let args = vm.get_args();
    Err(vm.yield_values(args))
}

/// status(co) - "new" | "ready" | "running" | "suspended" | "dead" |
/// "errored".
fn co_status(vm: &mut LkVm) -> LkResult<usize> {
    let co = vm.check_thread(1)?;
    let id = co.as_thread_id().unwrap();
    let status = if id == vm.current {
        ThreadStatus::Running
    } else {
        vm.thread_status(id)
    };
    vm.push_str(status.as_str());
    Ok(1)
}

/// running() - the current thread and whether it is the main one.
fn co_running(vm: &mut LkVm) -> LkResult<usize> {
    let id = vm.current;
    vm.push(LkValue::Thread(id));
    vm.push_bool(id == ThreadId::MAIN);
    Ok(2)
}

fn co_isyieldable(vm: &mut LkVm) -> LkResult<usize> {
    let yieldable = vm.is_yieldable();
    vm.push_bool(yieldable);
    Ok(1)
}

/// wrap(f) - a function that resumes the wrapped coroutine and either
/// returns the transferred values or re-raises the coroutine's error.
fn co_wrap(vm: &mut LkVm) -> LkResult<usize> {
    let f = vm.check_callable(1)?;
    let co = vm.create_thread(f);
    let wrapper = vm.create_host_closure(co_wrap_call, vec![co]);
    vm.push(wrapper);
    Ok(1)
}

fn co_wrap_call(vm: &mut LkVm) -> LkResult<usize> {
    let Some(co) = vm.host_upvalue(0) else {
        return Err(vm.rt_error("invalid wrapped coroutine"));
    };
    let args = vm.get_args();
    let (ok, results) = vm.resume_thread(co, args)?;
    if !ok {
        let err = results.into_iter().next().unwrap_or(LkValue::Nil);
        return Err(vm.host_error(err));
    }
    let n = results.len();
    for r in results {
        vm.push(r);
    }
    Ok(n)
}
