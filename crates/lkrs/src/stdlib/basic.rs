// Basic library: printing, type inspection, assertions, protected
// calls, iteration and the `new` instantiation helper behind `class`.

use std::io::Write;

use crate::lib_registry::LibraryModule;
use crate::lk_value::LkValue;
use crate::lk_vm::execute::helper::tostring_value;
use crate::lk_vm::execute::table_ops::value_len;
use crate::lk_vm::execute;
use crate::lk_vm::{LkResult, LkVm, MULTRET};

pub fn create_basic_lib() -> LibraryModule {
    crate::lib_module!("_G", {
        "print" => lk_print,
        "type" => lk_type,
        "str" => lk_str,
        "assert" => lk_assert,
        "error" => lk_error,
        "pcall" => lk_pcall,
        "iter" => lk_iter,
        "next" => lk_next,
        "new" => lk_new,
        "len" => lk_len,
        "getmeta" => lk_getmeta,
        "setmeta" => lk_setmeta,
    })
}

/// print(...) - tab-separated values and a newline.
fn lk_print(vm: &mut LkVm) -> LkResult<usize> {
    let args = vm.get_args();
    let mut line = String::new();
    for (i, v) in args.iter().enumerate() {
        if i > 0 {
            line.push('\t');
        }
        line.push_str(&tostring_value(vm, *v)?);
    }
    line.push('\n');
    match &mut vm.print_sink {
        Some(buf) => buf.extend_from_slice(line.as_bytes()),
        None => {
            let _ = std::io::stdout().write_all(line.as_bytes());
        }
    }
    Ok(0)
}

/// type(v) - the value's type name.
fn lk_type(vm: &mut LkVm) -> LkResult<usize> {
    let v = vm
        .get_arg(1)
        .ok_or_else(|| vm.rt_error("bad argument #1 (value expected)"))?;
    vm.push_str(v.type_name());
    Ok(1)
}

/// str(v) - value rendered as a string (`__str` honoured).
fn lk_str(vm: &mut LkVm) -> LkResult<usize> {
    let v = vm.get_arg(1).unwrap_or(LkValue::Nil);
    let s = tostring_value(vm, v)?;
    vm.push_str(&s);
    Ok(1)
}

/// assert(v, [msg]) - raise when `v` is falsy, pass everything through
/// otherwise.
fn lk_assert(vm: &mut LkVm) -> LkResult<usize> {
    let args = vm.get_args();
    let Some(first) = args.first() else {
        return Err(vm.rt_error("bad argument #1 (value expected)"));
    };
    if first.is_falsy() {
        return match args.get(1) {
            Some(msg) => Err(vm.host_error(*msg)),
            None => Err(vm.rt_error("assertion failed!")),
        };
    }
    for v in &args {
        vm.push(*v);
    }
    Ok(args.len())
}

/// error(v) - raise `v` as the error value, verbatim.
fn lk_error(vm: &mut LkVm) -> LkResult<usize> {
    let v = vm.get_arg(1).unwrap_or(LkValue::Nil);
    Err(vm.host_error(v))
}

/// pcall(f, ...) - (true, results...) or (false, error value).
fn lk_pcall(vm: &mut LkVm) -> LkResult<usize> {
    let f = vm
        .get_arg(1)
        .ok_or_else(|| vm.rt_error("bad argument #1 (value expected)"))?;
    let args = vm.get_args();
    let rest = if args.len() > 1 { &args[1..] } else { &[] };
    let (ok, results) = execute::pcall_value(vm, f, rest, MULTRET);
    vm.push_bool(ok);
    let n = results.len();
    for r in results {
        vm.push(r);
    }
    Ok(1 + n)
}

/// The stateless iterator behind `iter(t)`: next(t, k) -> k', v'.
fn lk_next(vm: &mut LkVm) -> LkResult<usize> {
    let t = vm.get_arg(1).unwrap_or(LkValue::Nil);
    if !t.is_table() {
        let msg = format!("cannot iterate a {} value", t.type_name());
        return Err(vm.rt_error(msg));
    }
    let k = vm.get_arg(2).unwrap_or(LkValue::Nil);
    match vm.next_entry(t, k) {
        Some((k, v)) => {
            vm.push(k);
            vm.push(v);
            Ok(2)
        }
        None => {
            vm.push_nil();
            Ok(1)
        }
    }
}

/// iter(x, ...) - iterator triple for the generic `for`. Tables yield
/// `(next, t, nil)`; callables pass through untouched, so an explicit
/// iterator (or a wrapped one) works unchanged.
fn lk_iter(vm: &mut LkVm) -> LkResult<usize> {
    let first = vm.get_arg(1).unwrap_or(LkValue::Nil);
    if first.is_table() {
        vm.push(LkValue::HostFn(lk_next));
        vm.push(first);
        vm.push_nil();
        return Ok(3);
    }
    if first.is_callable() {
        let args = vm.get_args();
        let n = args.len();
        for v in args {
            vm.push(v);
        }
        return Ok(n);
    }
    let msg = format!("cannot iterate a {} value", first.type_name());
    Err(vm.rt_error(msg))
}

/// new(cls) - fresh instance with `cls` as metatable; `cls.__index`
/// defaults to `cls` so methods resolve.
fn lk_new(vm: &mut LkVm) -> LkResult<usize> {
    let cls = vm.check_table(1)?;
    let index_key = LkValue::Str(vm.names.index);
    if vm.pool.table(cls).raw_get(&index_key).is_nil() {
        let _ = vm
            .pool
            .table_mut(cls)
            .raw_set(index_key, LkValue::Table(cls));
    }
    let instance = vm.create_table(0, 4);
    let id = instance.as_table_id().unwrap();
    vm.pool.table_mut(id).set_metatable(Some(cls));
    vm.push(instance);
    Ok(1)
}

/// len(v) - same as the `#` operator.
fn lk_len(vm: &mut LkVm) -> LkResult<usize> {
    let v = vm.get_arg(1).unwrap_or(LkValue::Nil);
    let r = value_len(vm, v)?;
    vm.push(r);
    Ok(1)
}

/// getmeta(t) - the metatable, or nil.
fn lk_getmeta(vm: &mut LkVm) -> LkResult<usize> {
    let t = vm.check_table(1)?;
    match vm.pool.table(t).metatable() {
        Some(mt) => vm.push(LkValue::Table(mt)),
        None => vm.push_nil(),
    }
    Ok(1)
}

/// setmeta(t, mt|nil) - install or clear a metatable, returning `t`.
fn lk_setmeta(vm: &mut LkVm) -> LkResult<usize> {
    let t = vm.check_table(1)?;
    let mt = match vm.get_arg(2).unwrap_or(LkValue::Nil) {
        LkValue::Nil => None,
        LkValue::Table(id) => Some(id),
        got => {
            let msg = format!("bad argument #2 (map or nil expected, got {})", got.type_name());
            return Err(vm.rt_error(msg));
        }
    };
    vm.pool.table_mut(t).set_metatable(mt);
    vm.push(LkValue::Table(t));
    Ok(1)
}
