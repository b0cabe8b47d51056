/// The stack-oriented host API: indices, coercions, load/call,
/// registration and argument checking.
use super::{assert_ok, new_vm};
use crate::lk_vm::REGISTRY_INDEX;
use crate::{LkResult, LkStatus, LkType, LkValue, LkVm};

#[test]
fn push_pop_and_indices() {
    let mut vm = new_vm();
    vm.push_int(1);
    vm.push_str("two");
    vm.push_bool(true);
    assert_eq!(vm.get_top(), 3);

    assert_eq!(vm.value_at(1), LkValue::Int(1));
    assert_eq!(vm.value_at(-1), LkValue::Bool(true));
    assert_eq!(vm.value_at(-3), LkValue::Int(1));
    assert_eq!(vm.to_str(2).as_deref(), Some("two"));
    // out of range reads nil
    assert!(vm.value_at(9).is_nil());

    vm.pop(2);
    assert_eq!(vm.get_top(), 1);
    vm.set_top(3);
    assert_eq!(vm.get_top(), 3);
    assert!(vm.value_at(3).is_nil());
    vm.set_top(0);
}

#[test]
fn registry_pseudo_index() {
    let mut vm = new_vm();
    let reg = vm.value_at(REGISTRY_INDEX);
    assert_eq!(reg.type_of(), LkType::Table);
    // main thread and globals sit under the fixed integer slots
    let main = vm.get_index(REGISTRY_INDEX, 1).unwrap();
    assert_eq!(main.type_of(), LkType::Thread);
    let globals = vm.get_index(REGISTRY_INDEX, 2).unwrap();
    assert_eq!(globals.type_of(), LkType::Table);
    let loaded = vm.get_field(REGISTRY_INDEX, "_LOADED").unwrap();
    assert_eq!(loaded.type_of(), LkType::Table);
}

#[test]
fn insert_remove_rotate_copy() {
    let mut vm = new_vm();
    for i in 1..=4 {
        vm.push_int(i);
    }
    // [1 2 3 4] -> insert top at index 1 -> [4 1 2 3]
    vm.insert(1);
    assert_eq!(vm.value_at(1), LkValue::Int(4));
    assert_eq!(vm.value_at(4), LkValue::Int(3));
    // remove index 1 -> [1 2 3]
    vm.remove(1);
    assert_eq!(vm.value_at(1), LkValue::Int(1));
    assert_eq!(vm.get_top(), 3);
    // rotate by one -> [3 1 2]
    vm.rotate(1, 1);
    assert_eq!(vm.value_at(1), LkValue::Int(3));
    // copy top onto slot 1 -> [2 1 2]
    vm.copy(-1, 1);
    assert_eq!(vm.value_at(1), LkValue::Int(2));
    vm.set_top(0);
}

#[test]
fn coercions_with_ok_flags() {
    let mut vm = new_vm();
    vm.push_int(42);
    vm.push_float(2.5);
    vm.push_str("16");
    vm.push_str("nope");
    vm.push_nil();

    assert_eq!(vm.to_integer(1), Some(42));
    assert_eq!(vm.to_float(1), Some(42.0));
    assert_eq!(vm.to_integer(2), None);
    assert_eq!(vm.to_float(2), Some(2.5));
    assert_eq!(vm.to_integer(3), Some(16));
    assert_eq!(vm.to_integer(4), None);
    assert_eq!(vm.to_str(4).as_deref(), Some("nope"));
    assert_eq!(vm.to_integer(5), None);
    assert!(!vm.to_bool(5));
    assert!(vm.to_bool(1));
    // numbers render as strings, tables do not
    assert_eq!(vm.to_str(1).as_deref(), Some("42"));
    vm.set_top(0);
}

#[test]
fn load_and_call() {
    let mut vm = new_vm();
    let chunk = vm.load("rt 2 + 3", "=test").unwrap();
    vm.push(chunk);
    vm.call(0, 1).unwrap();
    assert_eq!(vm.value_at(-1), LkValue::Int(5));
    vm.pop(1);

    // call with arguments through the stack
    let f = vm.load("a, b = ... rt a * b", "=mul").unwrap();
    vm.push(f);
    vm.push_int(6);
    vm.push_int(7);
    vm.call(2, 1).unwrap();
    assert_eq!(vm.value_at(-1), LkValue::Int(42));
    vm.pop(1);
}

#[test]
fn binary_chunks_are_rejected() {
    let mut vm = new_vm();
    let err = vm.load("\u{1b}LK0\u{1}junk", "=bin").map(|_| ()).unwrap_err();
    assert_eq!(LkStatus::from_error(err), LkStatus::ErrSyntax);
}

#[test]
fn protected_api_call_reports_status() {
    let mut vm = new_vm();
    let bad = vm.load("error('api-level')", "=bad").unwrap();
    vm.push(bad);
    let status = vm.pcall(0, 0);
    assert_eq!(status, LkStatus::ErrRun);
    // error value pushed for inspection
    assert_eq!(vm.to_str(-1).as_deref(), Some("api-level"));
    vm.pop(1);
    assert_eq!(vm.get_top(), 0);

    let good = vm.load("rt 'fine'", "=good").unwrap();
    vm.push(good);
    assert!(vm.pcall(0, 1).is_ok());
    assert_eq!(vm.to_str(-1).as_deref(), Some("fine"));
    vm.pop(1);
}

fn host_double(vm: &mut LkVm) -> LkResult<usize> {
    let n = vm.check_int(1)?;
    vm.push_int(n * 2);
    Ok(1)
}

fn host_sum(vm: &mut LkVm) -> LkResult<usize> {
    let mut total = 0.0;
    for i in 1..=vm.arg_count() {
        total += vm.check_number(i)?;
    }
    vm.push_float(total);
    Ok(1)
}

#[test]
fn registered_functions_are_callable_from_scripts() {
    let mut vm = new_vm();
    vm.register("double", host_double);
    vm.register("sum", host_sum);
    vm.execute_string(
        r#"
        assert(double(21) == 42)
        assert(double('4') == 8)
        assert(sum(1, 2, 3.5) == 6.5)
    "#,
    )
    .unwrap();
}

#[test]
fn check_helpers_format_bad_argument_errors() {
    let mut vm = new_vm();
    vm.register("double", host_double);
    vm.execute_string(
        r#"
        ok, e = pcall(fn() => double({}))
        assert(ok == false)
    "#,
    )
    .unwrap();
    vm.capture_output();
    vm.execute_string("ok, e = pcall(fn() => double({})) print(e)")
        .unwrap();
    let out = vm.take_output();
    assert!(
        out.contains("bad argument #1 (integer expected, got map)"),
        "got: {}",
        out
    );
}

fn host_counter(vm: &mut LkVm) -> LkResult<usize> {
    let n = vm.host_upvalue(0).and_then(|v| v.as_integer()).unwrap_or(0);
    vm.set_host_upvalue(0, LkValue::Int(n + 1));
    vm.push_int(n + 1);
    Ok(1)
}

#[test]
fn host_closures_carry_upvalues() {
    let mut vm = new_vm();
    let f = vm.create_host_closure(host_counter, vec![LkValue::Int(0)]);
    vm.set_global("tick", f);
    vm.execute_string(
        r#"
        assert(tick() == 1)
        assert(tick() == 2)
        assert(tick() == 3)
    "#,
    )
    .unwrap();
}

#[test]
fn globals_table_is_reachable() {
    let mut vm = new_vm();
    vm.push_global_table();
    vm.set_field(-1, "answer", LkValue::Int(42)).unwrap();
    vm.pop(1);
    vm.execute_string("assert(answer == 42) assert(_G.answer == 42)")
        .unwrap();
    assert_eq!(vm.get_global("answer"), LkValue::Int(42));
}

#[test]
fn raw_table_access_skips_metamethods() {
    assert_ok(
        r#"
        t = setmeta({}, { '__index': fn(t, k) => 'meta' })
        assert(t.missing == 'meta')
    "#,
    );
    let mut vm = new_vm();
    vm.execute_string("t = setmeta({}, { '__index': fn(t, k) => 'meta' })")
        .unwrap();
    let t = vm.get_global("t");
    let key = vm.new_string("missing");
    assert!(vm.raw_get(t, key).is_nil());
    let field = vm.get_field(-1, "x"); // bogus index: nil target errors
    assert!(field.is_err());
}
