/// Protected calls, error values and diagnostics.
use super::{assert_ok, new_vm, run};

#[test]
fn pcall_returns_results_or_error() {
    assert_ok(
        r#"
        ok, a, b = pcall(fn() { rt 1, 2 })
        assert(ok == true and a == 1 and b == 2)
        ok2, e = pcall(fn() { error('boom') })
        assert(ok2 == false and e == 'boom')
        // pcall never propagates
        ok3 = pcall(error)
        assert(ok3 == false)
    "#,
    );
}

#[test]
fn error_values_keep_their_type() {
    assert_ok(
        r#"
        ok, e = pcall(fn() { error({ 'code': 42 }) })
        assert(ok == false)
        assert(e.code == 42)
        ok2, e2 = pcall(fn() { error(7) })
        assert(e2 == 7)
    "#,
    );
}

#[test]
fn runtime_errors_carry_position() {
    assert_ok(
        r#"
        ok, e = pcall(fn() { rt nil + 1 })
        assert(ok == false)
        assert(type(e) == 'str')
    "#,
    );
    // The rendered message leads with chunk:line.
    let err = run("x := nil\ny := x.field").unwrap_err();
    assert!(err.starts_with("chunk:2:"), "got: {}", err);
    assert!(err.contains("attempt to index"), "got: {}", err);
}

#[test]
fn syntax_errors_carry_position() {
    let err = run("x := 1\nif {").unwrap_err();
    assert!(err.starts_with("chunk:2:"), "got: {}", err);

    let mut vm = new_vm();
    let err = vm
        .execute_named("fn broken(", "script.lk")
        .map(|_| ())
        .unwrap_err();
    let msg = vm.into_full_error(err);
    assert!(msg.to_string().starts_with("script.lk:1:"), "got: {}", msg);
}

#[test]
fn nested_pcall_unwinds_to_nearest_boundary() {
    assert_ok(
        r#"
        trace = []
        ok_outer = pcall(fn() {
            trace[#trace] = 'outer-start'
            ok_inner, e = pcall(fn() { error('inner') })
            trace[#trace] = 'inner-caught'
            assert(ok_inner == false and e == 'inner')
            error('outer')
        })
        assert(ok_outer == false)
        assert(#trace == 2)
    "#,
    );
}

#[test]
fn calling_non_callable_raises() {
    assert_ok(
        r#"
        ok, e = pcall(fn() { x := nil x() })
        assert(ok == false)
        ok2, e2 = pcall(fn() { y := 5 y() })
        assert(ok2 == false)
    "#,
    );
}

#[test]
fn indexing_non_table_raises() {
    assert_ok(
        r#"
        ok, e = pcall(fn() { v := true rt v.k })
        assert(ok == false)
        ok2, e2 = pcall(fn() { v := nil v.k = 1 })
        assert(ok2 == false)
    "#,
    );
}

#[test]
fn comparing_mixed_types_raises() {
    assert_ok(
        r#"
        ok, e = pcall(fn() => 1 < 'x')
        assert(ok == false)
        ok2, e2 = pcall(fn() => {} <= {})
        assert(ok2 == false)
    "#,
    );
}

#[test]
fn assert_failures_are_catchable() {
    assert_ok(
        r#"
        ok, e = pcall(fn() { assert(false, 'custom message') })
        assert(ok == false and e == 'custom message')
        ok2, e2 = pcall(fn() { assert(nil) })
        assert(ok2 == false)
        // assert passes values through on success
        a, b = assert(1, 2)
        assert(a == 1 and b == 2)
    "#,
    );
}

#[test]
fn state_survives_a_caught_error() {
    assert_ok(
        r#"
        counter := 0
        fn risky(n) {
            counter += 1
            if n > 0 { error('nope') }
            rt 'fine'
        }
        ok1 = pcall(risky, 1)
        ok2, v = pcall(risky, 0)
        assert(ok1 == false)
        assert(ok2 == true and v == 'fine')
        assert(counter == 2)
    "#,
    );
}

#[test]
fn main_thread_error_reaches_the_host() {
    let err = run("fn f() { error('top level') }\nf()").unwrap_err();
    assert_eq!(err, "top level");
}
