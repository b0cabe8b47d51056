/// Closures, upvalue sharing and open-upvalue lifetime.
use super::assert_ok;

#[test]
fn sibling_closures_share_a_cell() {
    assert_ok(
        r#"
        fn make() {
            x := 0
            rt fn() { x += 1 rt x }, fn() { rt x }
        }
        a, b = make()
        a() a()
        assert(b() == 2)
    "#,
    );
}

#[test]
fn each_call_gets_fresh_cells() {
    assert_ok(
        r#"
        fn make() { n := 0 rt fn() { n += 1 rt n } }
        c1 = make()
        c2 = make()
        assert(c1() == 1)
        assert(c1() == 2)
        assert(c2() == 1)
    "#,
    );
}

#[test]
fn getter_setter_pair() {
    assert_ok(
        r#"
        fn box() {
            v := 10
            rt fn() { rt v }, fn(nv) { v = nv }
        }
        get, set = box()
        assert(get() == 10)
        set(20)
        assert(get() == 20)
    "#,
    );
}

#[test]
fn nested_capture_through_levels() {
    assert_ok(
        r#"
        fn outer(x) {
            rt fn(y) {
                rt fn(z) { rt x + y + z }
            }
        }
        assert(outer(1)(2)(3) == 6)
        f1 = outer(10)
        f2 = f1(20)
        assert(f2(30) == 60)
    "#,
    );
}

#[test]
fn loop_variable_captured_per_iteration() {
    assert_ok(
        r#"
        fns := []
        for i = 0, 2 {
            fns[#fns] = fn() => i
        }
        assert(fns[0]() == 0)
        assert(fns[1]() == 1)
        assert(fns[2]() == 2)
    "#,
    );
}

#[test]
fn redeclared_local_captured_per_iteration() {
    assert_ok(
        r#"
        fns := []
        i := 0
        while i < 3 {
            k := i
            fns[#fns] = fn() => k
            i += 1
        }
        assert(fns[0]() == 0)
        assert(fns[1]() == 1)
        assert(fns[2]() == 2)
    "#,
    );
}

#[test]
fn shared_outer_local_sees_final_value() {
    assert_ok(
        r#"
        shared := 0
        fns := []
        i := 0
        while i < 3 {
            fns[#fns] = fn() => shared
            shared += 1
            i += 1
        }
        // one shared slot, not per-iteration copies
        assert(fns[0]() == 3)
        assert(fns[1]() == 3)
    "#,
    );
}

#[test]
fn local_function_can_recurse() {
    assert_ok(
        r#"
        shy fn fact(n) {
            if n <= 1 { rt 1 }
            rt n * fact(n - 1)
        }
        assert(fact(6) == 720)
    "#,
    );
}

#[test]
fn break_closes_captured_locals() {
    assert_ok(
        r#"
        f := nil
        i := 0
        while true {
            v := i * 10
            f = fn() => v
            if i == 2 { break }
            i += 1
        }
        assert(f() == 20)
    "#,
    );
}

#[test]
fn upvalue_assignment_from_inner_function() {
    assert_ok(
        r#"
        total := 0
        fn add(n) { total += n }
        add(3) add(4)
        assert(total == 7)
    "#,
    );
}
