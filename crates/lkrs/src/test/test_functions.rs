/// Calls, returns, varargs, methods and tail calls.
use super::assert_ok;

#[test]
fn multiple_return_values() {
    assert_ok(
        r#"
        fn three() { rt 1, 2, 3 }
        a, b, c = three()
        assert(a == 1 and b == 2 and c == 3)
        // truncated and padded
        x := three()
        assert(x == 1)
        p, q, r, s = three()
        assert(s == nil)
    "#,
    );
}

#[test]
fn callee_results_expand_in_tail_position() {
    assert_ok(
        r#"
        fn pair() { rt 'l', 'r' }
        fn wrap() { rt pair() }
        a, b = wrap()
        assert(a == 'l' and b == 'r')
        t := [pair()]
        assert(#t == 2)
        // non-tail position keeps only the first value
        u := [pair(), 'end']
        assert(#u == 2 and u[0] == 'l' and u[1] == 'end')
    "#,
    );
}

#[test]
fn vararg_functions() {
    assert_ok(
        r#"
        fn count(...) { t := {...} rt #t }
        assert(count() == 0)
        assert(count('a') == 1)
        assert(count(1, 2, 3) == 3)
        fn first(a, ...) { rt a }
        assert(first(9, 8, 7) == 9)
        fn spread(...) { rt ... }
        x, y = spread(4, 5)
        assert(x == 4 and y == 5)
    "#,
    );
}

#[test]
fn missing_arguments_become_nil() {
    assert_ok(
        r#"
        fn f(a, b) { rt b }
        assert(f(1) == nil)
        assert(f(1, 2) == 2)
        assert(f(1, 2, 3) == 2)
    "#,
    );
}

#[test]
fn method_call_equals_explicit_self() {
    assert_ok(
        r#"
        obj = { 'v': 10 }
        fn obj:m(x) { rt self.v + x }
        assert(obj:m(5) == obj.m(obj, 5))
        assert(obj:m(5) == 15)
    "#,
    );
}

#[test]
fn method_definition_with_dot_receiver() {
    assert_ok(
        r#"
        lib = {}
        fn lib.helper(x) { rt x * 2 }
        assert(lib.helper(21) == 42)
    "#,
    );
}

#[test]
fn arrow_body_functions() {
    assert_ok(
        r#"
        inc := fn(x) => x + 1
        assert(inc(1) == 2)
        fn twice(f, v) => f(f(v))
        assert(twice(inc, 0) == 2)
    "#,
    );
}

#[test]
fn tail_recursion_runs_deep() {
    assert_ok(
        r#"
        fn f(n) {
            if n == 0 { rt 0 }
            rt f(n - 1)
        }
        assert(f(100000) == 0)
    "#,
    );
}

#[test]
fn mutual_tail_recursion() {
    assert_ok(
        r#"
        fn even(n) {
            if n == 0 { rt true }
            rt odd(n - 1)
        }
        fn odd(n) {
            if n == 0 { rt false }
            rt even(n - 1)
        }
        assert(even(50000) == true)
        assert(odd(50001) == true)
    "#,
    );
}

#[test]
fn deep_non_tail_recursion_overflows_cleanly() {
    assert_ok(
        r#"
        fn g(n) {
            if n == 0 { rt 0 }
            rt 1 + g(n - 1)
        }
        ok, e = pcall(fn() => g(100000))
        assert(ok == false)
    "#,
    );
}

#[test]
fn call_through_table_fields() {
    assert_ok(
        r#"
        ops = {
            'add': fn(a, b) => a + b,
            'mul': fn(a, b) => a * b,
        }
        assert(ops.add(2, 3) == 5)
        assert(ops['mul'](2, 3) == 6)
    "#,
    );
}
