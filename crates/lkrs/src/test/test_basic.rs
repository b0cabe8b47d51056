/// End-to-end scenarios and the core statement forms.
use super::{assert_ok, output_of, run};
use crate::LkValue;

#[test]
fn print_addition() {
    assert_eq!(output_of("print(1+2)"), "3\n");
}

#[test]
fn numeric_for_accumulates() {
    assert_eq!(output_of("a := 0 for i = 0, 4 { a += i } print(a)"), "10\n");
}

#[test]
fn generic_for_over_map() {
    assert_eq!(
        output_of("t = {'x': 1, 'y': 2} s = 0 for k, v in t { s += v } print(s)"),
        "3\n"
    );
}

#[test]
fn varargs_collected_into_array() {
    assert_eq!(
        output_of("fn f(a, ...) { s := 0 for _, v in {...} { s += v } rt a + s } print(f(1,2,3,4))"),
        "10\n"
    );
}

#[test]
fn class_with_add_metamethod() {
    let src = r#"
        class V { 'x': 0 }
        fn V:__add(o) { r := new(V) r.x = self.x + o.x rt r }
        a = new(V) a.x = 3
        b = new(V) b.x = 4
        c = a + b
        print(c.x)
    "#;
    assert_eq!(output_of(src), "7\n");
}

#[test]
fn counter_closure() {
    assert_eq!(
        output_of("fn mk() { n := 0 rt fn() { n += 1 rt n } } f = mk() print(f()) print(f()) print(f())"),
        "1\n2\n3\n"
    );
}

#[test]
fn chunk_returns_values() {
    assert_eq!(run("rt 1 + 2").unwrap(), vec![LkValue::Int(3)]);
    assert_eq!(
        run("rt 1, 'two'").unwrap().len(),
        2
    );
    assert_eq!(run("x := 5").unwrap(), Vec::<LkValue>::new());
}

#[test]
fn truthiness_selects_branches() {
    assert_ok(
        r#"
        fn pick(v) { if v { rt 'a' } else { rt 'b' } }
        assert(pick(nil) == 'b')
        assert(pick(false) == 'b')
        assert(pick(true) == 'a')
        assert(pick(0) == 'a')
        assert(pick('') == 'a')
        assert(pick({}) == 'a')
    "#,
    );
}

#[test]
fn while_loop_and_break() {
    assert_ok(
        r#"
        i := 0
        while true {
            i += 1
            if i == 5 { break }
        }
        assert(i == 5)
    "#,
    );
}

#[test]
fn elif_chain() {
    assert_ok(
        r#"
        fn grade(n) {
            if n >= 90 { rt 'a' }
            elif n >= 80 { rt 'b' }
            elif n >= 70 { rt 'c' }
            else { rt 'f' }
        }
        assert(grade(95) == 'a')
        assert(grade(85) == 'b')
        assert(grade(72) == 'c')
        assert(grade(10) == 'f')
    "#,
    );
}

#[test]
fn numeric_for_with_step() {
    assert_ok(
        r#"
        s := 0
        for i = 0, 10, 2 { s += i }
        assert(s == 30)
        d := 0
        for i = 5, 1, -1 { d += i }
        assert(d == 15)
        n := 0
        for i = 0, -1 { n += 1 }
        assert(n == 0)
    "#,
    );
}

#[test]
fn local_scoping_shadows() {
    assert_ok(
        r#"
        x := 1
        if true {
            x := 2
            assert(x == 2)
        }
        assert(x == 1)
        shy y = 3
        y := 4
        assert(y == 4)
    "#,
    );
}

#[test]
fn multiple_assignment() {
    assert_ok(
        r#"
        a, b := 1, 2
        assert(a == 1 and b == 2)
        a, b = b, a
        assert(a == 2 and b == 1)
        fn two() { rt 10, 20 }
        c, d, e = two()
        assert(c == 10 and d == 20 and e == nil)
    "#,
    );
}

#[test]
fn compound_assignment_and_increments() {
    assert_ok(
        r#"
        x := 10
        x += 5   assert(x == 15)
        x -= 3   assert(x == 12)
        x *= 2   assert(x == 24)
        x %= 7   assert(x == 3)
        x ^= 2   assert(x == 9.0)
        x = 4
        x /= 2   assert(x == 2.0)
        i := 0
        i++      assert(i == 1)
        i--      assert(i == 0)
        y := nil
        y ??= 'fallback'
        assert(y == 'fallback')
        y ??= 'other'
        assert(y == 'fallback')
    "#,
    );
}

#[test]
fn strings_and_escapes() {
    assert_ok(
        r#"
        assert('a' + 'b' == 'ab')
        assert(#'hello' == 5)
        assert('tab\there' != 'tabhere')
        assert(`raw\n` == 'raw\\n')
        assert('\x41' == 'A')
        assert('\65' == 'A')
    "#,
    );
}

#[test]
fn print_formats_values() {
    assert_eq!(output_of("print('s', 1, 1.5, true, nil)"), "s\t1\t1.5\ttrue\tnil\n");
    assert_eq!(output_of("print(4.0)"), "4.0\n");
    assert_eq!(output_of("print(str(7))"), "7\n");
}
