/// Arithmetic, comparison and coercion semantics.
use super::assert_ok;

#[test]
fn integer_arithmetic_stays_integer() {
    assert_ok(
        r#"
        assert(type(1 + 2) == 'num')
        assert(7 ~/ 2 == 3)
        assert(-7 ~/ 2 == -4)
        assert(7 % 3 == 1)
        assert(-7 % 3 == 2)
        assert(7 % -3 == -2)
        a := 6 b := 4
        assert(a * b == 24)
        assert(a - b == 2)
    "#,
    );
}

#[test]
fn division_and_power_are_float() {
    assert_ok(
        r#"
        assert(1 / 2 == 0.5)
        assert(4 / 2 == 2.0)
        assert(2 ^ 10 == 1024.0)
        assert(2 ^ -1 == 0.5)
        a := 9 b := 2
        assert(a / b == 4.5)
        assert(a ~/ b == 4)
        assert(9.0 ~/ 2 == 4.0)
        assert(9.5 % 2 == 1.5)
    "#,
    );
}

#[test]
fn numeric_identity_across_subtypes() {
    assert_ok(
        r#"
        assert(1 == 1.0)
        assert(not (1 == 1.5))
        assert(3 < 3.5)
        assert(3.5 < 4)
        assert(3 <= 3.0)
        assert(2 > 1.5)
        a := 1 b := 1.0
        assert(a == b)
    "#,
    );
}

#[test]
fn no_cross_category_equality() {
    assert_ok(
        r#"
        assert(not (0 == false))
        assert(not (0 == '0'))
        assert(not (nil == false))
        assert('' != nil)
        assert(not ({} == 0))
    "#,
    );
}

#[test]
fn bitwise_operators() {
    assert_ok(
        r#"
        assert((6 & 3) == 2)
        assert((6 | 3) == 7)
        assert((6 ~ 3) == 5)
        assert(~0 == -1)
        a := 6 b := 3
        assert((a & b) == 2)
        assert((a ~ b) == 5)
        // exact-integer floats behave like their Int twin
        assert((6.0 & 3) == 2)
        f := 3.0
        assert((6 | f) == 7)
    "#,
    );
}

#[test]
fn shifts_wrap_direction_and_width() {
    assert_ok(
        r#"
        assert(1 << 4 == 16)
        assert(16 >> 4 == 1)
        n := 4
        assert(1 << n == 16)
        assert(16 >> -2 == 64)
        assert(1 << -2 == 0)
        assert(1 << 64 == 0)
        assert(1 << 100 == 0)
        assert(-1 >> 63 == 1)
    "#,
    );
}

#[test]
fn string_number_coercion() {
    assert_ok(
        r#"
        assert('10' + 5 == 15.0)
        assert('2' * '3' == 6.0)
        assert('0x10' + 0 == 16.0)
        assert(' 7 ' + 1 == 8.0)
        assert('-2' + 0 == -2.0)
    "#,
    );
}

#[test]
fn string_plus_is_concatenation() {
    assert_ok(
        r#"
        assert('foo' + 'bar' == 'foobar')
        a := 'x'
        assert(a + '' == 'x')
    "#,
    );
}

#[test]
fn string_ordering_is_bytewise() {
    assert_ok(
        r#"
        assert('abc' < 'abd')
        assert('ab' < 'abc')
        assert('b' > 'a')
        assert('a' <= 'a')
        assert(not ('b' < 'a'))
    "#,
    );
}

#[test]
fn logical_operators_return_operands() {
    assert_ok(
        r#"
        assert((nil or 'x') == 'x')
        assert((false and 'x') == false)
        assert((1 and 2) == 2)
        assert((1 or 2) == 1)
        a := nil
        b := a or 'dflt'
        assert(b == 'dflt')
        c := a and a.field
        assert(c == nil)
    "#,
    );
}

#[test]
fn ternary_and_coalesce() {
    assert_ok(
        r#"
        assert((1 > 2 ? 'a' : 'b') == 'b')
        assert((1 < 2 ? 'a' : 'b') == 'a')
        x := nil
        assert((x ?? 9) == 9)
        x = false
        assert((x ?? 9) == false)
        y := 0
        big := y > 0 ? 'pos' : y < 0 ? 'neg' : 'zero'
        assert(big == 'zero')
    "#,
    );
}

#[test]
fn short_circuit_does_not_evaluate() {
    assert_ok(
        r#"
        hits := 0
        fn bump() { hits += 1 rt true }
        shy r = false and bump()
        assert(hits == 0 and r == false)
        r = true or bump()
        assert(hits == 0 and r == true)
        r = 1 > 2 ? bump() : false
        assert(hits == 0)
        r = 'set' ?? bump()
        assert(hits == 0 and r == 'set')
    "#,
    );
}

#[test]
fn unary_operators() {
    assert_ok(
        r#"
        a := 5
        assert(-a == -5)
        assert(-(2.5) == -2.5)
        assert(not nil == true)
        assert(not 0 == false)
        assert(#'' == 0)
        assert(#'abc' == 3)
        assert(~5 == -6)
    "#,
    );
}

#[test]
fn integer_division_by_zero_raises() {
    assert_ok(
        r#"
        a := 1 b := 0
        ok, e = pcall(fn() => a ~/ b)
        assert(ok == false)
        ok2, e2 = pcall(fn() => a % b)
        assert(ok2 == false)
        // float division by zero is inf, not an error
        assert(1 / 0 > 1e300)
    "#,
    );
}
