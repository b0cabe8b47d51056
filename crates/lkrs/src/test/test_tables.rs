/// Table semantics: constructors, the array border, keys, iteration.
use super::assert_ok;

#[test]
fn array_constructor_and_border() {
    assert_ok(
        r#"
        t = ['a', 'b', 'c']
        assert(#t == 3)
        assert(t[0] == 'a' and t[2] == 'c')
        t[1] = nil
        assert(#t == 1 or #t == 3)
    "#,
    );
}

#[test]
fn tail_nil_truncates() {
    assert_ok(
        r#"
        t = [1, 2, 3]
        t[2] = nil
        assert(#t == 2)
        t[1] = nil
        assert(#t == 1)
    "#,
    );
}

#[test]
fn appending_extends_the_array_part() {
    assert_ok(
        r#"
        t = []
        t[0] = 'x'
        t[1] = 'y'
        t[#t] = 'z'
        assert(#t == 3)
        assert(t[2] == 'z')
    "#,
    );
}

#[test]
fn sparse_keys_migrate_on_fill() {
    assert_ok(
        r#"
        t = {}
        t[2] = 'c'
        t[1] = 'b'
        assert(#t == 0)
        t[0] = 'a'
        assert(#t == 3)
        assert(t[1] == 'b' and t[2] == 'c')
    "#,
    );
}

#[test]
fn float_keys_canonicalise_to_int() {
    assert_ok(
        r#"
        t = {}
        t[1.0] = 'one'
        assert(t[1] == 'one')
        t[2] = 'two'
        assert(t[2.0] == 'two')
        t[0.5] = 'half'
        assert(t[0.5] == 'half')
        assert(t[1.5] == nil)
    "#,
    );
}

#[test]
fn nil_and_nan_keys_are_rejected() {
    assert_ok(
        r#"
        t = {}
        k := nil
        ok, e = pcall(fn() { t[k] = 1 })
        assert(ok == false)
        nan := 0.0 / 0.0
        ok2, e2 = pcall(fn() { t[nan] = 1 })
        assert(ok2 == false)
        // reading a nil key is just nil
        assert(t[k] == nil)
    "#,
    );
}

#[test]
fn mixed_constructor_fields() {
    assert_ok(
        r#"
        k := 'dyn'
        t = { 'a': 1, [k]: 2, 99, b: 3, 100 }
        assert(t.a == 1)
        assert(t.dyn == 2)
        assert(t.b == 3)
        assert(t[0] == 99 and t[1] == 100)
        assert(#t == 2)
    "#,
    );
}

#[test]
fn iteration_visits_each_entry_exactly_once() {
    assert_ok(
        r#"
        t = { 'a': 1, 'b': 2, 'c': 3 }
        t[0] = 10
        t[1] = 20
        seen = {}
        n := 0
        total := 0
        for k, v in t {
            assert(seen[k] == nil)
            seen[k] = true
            n += 1
            total += v
        }
        assert(n == 5)
        assert(total == 36)
    "#,
    );
}

#[test]
fn iteration_order_starts_with_array_part() {
    assert_ok(
        r#"
        t = ['x', 'y']
        t['k'] = 'z'
        keys = []
        for k, v in t { keys[#keys] = k }
        assert(keys[0] == 0)
        assert(keys[1] == 1)
        assert(keys[2] == 'k')
    "#,
    );
}

#[test]
fn next_primitive_drives_iteration() {
    assert_ok(
        r#"
        t = { 'one': 1 }
        k, v = next(t, nil)
        assert(k == 'one' and v == 1)
        k2 = next(t, k)
        assert(k2 == nil)
    "#,
    );
}

#[test]
fn len_builtin_matches_operator() {
    assert_ok(
        r#"
        t = [1, 2, 3, 4]
        assert(len(t) == #t)
        assert(len('abcd') == 4)
    "#,
    );
}

#[test]
fn nested_tables() {
    assert_ok(
        r#"
        m = { 'rows': [[1, 2], [3, 4]] }
        assert(m.rows[1][0] == 3)
        m.rows[0][1] = 9
        assert(m.rows[0][1] == 9)
    "#,
    );
}

#[test]
fn big_constructor_spans_setlist_batches() {
    let mut src = String::from("t = [");
    for i in 0..120 {
        if i > 0 {
            src.push_str(", ");
        }
        src.push_str(&i.to_string());
    }
    src.push_str("] assert(#t == 120) assert(t[0] == 0) assert(t[60] == 60) assert(t[119] == 119)");
    assert_ok(&src);
}
