/// Metatable dispatch: operators, indexing, calls, printing.
use super::{assert_ok, output_of};

#[test]
fn add_metamethod_dispatches() {
    assert_ok(
        r#"
        class Vec { 'x': 0, 'y': 0 }
        fn Vec:__add(o) {
            r := new(Vec)
            r.x = self.x + o.x
            r.y = self.y + o.y
            rt r
        }
        a = new(Vec) a.x = 1 a.y = 2
        b = new(Vec) b.x = 10 b.y = 20
        c = a + b
        assert(c.x == 11 and c.y == 22)
    "#,
    );
}

#[test]
fn right_operand_metamethod_is_found() {
    assert_ok(
        r#"
        mt = { '__sub': fn(a, b) => 'subbed' }
        t = setmeta({}, mt)
        assert((t - 1) == 'subbed')
        assert((1 - t) == 'subbed')
    "#,
    );
}

#[test]
fn arithmetic_without_metamethod_raises() {
    assert_ok(
        r#"
        ok, e = pcall(fn() => {} + 2)
        assert(ok == false)
        ok2, e2 = pcall(fn() => nil * 2)
        assert(ok2 == false)
    "#,
    );
}

#[test]
fn index_table_chain() {
    assert_ok(
        r#"
        base = { 'greet': 'hello', 'shared': 1 }
        mid = setmeta({ 'own': 2 }, { '__index': base })
        leaf = setmeta({}, { '__index': mid })
        assert(leaf.own == 2)
        assert(leaf.greet == 'hello')
        assert(leaf.missing == nil)
        // own keys win over the chain
        leaf.greet = 'hi'
        assert(leaf.greet == 'hi')
        assert(base.greet == 'hello')
    "#,
    );
}

#[test]
fn index_function_receives_table_and_key() {
    assert_ok(
        r#"
        t = setmeta({}, { '__index': fn(tbl, k) => 'computed:' + k })
        assert(t.name == 'computed:name')
        t.real = 1
        assert(t.real == 1)
    "#,
    );
}

#[test]
fn newindex_function_intercepts_writes() {
    assert_ok(
        r#"
        log = {}
        target = {}
        proxy = setmeta({}, {
            '__newindex': fn(t, k, v) { log[k] = v target[k] = v },
            '__index': fn(t, k) => target[k],
        })
        proxy.a = 5
        assert(target.a == 5)
        assert(log.a == 5)
        assert(proxy.a == 5)
    "#,
    );
}

#[test]
fn newindex_table_redirects_writes() {
    assert_ok(
        r#"
        store = {}
        t = setmeta({}, { '__newindex': store })
        t.k = 'v'
        assert(store.k == 'v')
        assert(t.k == nil)
    "#,
    );
}

#[test]
fn call_metamethod_prepends_callee() {
    assert_ok(
        r#"
        callable = setmeta({ 'base': 100 }, {
            '__call': fn(self, n) => self.base + n,
        })
        assert(callable(5) == 105)
        ok, e = pcall(fn() => ({})(1))
        assert(ok == false)
    "#,
    );
}

#[test]
fn eq_metamethod_for_tables_only() {
    assert_ok(
        r#"
        mt = { '__eq': fn(a, b) => a.id == b.id }
        x = setmeta({ 'id': 7 }, mt)
        y = setmeta({ 'id': 7 }, mt)
        z = setmeta({ 'id': 8 }, mt)
        assert(x == y)
        assert(x != z)
        assert(x == x)
        // never invoked across categories
        assert(not (x == 7))
    "#,
    );
}

#[test]
fn comparison_metamethods() {
    assert_ok(
        r#"
        mt = {
            '__lt': fn(a, b) => a.rank < b.rank,
            '__le': fn(a, b) => a.rank <= b.rank,
        }
        lo = setmeta({ 'rank': 1 }, mt)
        hi = setmeta({ 'rank': 2 }, mt)
        assert(lo < hi)
        assert(lo <= hi)
        assert(hi > lo)
        assert(hi >= lo)
        assert(not (hi < lo))
    "#,
    );
}

#[test]
fn len_metamethod() {
    assert_ok(
        r#"
        t = setmeta({}, { '__len': fn(x) => 42 })
        ok, e = pcall(fn() => #t)
        // tables use their border, not __len
        assert(ok and e == 0)
        u = setmeta({}, {})
        assert(#u == 0)
    "#,
    );
}

#[test]
fn str_metamethod_wins_for_printing() {
    assert_eq!(
        output_of(
            r#"
            p = setmeta({}, { '__str': fn(self) => 'custom', '__name': 'Point' })
            print(p)
            print(str(p))
        "#
        ),
        "custom\ncustom\n"
    );
}

#[test]
fn name_metafield_labels_values() {
    let out = output_of(
        r#"
        p = setmeta({}, { '__name': 'Point' })
        print(p)
    "#,
    );
    assert!(out.starts_with("Point: 0x"), "got: {}", out);
}

#[test]
fn default_format_shows_type() {
    let out = output_of("print({})");
    assert!(out.starts_with("map: 0x"), "got: {}", out);
}

#[test]
fn method_lookup_through_class_index() {
    assert_ok(
        r#"
        class Animal { 'sound': '...' }
        fn Animal:speak() { rt self.sound }
        fn Animal:with(s) { self.sound = s rt self }
        a = new(Animal):with('woof')
        assert(a:speak() == 'woof')
        b = new(Animal)
        assert(b:speak() == '...')
    "#,
    );
}
