/// Coroutine create/resume/yield/status semantics.
use super::assert_ok;

#[test]
fn yield_round_trip() {
    assert_ok(
        r#"
        co = create(fn(x) {
            y := yield(x + 1)
            rt y * 2
        })
        ok, v = resume(co, 3)
        assert(ok == true and v == 4)
        ok2, v2 = resume(co, 10)
        assert(ok2 == true and v2 == 20)
        ok3, e = resume(co, 99)
        assert(ok3 == false)
    "#,
    );
}

#[test]
fn status_transitions() {
    assert_ok(
        r#"
        co = create(fn() { yield() })
        assert(status(co) == 'new')
        resume(co)
        assert(status(co) == 'suspended')
        resume(co)
        assert(status(co) == 'dead')
    "#,
    );
}

#[test]
fn multiple_values_cross_the_boundary() {
    assert_ok(
        r#"
        co = create(fn(a, b) {
            c, d = yield(a + b, a - b)
            rt c * d
        })
        ok, s, p = resume(co, 5, 3)
        assert(ok and s == 8 and p == 2)
        ok2, prod = resume(co, 6, 7)
        assert(ok2 and prod == 42)
    "#,
    );
}

#[test]
fn producer_loop() {
    assert_ok(
        r#"
        co = create(fn(n) {
            for i = 0, n {
                yield(i)
            }
            rt 'done'
        })
        total := 0
        while true {
            ok, v = resume(co, 3)
            assert(ok)
            if v == 'done' { break }
            total += v
        }
        assert(total == 6)
    "#,
    );
}

#[test]
fn error_in_coroutine_surfaces_to_resumer() {
    assert_ok(
        r#"
        co = create(fn() { error('inner failure') })
        ok, e = resume(co)
        assert(ok == false)
        assert(e == 'inner failure')
        assert(status(co) == 'errored')
        ok2, e2 = resume(co)
        assert(ok2 == false)
    "#,
    );
}

#[test]
fn pcall_inside_coroutine_catches_locally() {
    assert_ok(
        r#"
        co = create(fn() {
            ok, e = pcall(fn() { error('caught') })
            rt ok, e
        })
        k, a, b = resume(co)
        assert(k == true)
        assert(a == false)
        assert(b == 'caught')
        assert(status(co) == 'dead')
    "#,
    );
}

#[test]
fn yield_from_main_thread_fails() {
    assert_ok(
        r#"
        ok, e = pcall(fn() { yield(1) })
        assert(ok == false)
    "#,
    );
}

#[test]
fn yield_across_host_boundary_fails() {
    assert_ok(
        r#"
        co = create(fn() {
            ok, e = pcall(fn() { yield(1) })
            rt ok, e
        })
        k, a, b = resume(co)
        assert(k == true and a == false)
    "#,
    );
}

#[test]
fn isyieldable_tracks_context() {
    assert_ok(
        r#"
        assert(isyieldable() == false)
        co = create(fn() { rt isyieldable() })
        ok, v = resume(co)
        assert(ok and v == true)
    "#,
    );
}

#[test]
fn running_reports_main_flag() {
    assert_ok(
        r#"
        t, main = coroutine.running()
        assert(type(t) == 'thread')
        assert(main == true)
        co = create(fn() {
            t2, m2 = coroutine.running()
            rt m2
        })
        ok, inner_main = resume(co)
        assert(ok and inner_main == false)
    "#,
    );
}

#[test]
fn wrap_returns_values_directly() {
    assert_ok(
        r#"
        gen = coroutine.wrap(fn() {
            yield(1)
            yield(2)
            rt 3
        })
        assert(gen() == 1)
        assert(gen() == 2)
        assert(gen() == 3)
        ok, e = pcall(gen)
        assert(ok == false)
    "#,
    );
}

#[test]
fn nested_coroutines() {
    assert_ok(
        r#"
        inner = create(fn() {
            yield('from-inner')
            rt 'inner-done'
        })
        outer = create(fn() {
            ok, v = resume(inner)
            yield(v)
            rt 'outer-done'
        })
        ok, v = resume(outer)
        assert(ok and v == 'from-inner')
        ok2, v2 = resume(outer)
        assert(ok2 and v2 == 'outer-done')
    "#,
    );
}

#[test]
fn cannot_resume_running_or_dead() {
    assert_ok(
        r#"
        co = create(fn() {
            ok, e = resume(co)
            rt ok
        })
        ok, v = resume(co)
        // resuming yourself fails gracefully
        assert(ok and v == false)
        done = create(fn() => 1)
        resume(done)
        ok2, e2 = resume(done)
        assert(ok2 == false)
    "#,
    );
}

#[test]
fn coroutine_arguments_on_first_resume() {
    assert_ok(
        r#"
        co = create(fn(a, b, c) { rt a + b + c })
        ok, v = resume(co, 1, 2, 3)
        assert(ok and v == 6)
    "#,
    );
}
