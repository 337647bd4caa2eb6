use sqlite_middleware::prelude::*;
use sqlite_middleware::test_utils::{FakeEngine, Script};

#[test]
fn sequential_prepares_reuse_the_compiled_handle() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT id FROM t";
    engine.script(
        sql,
        Script::returning(vec!["id".into()], vec![vec![StorageValue::Integer(1)]]),
    );

    let session = Session::new(engine.connection());
    for _ in 0..3 {
        let mut stmt = session.prepare(sql)?;
        assert!(stmt.next()?);
        stmt.finalize()?;
    }
    assert_eq!(engine.compile_count(sql), 1);
    assert_eq!(session.cached_statements(), 1);
    assert_eq!(engine.finalize_count(sql), 0);
    Ok(())
}

#[test]
fn checked_out_statements_are_never_shared() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT 1";
    let session = Session::new(engine.connection());

    let mut first = session.prepare(sql)?;
    let mut second = session.prepare(sql)?;
    assert_eq!(engine.compile_count(sql), 2);

    first.finalize()?;
    second.finalize()?;
    // One idle entry per SQL text; the duplicate is destroyed on check-in.
    assert_eq!(session.cached_statements(), 1);
    assert_eq!(engine.finalize_count(sql), 1);
    Ok(())
}

#[test]
fn zero_capacity_disables_caching() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT 1";
    let session = Session::builder(engine.connection()).cache_capacity(0).build();

    let mut stmt = session.prepare(sql)?;
    assert!(!stmt.is_cacheable());
    stmt.finalize()?;
    assert_eq!(session.cached_statements(), 0);
    assert_eq!(engine.finalize_count(sql), 1);

    session.prepare(sql)?.finalize()?;
    assert_eq!(engine.compile_count(sql), 2);
    Ok(())
}

#[test]
fn least_recently_used_statement_is_evicted() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let session = Session::builder(engine.connection()).cache_capacity(2).build();

    session.prepare("a")?.finalize()?;
    session.prepare("b")?.finalize()?;
    // Touch "a" so "b" is the oldest idle entry.
    session.prepare("a")?.finalize()?;
    session.prepare("c")?.finalize()?;

    assert_eq!(session.cached_statements(), 2);
    assert!(session.is_cached("a"));
    assert!(!session.is_cached("b"));
    assert_eq!(engine.finalize_count("b"), 1);
    assert_eq!(engine.finalize_count("a"), 0);
    assert_eq!(engine.finalize_count("c"), 0);

    // "a" survived and comes back without recompiling.
    session.prepare("a")?.finalize()?;
    assert_eq!(engine.compile_count("a"), 1);
    Ok(())
}

#[test]
fn cache_keys_are_byte_exact() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let session = Session::new(engine.connection());

    session.prepare("SELECT 1")?.finalize()?;
    session.prepare("select 1")?.finalize()?;
    session.prepare("SELECT  1")?.finalize()?;

    assert_eq!(session.cached_statements(), 3);
    assert_eq!(engine.compile_count("SELECT 1"), 1);
    assert_eq!(engine.compile_count("select 1"), 1);
    Ok(())
}

#[test]
fn use_after_finalize_fails_cleanly() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT 1";
    let session = Session::new(engine.connection());

    let mut stmt = session.prepare(sql)?;
    stmt.finalize()?;
    assert!(stmt.is_finalized());
    assert_eq!(stmt.next().unwrap_err().kind(), "UseAfterFinalize");
    assert_eq!(
        stmt.bind(&[]).unwrap_err().kind(),
        "UseAfterFinalize"
    );
    // Finalizing twice is harmless.
    stmt.finalize()?;
    Ok(())
}

#[test]
fn dropping_a_statement_returns_it_to_the_cache() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT 1";
    let session = Session::new(engine.connection());

    {
        let _stmt = session.prepare(sql)?;
    }
    assert_eq!(session.cached_statements(), 1);
    assert_eq!(engine.finalize_count(sql), 0);
    Ok(())
}

#[test]
fn dead_connections_destroy_instead_of_pooling() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT 1";
    let session = Session::new(engine.connection());

    let mut stmt = session.prepare(sql)?;
    engine.close();
    assert!(!session.is_open());
    stmt.finalize()?;
    assert_eq!(session.cached_statements(), 0);
    assert_eq!(engine.finalize_count(sql), 1);
    Ok(())
}

#[test]
fn failed_binds_discard_the_statement() {
    let engine = FakeEngine::new();
    let sql = "SELECT ?";
    engine.script(sql, Script::echo());
    let session = Session::new(engine.connection());

    let err = session
        .prepare_bound(sql, &[HostValue::from(1i64), HostValue::from(2i64)])
        .unwrap_err();
    assert_eq!(err.kind(), "ArityMismatch");
    // The handle never reaches the pool in an unknown state.
    assert_eq!(session.cached_statements(), 0);
    assert_eq!(engine.finalize_count(sql), 1);
}

#[test]
fn bind_failure_on_a_cached_statement_destroys_it() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT ?";
    engine.script(sql, Script::echo());
    let session = Session::new(engine.connection());

    session.prepare(sql)?.finalize()?;
    assert_eq!(session.cached_statements(), 1);

    // The cache hit hands out the pooled handle; the failed bind must
    // destroy it rather than re-pool it.
    let err = session.prepare_bound(sql, &[]).unwrap_err();
    assert_eq!(err.kind(), "ArityMismatch");
    assert_eq!(session.cached_statements(), 0);
    assert_eq!(engine.compile_count(sql), 1);
    assert_eq!(engine.finalize_count(sql), 1);
    Ok(())
}

#[test]
fn statements_debug_print_their_sql() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let session = Session::new(engine.connection());
    let stmt = session.prepare("SELECT 1")?;
    let rendered = format!("{stmt:?}");
    assert!(rendered.contains("SELECT 1"));
    assert!(rendered.contains("finalized: false"));
    Ok(())
}

#[test]
fn prepare_bound_hands_back_a_ready_statement() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT ?";
    engine.script(sql, Script::echo());
    let session = Session::new(engine.connection());

    let mut stmt = session.prepare_bound(sql, &[HostValue::from(5i64)])?;
    assert!(stmt.next()?);
    assert_eq!(stmt.scan_value(0)?, StorageValue::Integer(5));
    Ok(())
}

#[test]
fn dropping_the_session_flushes_idle_statements() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT 1";
    {
        let session = Session::new(engine.connection());
        session.prepare(sql)?.finalize()?;
        assert_eq!(session.cached_statements(), 1);
    }
    assert_eq!(engine.finalize_count(sql), 1);
    Ok(())
}

#[test]
fn flush_cache_destroys_idle_statements_now() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let session = Session::new(engine.connection());
    session.prepare("a")?.finalize()?;
    session.prepare("b")?.finalize()?;

    session.flush_cache();
    assert_eq!(session.cached_statements(), 0);
    assert_eq!(engine.finalize_count("a"), 1);
    assert_eq!(engine.finalize_count("b"), 1);
    Ok(())
}

#[test]
fn checked_in_statements_come_back_clean() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT ?";
    engine.script(sql, Script::echo());
    let session = Session::new(engine.connection());

    let mut stmt = session.prepare(sql)?;
    stmt.bind(&[HostValue::from("dirty")])?;
    assert!(stmt.next()?);
    stmt.finalize()?;

    // The cached handle was reset and its bindings cleared on check-in.
    let mut again = session.prepare(sql)?;
    assert_eq!(engine.compile_count(sql), 1);
    assert_eq!(again.cursor_state()?, CursorState::Idle);
    assert!(again.next()?);
    assert_eq!(again.scan_value(0)?, StorageValue::Null);
    Ok(())
}
