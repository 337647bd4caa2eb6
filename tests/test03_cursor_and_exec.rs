use sqlite_middleware::prelude::*;
use sqlite_middleware::test_utils::{FakeEngine, Script};

fn rows(values: &[i64]) -> Vec<Vec<StorageValue>> {
    values
        .iter()
        .map(|v| vec![StorageValue::Integer(*v)])
        .collect()
}

#[test]
fn cursor_walks_rows_then_finishes_and_releases() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT id FROM t";
    engine.script(sql, Script::returning(vec!["id".into()], rows(&[1, 2, 3])));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert_eq!(stmt.cursor_state()?, CursorState::Idle);

    let mut seen = Vec::new();
    while stmt.next()? {
        assert_eq!(stmt.cursor_state()?, CursorState::HasRow);
        let (id, _) = stmt.scan_int64(0)?;
        seen.push(id);
    }
    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(stmt.cursor_state()?, CursorState::Finished);
    // Completion resets the handle, so no lock is held while idle.
    assert!(!stmt.busy()?);
    Ok(())
}

#[test]
fn scanning_outside_a_row_is_misuse() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT id FROM t";
    engine.script(sql, Script::returning(vec!["id".into()], rows(&[1])));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert_eq!(stmt.scan_value(0).unwrap_err().kind(), "Misuse");

    while stmt.next()? {}
    assert_eq!(stmt.scan_value(0).unwrap_err().kind(), "Misuse");
    Ok(())
}

#[test]
fn explicit_reset_restarts_the_scan() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT id FROM t";
    engine.script(sql, Script::returning(vec!["id".into()], rows(&[7, 8])));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert!(stmt.next()?);
    assert!(stmt.busy()?);

    stmt.reset()?;
    assert_eq!(stmt.cursor_state()?, CursorState::Idle);
    assert!(!stmt.busy()?);

    assert!(stmt.next()?);
    assert_eq!(stmt.scan_int64(0)?, (7, false));
    Ok(())
}

#[test]
fn step_failure_parks_the_cursor_until_rebound() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT v FROM t WHERE k = ?";
    engine.script(
        sql,
        Script::returning(vec!["v".into()], rows(&[5])).with_fail_on_step(1),
    );

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    stmt.bind(&[HostValue::from(1i64)])?;
    assert!(stmt.next()?);

    let err = stmt.next().unwrap_err();
    assert_eq!(err.kind(), "NativeEngine");
    assert_eq!(stmt.cursor_state()?, CursorState::Failed);

    // A fresh bind re-arms the execution.
    stmt.bind(&[HostValue::from(1i64)])?;
    assert_eq!(stmt.cursor_state()?, CursorState::Idle);
    assert!(stmt.next()?);
    assert_eq!(stmt.scan_int64(0)?, (5, false));
    Ok(())
}

#[test]
fn exec_rejects_statements_that_produce_rows() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT id FROM t";
    engine.script(sql, Script::returning(vec!["id".into()], rows(&[1])));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert_eq!(stmt.exec(&[]).unwrap_err().kind(), "Misuse");
    // The rejection left the statement reset and reusable.
    assert_eq!(stmt.cursor_state()?, CursorState::Idle);
    Ok(())
}

#[test]
fn execute_dml_reports_changed_rows() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "UPDATE t SET v = 0";
    engine.script(sql, Script::dml(3));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert_eq!(stmt.execute_dml(&[])?, 3);
    assert_eq!(session.changes(), 3);
    Ok(())
}

#[test]
fn insert_returns_the_rowid_only_when_something_changed() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    engine.script(
        "INSERT INTO t (v) VALUES (1)",
        Script::dml(1).with_last_insert_rowid(42),
    );
    engine.script("INSERT OR IGNORE INTO t (v) VALUES (1)", Script::dml(0));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare("INSERT INTO t (v) VALUES (1)")?;
    assert_eq!(stmt.insert(&[])?, Some(42));

    let mut ignored = session.prepare("INSERT OR IGNORE INTO t (v) VALUES (1)")?;
    assert_eq!(ignored.insert(&[])?, None);
    Ok(())
}

#[test]
fn select_hands_each_row_to_the_callback() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT id FROM t";
    engine.script(sql, Script::returning(vec!["id".into()], rows(&[10, 20])));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    let mut collected = Vec::new();
    stmt.select(&[], |row| {
        collected.push(row.scan_int64(0)?.0);
        Ok(())
    })?;
    assert_eq!(collected, vec![10, 20]);
    Ok(())
}

#[test]
fn select_stops_on_the_callback_error() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT id FROM t";
    engine.script(sql, Script::returning(vec!["id".into()], rows(&[1, 2, 3])));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    let mut calls = 0;
    let err = stmt
        .select(&[], |row| {
            calls += 1;
            Err(SqliteMiddlewareError::Misuse {
                message: "stop".into(),
                sql: row.sql().to_owned(),
            })
        })
        .unwrap_err();
    assert_eq!(err.kind(), "Misuse");
    assert_eq!(calls, 1);
    Ok(())
}

#[test]
fn select_one_row_scans_or_reports_absence() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    engine.script(
        "SELECT id FROM t WHERE k = 1",
        Script::returning(vec!["id".into()], rows(&[99])),
    );
    engine.script(
        "SELECT id FROM t WHERE k = 2",
        Script::returning(vec!["id".into()], vec![]),
    );

    let session = Session::new(engine.connection());
    let mut found = session.prepare("SELECT id FROM t WHERE k = 1")?;
    let mut id = 0i64;
    assert!(found.select_one_row(vec![ScanTarget::Int64(&mut id)])?);
    assert_eq!(id, 99);

    let mut missing = session.prepare("SELECT id FROM t WHERE k = 2")?;
    let mut unset = 0i64;
    assert!(!missing.select_one_row(vec![ScanTarget::Int64(&mut unset)])?);
    Ok(())
}

#[test]
fn read_only_and_tail_metadata() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    engine.script("SELECT 1", Script::returning(vec!["1".into()], rows(&[1])));
    engine.script("DELETE FROM t", Script::dml(2));

    let session = Session::new(engine.connection());
    let query = session.prepare("SELECT 1")?;
    assert!(query.read_only()?);
    assert_eq!(query.tail()?, "");

    let dml = session.prepare("DELETE FROM t")?;
    assert!(!dml.read_only()?);

    let multi = session.prepare("SELECT 1; SELECT 2")?;
    assert_eq!(multi.tail()?, " SELECT 2");
    Ok(())
}
