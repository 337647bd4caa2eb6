use sqlite_middleware::prelude::*;
use sqlite_middleware::test_utils::{FakeEngine, Script};

fn one_row(engine: &FakeEngine, sql: &str, value: StorageValue) {
    engine.script(
        sql,
        Script::returning(vec!["v".into()], vec![vec![value]]),
    );
}

#[test]
fn lossy_text_to_integer_is_rejected_by_default() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT v FROM t";
    one_row(&engine, sql, StorageValue::Text("abc".into()));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert!(stmt.check_type_mismatch());
    assert!(stmt.next()?);

    let err = stmt.scan_int64(0).unwrap_err();
    match err {
        SqliteMiddlewareError::TypeMismatch { from, target, .. } => {
            assert_eq!(from, StorageClass::Text);
            assert_eq!(target, StorageClass::Integer);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn disabling_the_check_falls_back_to_engine_coercion() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT v FROM t";
    one_row(&engine, sql, StorageValue::Text("42abc".into()));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    stmt.set_check_type_mismatch(false);
    assert!(stmt.next()?);

    assert_eq!(stmt.scan_int64(0)?, (42, false));
    Ok(())
}

#[test]
fn float_to_integer_truncation_is_lossy() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT v FROM t";
    one_row(&engine, sql, StorageValue::Float(3.9));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert!(stmt.next()?);
    assert_eq!(stmt.scan_int64(0).unwrap_err().kind(), "TypeMismatch");

    stmt.set_check_type_mismatch(false);
    assert_eq!(stmt.scan_int64(0)?, (3, false));
    Ok(())
}

#[test]
fn integer_widens_into_float_without_complaint() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT v FROM t";
    one_row(&engine, sql, StorageValue::Integer(7));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert!(stmt.next()?);
    assert_eq!(stmt.scan_f64(0)?, (7.0, false));
    Ok(())
}

#[test]
fn text_to_float_is_lossy_too() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT v FROM t";
    one_row(&engine, sql, StorageValue::Text("1.5ish".into()));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert!(stmt.next()?);
    assert_eq!(stmt.scan_f64(0).unwrap_err().kind(), "TypeMismatch");

    stmt.set_check_type_mismatch(false);
    assert_eq!(stmt.scan_f64(0)?, (1.5, false));
    Ok(())
}

#[test]
fn text_and_blob_destinations_take_any_class() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT v FROM t";
    one_row(&engine, sql, StorageValue::Integer(12));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert!(stmt.next()?);
    // No mismatch into Text or Blob destinations; the engine stringifies.
    assert_eq!(stmt.scan_text(0)?, ("12".to_owned(), false));
    assert_eq!(stmt.scan_blob(0)?, (b"12".to_vec(), false));
    Ok(())
}

#[test]
fn the_session_default_seeds_each_statement() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT v FROM t";
    one_row(&engine, sql, StorageValue::Text("abc".into()));

    let session = Session::builder(engine.connection())
        .check_type_mismatch(false)
        .build();
    let mut stmt = session.prepare(sql)?;
    assert!(!stmt.check_type_mismatch());
    assert!(stmt.next()?);
    assert_eq!(stmt.scan_int64(0)?, (0, false));
    Ok(())
}

#[test]
fn unsigned_destinations_reject_negative_values() -> Result<(), SqliteMiddlewareError> {
    let engine = FakeEngine::new();
    let sql = "SELECT v FROM t";
    one_row(&engine, sql, StorageValue::Integer(-5));

    let session = Session::new(engine.connection());
    let mut stmt = session.prepare(sql)?;
    assert!(stmt.next()?);

    let err = stmt.scan_unsigned(0).unwrap_err();
    match err {
        SqliteMiddlewareError::IntegerOverflow { value, index, .. } => {
            assert_eq!(value, -5);
            assert_eq!(index, 0);
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut dst = 0u64;
    assert_eq!(
        stmt.scan_by_index(0, ScanTarget::UInt64(&mut dst))
            .unwrap_err()
            .kind(),
        "IntegerOverflow"
    );
    Ok(())
}
