use std::sync::Arc;

use chrono::NaiveDate;
use sql_spy::prelude::*;

fn spy_with(config: SpyConfig) -> SqlSpy {
    let sink = Arc::new(RecordingSink::new(Severity::Info));
    SqlSpy::with_resolver(config, sink, Arc::new(FixedFrames::default()))
}

#[test]
fn insert_with_preformatted_values() -> Result<(), Box<dyn std::error::Error>> {
    let tracker = BindParameterTracker::new();
    tracker.set(1, Some("INT"), "1")?;
    tracker.set(2, Some("VARCHAR"), "Marissa Coala")?;

    let sql = reconstruct("INSERT INTO People VALUES (?, ?);", &tracker, false);
    assert_eq!(sql, "INSERT INTO People VALUES (1, Marissa Coala);");

    let hinted = reconstruct("INSERT INTO People VALUES (?, ?);", &tracker, true);
    assert_eq!(hinted, "INSERT INTO People VALUES ((INT)1, (VARCHAR)Marissa Coala);");
    Ok(())
}

#[test]
fn unset_parameter_keeps_its_placeholder() -> Result<(), Box<dyn std::error::Error>> {
    let tracker = BindParameterTracker::new();
    tracker.set(1, None, "5")?;
    tracker.set(3, None, "'z'")?;
    assert_eq!(
        reconstruct("call proc(?, ?, ?, ?)", &tracker, false),
        "call proc(5, ?, 'z', ?)"
    );
    Ok(())
}

#[test]
fn values_are_formatted_in_the_connection_dialect() -> Result<(), Box<dyn std::error::Error>> {
    let when = NaiveDate::from_ymd_opt(2011, 12, 31)
        .ok_or("bad date")?
        .and_hms_milli_opt(8, 30, 0, 5)
        .ok_or("bad time")?;

    let cases = [
        ("oracle", "to_date('12/31/2011 08:30:00.005', 'mm/dd/yyyy hh24:mi:ss.ff3')"),
        ("tiberius", "'12/31/2011 08:30:00.005'"),
        ("mysql", "'2011-12-31 08:30:00'"),
        ("rusqlite", "'12/31/2011 08:30:00.005'"),
    ];
    let spy = spy_with(SpyConfig::default());
    for (driver, expected) in cases {
        let conn = spy.open_connection(driver);
        let stmt = spy.prepare(&conn, "select * from t where at = ?");
        spy.bind(&stmt, 1, None, &BindValue::Timestamp(when))?;
        assert_eq!(
            spy.dumped_sql(&stmt),
            format!("select * from t where at = {expected}"),
            "driver {driver}"
        );
    }
    Ok(())
}

#[test]
fn quotes_and_nulls_and_booleans() -> Result<(), Box<dyn std::error::Error>> {
    let spy = spy_with(SpyConfig::default().with_boolean_as_true_false(true));
    let conn = spy.open_connection("rusqlite");
    let stmt = spy.prepare(&conn, "update people set name = ?, nick = ?, active = ? where id = ?");
    spy.bind(&stmt, 1, None, &"O'Hara".into())?;
    spy.bind(&stmt, 2, None, &BindValue::Null)?;
    spy.bind(&stmt, 3, None, &true.into())?;
    spy.bind(&stmt, 4, None, &BindValue::Int(12))?;
    assert_eq!(
        spy.dumped_sql(&stmt),
        "update people set name = 'O''Hara', nick = NULL, active = true where id = 12"
    );
    Ok(())
}

#[test]
fn configured_dialect_overrides_driver_table() -> Result<(), Box<dyn std::error::Error>> {
    let spy = spy_with(SpyConfig::default().with_dialect(Dialect::SqlServer));
    let conn = spy.open_connection("oracle");
    assert_eq!(conn.dialect(), Dialect::SqlServer);
    let stmt = spy.prepare(&conn, "select ?");
    let day = NaiveDate::from_ymd_opt(2020, 2, 29).ok_or("bad date")?;
    spy.bind(&stmt, 1, None, &day.into())?;
    assert_eq!(spy.dumped_sql(&stmt), "select '02/29/2020'");
    Ok(())
}

#[test]
fn binding_index_zero_fails() {
    let spy = spy_with(SpyConfig::default());
    let conn = spy.open_connection("rusqlite");
    let stmt = spy.prepare(&conn, "select ?");
    assert!(matches!(
        spy.bind(&stmt, 0, None, &BindValue::Int(1)),
        Err(SqlSpyError::ParameterError(_))
    ));
}
