use sqlite_bridge::prelude::*;
use sqlite_bridge::protocol::Operation;
use tempfile::tempdir;

#[tokio::test]
async fn close_resets_and_data_ops_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("life.db");
    let db = Database::new(DbConfig::new(path.to_string_lossy()));

    db.execute("CREATE TABLE t (id INTEGER)", &[]).await?;
    db.execute("INSERT INTO t VALUES (1)", &[]).await?;
    db.close().await?;

    // The documented post-close policy: the next data operation re-runs the
    // readiness sequence against the same configuration and sees the
    // durable data.
    let rows = db.query("SELECT COUNT(*) AS cnt FROM t", &[]).await?;
    assert_eq!(rows[0].get("cnt"), Some(&SqlValue::Integer(1)));
    Ok(())
}

#[tokio::test]
async fn close_before_ready_is_a_noop() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::new(DbConfig::in_memory());
    db.close().await?;
    db.close().await?;
    Ok(())
}

#[tokio::test]
async fn delete_wipes_direct_file_storage() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("doomed.db");
    let db = Database::new(DbConfig::new(path.to_string_lossy()));

    db.execute("CREATE TABLE t (id INTEGER)", &[]).await?;
    assert!(path.exists());

    db.delete().await?;
    assert!(!path.exists());

    // The handle stays usable; the next operation recreates the database.
    let rows = db.query("SELECT 1 AS n", &[]).await?;
    assert_eq!(rows[0].get("n"), Some(&SqlValue::Integer(1)));
    Ok(())
}

#[tokio::test]
async fn delete_wipes_the_whole_pool() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let db = Database::new(DbConfig::new("main.db").with_pool_dir(dir.path()));
    db.execute("CREATE TABLE t (id INTEGER)", &[]).await?;
    db.import("side.db", vec![0u8; 8]).await?;

    db.delete().await?;
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn delete_without_prior_ready_initializes_first() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    // A prior session left data in the pool.
    std::fs::write(dir.path().join("stale.db"), b"leftover")?;

    let db = Database::new(DbConfig::new("main.db").with_pool_dir(dir.path()));
    db.delete().await?;
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn origin_mismatch_is_answered_and_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::new(DbConfig::in_memory());
    db.execute("CREATE TABLE t (id INTEGER)", &[]).await?;

    let err = db
        .test_request_with_origin(
            u64::MAX,
            Operation::Execute {
                sql: "INSERT INTO t VALUES (1)".into(),
                params: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::OriginMismatch(_)));

    // The forged request produced an error response but no side effects,
    // and the channel keeps serving well-formed requests.
    let rows = db.query("SELECT COUNT(*) AS cnt FROM t", &[]).await?;
    assert_eq!(rows[0].get("cnt"), Some(&SqlValue::Integer(0)));
    Ok(())
}
