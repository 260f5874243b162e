use sqlite_bridge::prelude::*;

async fn ledger_db() -> Result<Database, BridgeError> {
    let db = Database::new(DbConfig::in_memory());
    db.execute(
        "CREATE TABLE ledger (id INTEGER PRIMARY KEY, amount INTEGER NOT NULL)",
        &[],
    )
    .await?;
    Ok(db)
}

async fn ledger_count(db: &Database) -> Result<i64, BridgeError> {
    let rows = db.query("SELECT COUNT(*) AS cnt FROM ledger", &[]).await?;
    Ok(*rows[0].get("cnt").unwrap().as_int().unwrap())
}

#[tokio::test]
async fn committed_transaction_is_durably_visible() -> Result<(), Box<dyn std::error::Error>> {
    let db = ledger_db().await?;
    let total = db
        .transaction(|tx| async move {
            tx.execute("INSERT INTO ledger (amount) VALUES (10)", &[]).await?;
            tx.execute("INSERT INTO ledger (amount) VALUES (32)", &[]).await?;
            let rows = tx.query("SELECT SUM(amount) AS total FROM ledger", &[]).await?;
            Ok(*rows[0].get("total").unwrap().as_int().unwrap())
        })
        .await?;
    assert_eq!(total, 42);
    assert_eq!(ledger_count(&db).await?, 2);
    Ok(())
}

#[tokio::test]
async fn failed_transaction_rolls_back_and_reraises() -> Result<(), Box<dyn std::error::Error>> {
    let db = ledger_db().await?;
    db.execute("INSERT INTO ledger (amount) VALUES (1)", &[]).await?;

    let err = db
        .transaction(|tx| async move {
            tx.execute("INSERT INTO ledger (amount) VALUES (2)", &[]).await?;
            tx.execute("INSERT INTO ledger (amount) VALUES (3)", &[]).await?;
            Err::<(), _>(BridgeError::Other("caller bug".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Other(_)));

    // Observable state is exactly what it was before the transaction.
    assert_eq!(ledger_count(&db).await?, 1);
    Ok(())
}

#[tokio::test]
async fn engine_error_in_body_also_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let db = ledger_db().await?;
    let err = db
        .transaction(|tx| async move {
            tx.execute("INSERT INTO ledger (amount) VALUES (5)", &[]).await?;
            // NOT NULL constraint failure surfaces as an engine error.
            tx.execute("INSERT INTO ledger (amount) VALUES (NULL)", &[]).await?;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::ExecutionError(_)));
    assert_eq!(ledger_count(&db).await?, 0);
    Ok(())
}

#[tokio::test]
async fn transaction_body_sees_its_own_writes() -> Result<(), Box<dyn std::error::Error>> {
    let db = ledger_db().await?;
    db.transaction(|tx| async move {
        tx.execute("INSERT INTO ledger (amount) VALUES (7)", &[]).await?;
        let meta = tx.run("UPDATE ledger SET amount = 8 WHERE amount = 7", &[]).await?;
        assert_eq!(meta.changes, 1);
        Ok(())
    })
    .await?;
    assert_eq!(ledger_count(&db).await?, 1);
    Ok(())
}
