use sqlite_bridge::prelude::*;

async fn seeded_db() -> Result<Database, BridgeError> {
    let db = Database::new(DbConfig::in_memory());
    db.execute("CREATE TABLE user (id INTEGER PRIMARY KEY, name TEXT)", &[])
        .await?;
    Ok(db)
}

#[tokio::test]
async fn run_reports_changes_and_matching_rowid() -> Result<(), Box<dyn std::error::Error>> {
    let db = seeded_db().await?;
    let meta = db
        .run(
            "INSERT INTO user (name) VALUES (?1)",
            &[SqlValue::Text("ada".into())],
        )
        .await?;
    assert_eq!(meta.changes, 1);
    let id = meta.last_insert_row_id.expect("positive changes carry a rowid");

    // The engine agrees with what run reported.
    let rows = db.query("SELECT last_insert_rowid() AS id", &[]).await?;
    assert_eq!(rows[0].get("id"), Some(&SqlValue::Integer(id)));
    Ok(())
}

#[tokio::test]
async fn run_without_changes_omits_rowid() -> Result<(), Box<dyn std::error::Error>> {
    let db = seeded_db().await?;
    let meta = db
        .run("UPDATE user SET name = 'none' WHERE id = 12345", &[])
        .await?;
    assert_eq!(meta.changes, 0);
    assert_eq!(meta.last_insert_row_id, None);
    Ok(())
}

#[tokio::test]
async fn run_counts_multi_row_updates() -> Result<(), Box<dyn std::error::Error>> {
    let db = seeded_db().await?;
    db.execute("INSERT INTO user (name) VALUES ('a'), ('b'), ('c')", &[])
        .await?;
    let meta = db.run("UPDATE user SET name = upper(name)", &[]).await?;
    assert_eq!(meta.changes, 3);
    Ok(())
}
