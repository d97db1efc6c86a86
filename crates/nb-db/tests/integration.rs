use nb_db::rusqlite::types::Value;
use nb_db::{create_pool, run_migrations, Db, DbRuntimeSettings, ExecutorSettings, IndexKey};

fn migrated_db() -> Db {
    let pool = create_pool(
        nb_db::IN_MEMORY,
        DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 1,
        },
    )
    .expect("failed to create pool");
    let mut db = Db::new(pool, ExecutorSettings::default());
    let applied = run_migrations(db.connection().expect("failed to get connection"))
        .expect("failed to run migrations");
    assert_eq!(applied, 6);
    db
}

#[test]
fn schema_has_every_table() {
    let mut db = migrated_db();
    let tables = db
        .get_rows(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            &[],
        )
        .expect("failed to list tables");

    // 41 entity tables plus the migration tracker.
    assert_eq!(tables.len(), 42);
    assert!(tables.contains(&vec![Value::Text("base_replyrating".to_string())]));
    assert!(tables.contains(&vec![Value::Text("base_ondemandinfo".to_string())]));
}

#[test]
fn membership_rows_index_by_ensemble() {
    let mut db = migrated_db();
    db.execute(
        "INSERT INTO base_user (id, email) VALUES (1, 'a@x.org'), (2, 'b@x.org'), (3, 'c@x.org')",
        &[],
    )
    .expect("users");
    db.execute(
        "INSERT INTO base_ensemble (id, name) VALUES (10, 'physics'), (20, 'poetry')",
        &[],
    )
    .expect("ensembles");
    db.execute(
        "INSERT INTO base_membership (user_id, ensemble_id) VALUES (1, 10), (2, 20), (3, 10)",
        &[],
    )
    .expect("memberships");

    let indexed = db
        .get_indexed_rows(
            "SELECT ensemble_id, user_id FROM base_membership ORDER BY id",
            &[],
        )
        .expect("indexed query");

    let physics: Vec<_> = indexed[&IndexKey::from(10)].iter().map(|r| r[1].clone()).collect();
    assert_eq!(physics, vec![Value::Integer(1), Value::Integer(3)]);
    assert_eq!(indexed[&IndexKey::from(20)].len(), 1);
}

#[test]
fn duplicate_membership_is_a_driver_error() {
    let mut db = migrated_db();
    db.execute("INSERT INTO base_user (id, email) VALUES (1, 'a@x.org')", &[])
        .expect("user");
    db.execute("INSERT INTO base_ensemble (id, name) VALUES (1, 'e')", &[])
        .expect("ensemble");
    let insert = "INSERT INTO base_membership (user_id, ensemble_id) VALUES (?, ?)";
    db.execute(insert, &[&1i64, &1i64]).expect("first membership");

    let err = db
        .execute(insert, &[&1i64, &1i64])
        .expect_err("second membership should violate the unique index");
    assert!(matches!(err, nb_db::DbError::Driver(_)));
}

#[test]
fn deleting_an_ensemble_cascades() {
    let mut db = migrated_db();
    db.execute("INSERT INTO base_ensemble (id, name) VALUES (1, 'e')", &[])
        .expect("ensemble");
    db.execute("INSERT INTO base_section (name, ensemble_id) VALUES ('A', 1)", &[])
        .expect("section");
    db.execute("DELETE FROM base_ensemble WHERE id = 1", &[])
        .expect("delete");

    let sections = db
        .get_val("SELECT COUNT(*) FROM base_section", &[])
        .expect("count");
    assert_eq!(sections, Some(Value::Integer(0)));
}

/// The ON DELETE action of the foreign key `column` in `table`.
fn on_delete(db: &mut Db, table: &str, column: &str) -> String {
    let val = db
        .get_val(
            "SELECT on_delete FROM pragma_foreign_key_list(?) WHERE \"from\" = ?",
            &[&table, &column],
        )
        .expect("failed to read foreign keys");
    match val {
        Some(Value::Text(action)) => action,
        other => panic!("{table}.{column} is not a foreign key: {other:?}"),
    }
}

/// Whether `column` of `table` is declared NOT NULL.
fn not_null(db: &mut Db, table: &str, column: &str) -> bool {
    let val = db
        .get_val(
            "SELECT \"notnull\" FROM pragma_table_info(?) WHERE name = ?",
            &[&table, &column],
        )
        .expect("failed to read columns");
    match val {
        Some(Value::Integer(flag)) => flag == 1,
        other => panic!("{table}.{column} does not exist: {other:?}"),
    }
}

fn column_default(db: &mut Db, table: &str, column: &str) -> Option<Value> {
    db.get_val(
        "SELECT dflt_value FROM pragma_table_info(?) WHERE name = ?",
        &[&table, &column],
    )
    .expect("failed to read columns")
}

#[test]
fn delete_rules_match_existing_databases() {
    let mut db = migrated_db();
    let expected = [
        ("base_comment", "parent_id", "SET NULL"),
        ("base_tag", "individual_id", "SET NULL"),
        ("base_pageseen", "user_id", "SET NULL"),
        ("base_analyticsvisit", "user_id", "SET NULL"),
        ("base_analyticsclick", "user_id", "SET NULL"),
        ("base_landing", "user_id", "CASCADE"),
        ("base_invite", "section_id", "CASCADE"),
        ("base_commentlabel", "grader_id", "CASCADE"),
        ("base_commentlabelhistory", "grader_id", "CASCADE"),
        ("base_ondemandinfo", "ensemble_id", "CASCADE"),
        ("base_ondemandinfo", "source_id", "CASCADE"),
    ];
    for (table, column, action) in expected {
        assert_eq!(on_delete(&mut db, table, column), action, "{table}.{column}");
    }
}

#[test]
fn nullable_columns_match_existing_databases() {
    let mut db = migrated_db();
    let nullable = [
        ("base_tag", "individual_id"),
        ("base_pageseen", "user_id"),
        ("base_analyticsvisit", "user_id"),
        ("base_analyticsclick", "user_id"),
        ("base_processqueue", "source_id"),
        ("base_html5info", "url"),
        ("base_youtubeinfo", "key"),
        ("base_notification", "atime"),
        ("base_tag", "last_reminder"),
    ];
    for (table, column) in nullable {
        assert!(!not_null(&mut db, table, column), "{table}.{column} should be nullable");
    }

    let required = [
        ("base_landing", "user_id"),
        ("base_location", "page"),
        ("base_location", "x"),
        ("base_location", "y"),
        ("base_location", "w"),
        ("base_location", "h"),
        ("base_sourceversion", "published"),
        ("base_tag", "type"),
    ];
    for (table, column) in required {
        assert!(not_null(&mut db, table, column), "{table}.{column} should be NOT NULL");
    }
}

#[test]
fn restored_columns_carry_their_defaults() {
    let mut db = migrated_db();
    let text = |s: &str| Some(Value::Text(s.to_string()));

    assert_eq!(
        column_default(&mut db, "base_ensemble", "description"),
        text("'No description available'")
    );
    assert_eq!(column_default(&mut db, "base_ensemble", "allow_tag_private"), text("1"));
    assert_eq!(column_default(&mut db, "base_source", "title"), text("'untitled'"));
    assert_eq!(column_default(&mut db, "base_location", "version"), text("1"));
    assert_eq!(column_default(&mut db, "base_labelcategory", "visibility"), text("2"));
    assert_eq!(column_default(&mut db, "base_labelcategory", "scope"), text("1"));

    let dropped = db
        .get_val(
            "SELECT COUNT(*) FROM pragma_table_info('base_ensemble') WHERE name = 'warn_anonymous'",
            &[],
        )
        .expect("failed to read columns");
    assert_eq!(dropped, Some(Value::Integer(0)));
}

#[test]
fn settings_start_empty() {
    let mut db = migrated_db();
    for table in ["base_defaultsetting", "base_settinglabel", "base_usersetting"] {
        let rows = db
            .get_val(&format!("SELECT COUNT(*) FROM {table}"), &[])
            .expect("failed to count");
        assert_eq!(rows, Some(Value::Integer(0)), "{table}");
    }
}

#[test]
fn comment_types_cover_tag_private() {
    let mut db = migrated_db();
    db.execute("INSERT INTO base_user (id, email) VALUES (1, 'a@x.org')", &[])
        .expect("user");
    db.execute("INSERT INTO base_ensemble (id, name) VALUES (1, 'physics')", &[])
        .expect("ensemble");
    db.execute("INSERT INTO base_source (id) VALUES (1)", &[])
        .expect("source");
    db.execute(
        "INSERT INTO base_location (id, source_id, ensemble_id, x, y, w, h, page) VALUES (1, 1, 1, 0, 0, 1, 1, 1)",
        &[],
    )
    .expect("location");

    for kind in 1..=4_i64 {
        db.execute(
            "INSERT INTO base_comment (location_id, author_id, body, type) VALUES (1, 1, 'x', ?)",
            &[&kind],
        )
        .unwrap_or_else(|e| panic!("type {kind} should be accepted: {e}"));
    }
    db.execute(
        "INSERT INTO base_comment (location_id, author_id, body, type) VALUES (1, 1, 'x', 5)",
        &[],
    )
    .expect_err("type 5 is out of range");
}

#[test]
fn deleting_a_grader_removes_their_labels() {
    let mut db = migrated_db();
    db.execute(
        "INSERT INTO base_user (id, email) VALUES (1, 'author@x.org'), (2, 'grader@x.org')",
        &[],
    )
    .expect("users");
    db.execute("INSERT INTO base_ensemble (id, name) VALUES (1, 'physics')", &[])
        .expect("ensemble");
    db.execute("INSERT INTO base_source (id) VALUES (1)", &[])
        .expect("source");
    db.execute(
        "INSERT INTO base_location (id, source_id, ensemble_id, x, y, w, h, page) VALUES (1, 1, 1, 0, 0, 1, 1, 1)",
        &[],
    )
    .expect("location");
    db.execute(
        "INSERT INTO base_comment (id, location_id, author_id, body, type) VALUES (1, 1, 1, 'x', 3)",
        &[],
    )
    .expect("comment");
    db.execute(
        "INSERT INTO base_labelcategory (id, pointscale, name, ensemble_id) VALUES (1, 3, 'Depth', 1)",
        &[],
    )
    .expect("category");
    db.execute(
        "INSERT INTO base_commentlabel (grader_id, grade, category_id, comment_id) VALUES (2, 2, 1, 1)",
        &[],
    )
    .expect("label");
    db.execute(
        "INSERT INTO base_commentlabelhistory (grader_id, grade, category_id, comment_id) VALUES (2, 2, 1, 1)",
        &[],
    )
    .expect("label history");

    db.execute("DELETE FROM base_user WHERE id = 2", &[])
        .expect("grader delete should cascade");

    for table in ["base_commentlabel", "base_commentlabelhistory"] {
        let rows = db
            .get_val(&format!("SELECT COUNT(*) FROM {table}"), &[])
            .expect("failed to count");
        assert_eq!(rows, Some(Value::Integer(0)), "{table}");
    }
}
