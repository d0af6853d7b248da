mod common;

use csv2pg::{
    data::Value,
    db::postgres::parameter_types,
    error::ImportError,
    loader::{LoadOutcome, LoadStage, Loader, TruncateOutcome},
    pipeline::prepare,
    schema::SqlType,
};
use tokio_postgres::types::Type;

use common::{ScriptedDatabase, TestWorkspace, load_config, ten_rows_with_gap_at_five};

fn output_text(buf: &[u8]) -> String {
    String::from_utf8(buf.to_vec()).expect("utf-8 output")
}

#[test]
fn row_checked_failure_rolls_back_everything_and_stops() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("people.csv", &ten_rows_with_gap_at_five());
    let config = load_config(&csv, |c| {
        c.insert_data = true;
        c.row_error_check = true;
    });
    let prepared = prepare(&config).expect("prepare");
    let mut db = ScriptedDatabase::new().with_not_null(1);
    let mut out = Vec::new();

    let outcome = Loader::new(
        &mut db,
        &config,
        prepared.statements(&config),
        |_: &str| true,
        &mut out,
    )
    .run(&prepared.table.records);

    match outcome {
        LoadOutcome::RolledBack { stage, error } => {
            assert_eq!(stage, LoadStage::RowsLoading);
            assert!(matches!(error, ImportError::RowLoad { row: 5, .. }));
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert!(db.committed.is_empty());
    assert_eq!(db.pending_rows(), 0);
    assert_eq!(db.rows_attempted, 5);
    assert_eq!(db.executed.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!db.saw("COMMIT"));

    let text = output_text(&out);
    assert!(text.contains("row 5 could not be inserted"));
    assert!(text.contains("Transaction rolled back due to error."));
}

#[test]
fn batch_failure_commits_nothing() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("people.csv", &ten_rows_with_gap_at_five());
    let config = load_config(&csv, |c| {
        c.insert_data = true;
        c.row_error_check = false;
    });
    let prepared = prepare(&config).expect("prepare");
    let mut db = ScriptedDatabase::new().with_not_null(1);
    let mut out = Vec::new();

    let outcome = Loader::new(
        &mut db,
        &config,
        prepared.statements(&config),
        |_: &str| true,
        &mut out,
    )
    .run(&prepared.table.records);

    match outcome {
        LoadOutcome::RolledBack { error, .. } => {
            assert!(matches!(error, ImportError::BatchLoad { rows: 10, .. }));
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(db.insert_calls, 1);
    assert_eq!(db.rows_attempted, 10);
    assert!(db.committed.is_empty());
}

#[test]
fn batch_success_submits_one_statement_in_file_order() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("scores.csv", "id,score\n1,1.5\n2,\n3,2.25\n");
    let config = load_config(&csv, |c| {
        c.insert_data = true;
        c.row_error_check = false;
    });
    let prepared = prepare(&config).expect("prepare");
    let mut db = ScriptedDatabase::new();
    let mut out = Vec::new();

    let outcome = Loader::new(
        &mut db,
        &config,
        prepared.statements(&config),
        |_: &str| true,
        &mut out,
    )
    .run(&prepared.table.records);

    match outcome {
        LoadOutcome::Committed(summary) => {
            assert_eq!(summary.rows_inserted, 3);
            assert!(summary.table_created);
        }
        other => panic!("expected commit, got {other:?}"),
    }
    assert_eq!(db.insert_calls, 1);
    assert_eq!(
        db.executed,
        vec![
            "BEGIN".to_string(),
            "CREATE TABLE \"public\".\"scores\" (\n\"id\" INTEGER,\n\"score\" REAL);".to_string(),
            "INSERT INTO \"public\".\"scores\" (\"id\", \"score\") VALUES ($1, $2), ($3, $4), ($5, $6)"
                .to_string(),
            "COMMIT".to_string(),
        ]
    );
    let ids: Vec<Value> = db.committed.iter().map(|row| row[0].clone()).collect();
    assert_eq!(
        ids,
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
    );
    assert_eq!(db.committed[1][1], Value::Null);
    assert!(output_text(&out).ends_with("Done\n"));
}

#[test]
fn row_checked_success_prints_progress_bar() {
    let workspace = TestWorkspace::new();
    let mut contents = String::from("n\n");
    for n in 0..20 {
        contents.push_str(&format!("{n}\n"));
    }
    let csv = workspace.write("numbers.csv", &contents);
    let config = load_config(&csv, |c| c.insert_data = true);
    let prepared = prepare(&config).expect("prepare");
    let mut db = ScriptedDatabase::new();
    let mut out = Vec::new();

    let outcome = Loader::new(
        &mut db,
        &config,
        prepared.statements(&config),
        |_: &str| true,
        &mut out,
    )
    .run(&prepared.table.records);

    assert!(outcome.is_committed());
    assert_eq!(db.insert_calls, 20);
    assert_eq!(db.committed.len(), 20);
    let text = output_text(&out);
    assert!(text.starts_with("Inserting rows\n[          ]\r[..........]\n"));
    assert!(text.ends_with("Done\n"));
}

#[test]
fn create_table_failure_is_terminal() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("dup.csv", "a\n1\n");
    let config = load_config(&csv, |c| c.insert_data = true);
    let prepared = prepare(&config).expect("prepare");
    let mut db = ScriptedDatabase::new().failing_on("CREATE TABLE");
    let mut out = Vec::new();

    let outcome = Loader::new(
        &mut db,
        &config,
        prepared.statements(&config),
        |_: &str| true,
        &mut out,
    )
    .run(&prepared.table.records);

    match outcome {
        LoadOutcome::RolledBack { stage, error } => {
            assert_eq!(stage, LoadStage::TableCreated);
            assert!(matches!(error, ImportError::SchemaCreation { .. }));
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(db.insert_calls, 0);
    assert_eq!(db.executed.last().map(String::as_str), Some("ROLLBACK"));
}

#[test]
fn declined_delete_is_skipped_and_load_continues() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("keep.csv", "a\n1\n2\n");
    let config = load_config(&csv, |c| {
        c.create_table = false;
        c.delete_data = true;
        c.insert_data = true;
    });
    let prepared = prepare(&config).expect("prepare");
    let mut db = ScriptedDatabase::new();
    let mut asked = Vec::new();
    let mut out = Vec::new();

    let outcome = Loader::new(
        &mut db,
        &config,
        prepared.statements(&config),
        |statement: &str| {
            asked.push(statement.to_string());
            false
        },
        &mut out,
    )
    .run(&prepared.table.records);

    match outcome {
        LoadOutcome::Committed(summary) => {
            assert_eq!(summary.truncate, TruncateOutcome::Declined);
            assert_eq!(summary.rows_inserted, 2);
        }
        other => panic!("expected commit, got {other:?}"),
    }
    assert_eq!(asked, vec!["DELETE FROM \"public\".\"keep\";"]);
    assert!(!db.saw("DELETE FROM \"public\".\"keep\";"));
}

#[test]
fn confirmed_delete_runs_inside_the_transaction() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("wipe.csv", "a\n1\n");
    let config = load_config(&csv, |c| {
        c.create_table = false;
        c.delete_data = true;
    });
    let prepared = prepare(&config).expect("prepare");
    let mut db = ScriptedDatabase::new();
    let mut out = Vec::new();

    let outcome = Loader::new(
        &mut db,
        &config,
        prepared.statements(&config),
        |_: &str| true,
        &mut out,
    )
    .run(&prepared.table.records);

    match outcome {
        LoadOutcome::Committed(summary) => {
            assert_eq!(summary.truncate, TruncateOutcome::Deleted);
            assert_eq!(summary.rows_inserted, 0);
        }
        other => panic!("expected commit, got {other:?}"),
    }
    assert_eq!(
        db.executed,
        vec!["BEGIN", "DELETE FROM \"public\".\"wipe\";", "COMMIT"]
    );
}

#[test]
fn out_of_sample_values_are_forwarded_as_text() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("late.csv", "qty\n1\n2\nlots\n");
    let config = load_config(&csv, |c| {
        c.insert_data = true;
        c.sample_size = 2;
    });
    let prepared = prepare(&config).expect("prepare");
    let mut out = Vec::new();
    let mut db = ScriptedDatabase::new();

    let outcome = Loader::new(
        &mut db,
        &config,
        prepared.statements(&config),
        |_: &str| true,
        &mut out,
    )
    .run(&prepared.table.records);

    assert!(outcome.is_committed());
    assert_eq!(db.committed[2][0], Value::Text("lots".to_string()));
}

#[test]
fn reload_into_existing_table_binds_inferred_parameter_types() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write(
        "events.csv",
        "id,amount,seen_on\n1,2.5,2024-01-05\n2,,2024-01-06\n",
    );
    let config = load_config(&csv, |c| {
        c.create_table = false;
        c.insert_data = true;
        c.row_error_check = false;
    });
    let prepared = prepare(&config).expect("prepare");
    let statements = prepared.statements(&config);
    let mut db = ScriptedDatabase::new();
    let mut out = Vec::new();

    let outcome = Loader::new(&mut db, &config, statements.clone(), |_: &str| true, &mut out)
        .run(&prepared.table.records);

    assert!(outcome.is_committed());
    assert!(!db.executed.iter().any(|sql| sql.starts_with("CREATE TABLE")));
    assert_eq!(
        db.bound_types,
        vec![vec![SqlType::Integer, SqlType::Real, SqlType::Date]]
    );
    assert_eq!(
        parameter_types(&statements.insert_many(2)),
        vec![
            Type::INT4,
            Type::FLOAT4,
            Type::DATE,
            Type::INT4,
            Type::FLOAT4,
            Type::DATE,
        ]
    );
}
