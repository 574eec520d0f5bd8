mod common;

use assert_cmd::Command;
use common::{CANARA_DDL, TestWorkspace};
use predicates::{prelude::*, str::contains};

const JOB: &str = "table: CANARA
database: reports.db
source_root: sheets
month_column: Data_Month
mapping:
  \"Data Month\": Data_Month
  Channel: Channel
  TotalAlert: TotalAlert
  \"Total Amount Saved\": Total_Amount_Saved
  \"Scenario Last Modified date\": Scenario_Last_Modified_date
sources:
  - spreadsheet: Clari5_Wisdom_data-Jan-25
  - spreadsheet: Clari5_Wisdom_data-Jun-25
";

fn seeded() -> TestWorkspace {
    let ws = TestWorkspace::new();
    ws.create_database(CANARA_DDL);
    ws.write_sheet(
        "Clari5_Wisdom_data-Jan-25",
        "CANARA",
        "Data Month,Channel,TotalAlert,Total Amount Saved,Scenario Last Modified date\n\
         Jan-25,ATM,\"1,234\",,2025-01-15\n\
         Jan-25,UPI,5,10.5,\n",
    );
    ws.write("job.yaml", JOB);
    ws
}

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("report-etl").expect("binary exists");
    cmd.env("RUST_LOG", "report_etl=info");
    cmd
}

#[test]
fn load_inserts_rows_and_skips_missing_sheet() {
    let ws = seeded();
    bin()
        .args(["load", "--job"])
        .arg(ws.path().join("job.yaml"))
        .assert()
        .success()
        .stdout(contains("inserted"))
        .stdout(contains("skipped"))
        .stderr(contains("Clari5_Wisdom_data-Jun-25"));

    assert_eq!(
        ws.query_strings(
            "SELECT Channel, TotalAlert, Total_Amount_Saved FROM CANARA ORDER BY rowid"
        ),
        vec![vec!["ATM", "1234", "0"], vec!["UPI", "5", "10.5"]]
    );
}

#[test]
fn dry_run_leaves_destination_untouched() {
    let ws = seeded();
    bin()
        .args(["load", "--dry-run", "--job"])
        .arg(ws.path().join("job.yaml"))
        .assert()
        .success()
        .stdout(contains("dry-run"));
    assert!(ws.query_strings("SELECT * FROM CANARA").is_empty());
}

#[test]
fn dry_run_reports_statement_in_job_paramstyle() {
    let ws = seeded();
    let job = ws.write("mysql.yaml", &format!("paramstyle: format\n{JOB}"));
    bin()
        .args(["load", "--dry-run", "--job"])
        .arg(job)
        .assert()
        .success()
        .stdout(contains("INSERT INTO `CANARA`"))
        .stdout(contains("VALUES (%s, %s, %s, %s, %s)"));
}

#[test]
fn load_fails_when_database_is_missing() {
    let ws = seeded();
    bin()
        .args(["load", "--job"])
        .arg(ws.path().join("job.yaml"))
        .arg("--database")
        .arg(ws.path().join("nowhere.db"))
        .assert()
        .code(1)
        .stderr(contains("Connecting to database"));
}

#[test]
fn load_rejects_invalid_job_file() {
    let ws = TestWorkspace::new();
    let job = ws.write("job.yaml", "table: CANARA\nunknown_key: 1\n");
    bin()
        .args(["load", "--job"])
        .arg(job)
        .assert()
        .code(1)
        .stderr(contains("error:"));
}

#[test]
fn schema_lists_normalised_tags() {
    let ws = seeded();
    bin()
        .args(["schema", "--table", "CANARA", "--database"])
        .arg(ws.path().join("reports.db"))
        .assert()
        .success()
        .stdout(contains("Total_Amount_Saved"))
        .stdout(contains("DECIMAL(14,2)"))
        .stdout(contains("VARCHAR"));
}

#[test]
fn schema_json_is_machine_readable() {
    let ws = seeded();
    let output = bin()
        .args(["schema", "--json", "--table", "CANARA", "--database"])
        .arg(ws.path().join("reports.db"))
        .output()
        .expect("run schema");
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let names = parsed
        .as_array()
        .expect("array")
        .iter()
        .map(|c| c["name"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "Data_Month",
            "Channel",
            "TotalAlert",
            "Total_Amount_Saved",
            "Scenario_Last_Modified_date"
        ]
    );
}

#[test]
fn preview_prints_coerced_rows() {
    let ws = seeded();
    bin()
        .args(["preview", "--rows", "1", "--job"])
        .arg(ws.path().join("job.yaml"))
        .assert()
        .success()
        .stdout(contains("== Clari5_Wisdom_data-Jan-25 / CANARA =="))
        .stdout(contains("1234"))
        .stdout(contains("UPI").not());
    assert!(ws.query_strings("SELECT * FROM CANARA").is_empty());
}
