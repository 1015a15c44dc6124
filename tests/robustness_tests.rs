use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_malformed_csv_handling() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("robustness_test.csv");
    let mut wtr = csv::Writer::from_path(&input).unwrap();
    wtr.write_record(["type", "from", "to", "amount", "owner", "currency"])
        .unwrap();

    wtr.write_record(["open", "", "", "100", "alice", "USD"]).unwrap();
    wtr.write_record(["open", "", "", "0", "bob", "USD"]).unwrap();
    // Unknown command type
    wtr.write_record(["withdraw", "1", "2", "10", "", ""]).unwrap();
    // Transfer without an amount
    wtr.write_record(["transfer", "1", "2", "", "", ""]).unwrap();
    // Open without an owner
    wtr.write_record(["open", "", "", "10", "", "USD"]).unwrap();
    wtr.write_record(["transfer", "1", "2", "40", "", ""]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("ledger-engine"));
    cmd.arg(&input);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stdout(predicate::str::contains("1,alice,USD,60"))
        .stdout(predicate::str::contains("2,bob,USD,40"))
        .stdout(predicate::str::contains("3,").not());
}

#[test]
fn test_invalid_data_types() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("data_type_test.csv");
    let mut wtr = csv::Writer::from_path(&input).unwrap();
    wtr.write_record(["type", "from", "to", "amount", "owner", "currency"])
        .unwrap();

    wtr.write_record(["open", "", "", "50", "alice", "USD"]).unwrap();
    wtr.write_record(["open", "", "", "50", "bob", "USD"]).unwrap();
    // Fractional minor units
    wtr.write_record(["transfer", "1", "2", "1.5", "", ""]).unwrap();
    // Non-integer account id
    wtr.write_record(["transfer", "abc", "2", "5", "", ""]).unwrap();
    wtr.write_record(["transfer", "2", "1", "5", "", ""]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("ledger-engine"));
    cmd.arg(&input);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stdout(predicate::str::contains("1,alice,USD,55"))
        .stdout(predicate::str::contains("2,bob,USD,45"));
}

#[test]
fn test_rejected_transfers_keep_processing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("rejections.csv");
    let mut wtr = csv::Writer::from_path(&input).unwrap();
    wtr.write_record(["type", "from", "to", "amount", "owner", "currency"])
        .unwrap();

    wtr.write_record(["open", "", "", "10", "alice", "USD"]).unwrap();
    wtr.write_record(["open", "", "", "10", "bob", "USD"]).unwrap();
    // Same account on both sides
    wtr.write_record(["transfer", "1", "1", "5", "", ""]).unwrap();
    // Non-positive amounts
    wtr.write_record(["transfer", "1", "2", "0", "", ""]).unwrap();
    wtr.write_record(["transfer", "1", "2", "-5", "", ""]).unwrap();
    // Negative opening balance
    wtr.write_record(["open", "", "", "-1", "mallory", "USD"]).unwrap();
    // i64 overflow on the receiving side is rejected, not wrapped
    wtr.write_record(["open", "", "", &i64::MAX.to_string(), "whale", "USD"])
        .unwrap();
    wtr.write_record(["transfer", "1", "3", "5", "", ""]).unwrap();
    wtr.write_record(["transfer", "2", "1", "10", "", ""]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("ledger-engine"));
    cmd.arg(&input);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Validation error"))
        .stdout(predicate::str::contains("1,alice,USD,20"))
        .stdout(predicate::str::contains("2,bob,USD,0"))
        .stdout(predicate::str::contains(format!("3,whale,USD,{}", i64::MAX)))
        .stdout(predicate::str::contains("mallory").not());
}
