use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/scenario.csv").arg("--score").arg("700");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "payment,application,user,amount,currency,status,installments,scheduled",
        ))
        // Settled payment carries a six-installment schedule
        .stdout(predicate::str::contains("1,1,alice,40.00,USD,SUCCESSFUL,6,40.00"))
        // First webhook wins; the later SUCCESSFUL is refused
        .stdout(predicate::str::contains("2,1,alice,15.00,USD,FAILED,0,0.00"))
        .stderr(predicate::str::contains(
            "Error processing command: Insufficient credit: requested 7000, available 6000",
        ))
        .stderr(predicate::str::contains("Error processing command: payment 2 is already FAILED"))
        .stderr(predicate::str::contains("Error reading command"));

    Ok(())
}

#[test]
fn test_cli_rejected_application() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut csv,
        b"op,id,user,amount,currency,method,status,term\n\
          apply,,bob,500,USD,,,\n\
          decide,1,,,,,,\n\
          pay,1,bob,100,USD,card,,\n",
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("creditline"));
    cmd.arg(csv.path()).arg("--score").arg("649");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("is REJECTED; cannot accept payments"))
        .stdout(predicate::str::diff(
            "payment,application,user,amount,currency,status,installments,scheduled\n",
        ));
}

#[test]
fn test_cli_config_file() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut config,
        br#"{"approval_threshold": 800, "settlement_delay_secs": 1}"#,
    )
    .unwrap();
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut csv,
        b"op,id,user,amount,currency,method,status,term\n\
          apply,,carol,500,USD,,,\n\
          decide,1,,,,,,\n\
          pay,1,carol,100,USD,card,,\n",
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("creditline"));
    cmd.arg(csv.path())
        .arg("--score")
        .arg("750")
        .arg("--config")
        .arg(config.path());

    // 750 clears the default threshold but not the configured one
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("is REJECTED"));
}

#[test]
fn test_cli_invalid_config_fails() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut config, br#"{"approval_threshold": 9000}"#).unwrap();

    let mut cmd = Command::new(cargo_bin!("creditline"));
    cmd.arg("tests/fixtures/scenario.csv")
        .arg("--config")
        .arg(config.path());

    cmd.assert().failure();
}

#[test]
fn test_cli_wall_clock_settles_in_background() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut config, br#"{"settlement_delay_secs": 0}"#).unwrap();
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut csv,
        b"op,id,user,amount,currency,method,status,term\n\
          apply,,dave,5000,USD,,,\n\
          decide,1,,,,,,\n\
          pay,1,dave,1200,USD,card,,\n\
          settle,,,,,,,\n",
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("creditline"));
    cmd.arg(csv.path())
        .arg("--score")
        .arg("700")
        .arg("--wall-clock")
        .arg("--config")
        .arg(config.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,1,dave,12.00,USD,SUCCESSFUL,6,12.00"));
}
