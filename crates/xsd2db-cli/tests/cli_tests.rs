//! CLI integration tests for xsd2db.
//!
//! These tests verify command-line argument parsing, help output,
//! exit codes for error conditions and the engines that need no server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Get a command for the xsd2db binary.
fn cmd() -> Command {
    Command::cargo_bin("xsd2db").unwrap()
}

const MASTER_DETAIL_XSD: &str = r#"<?xml version="1.0" standalone="yes"?>
<xs:schema id="Xsd2DbTest" xmlns="" xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:msdata="urn:schemas-microsoft-com:xml-msdata">
  <xs:element name="Xsd2DbTest" msdata:IsDataSet="true">
    <xs:complexType>
      <xs:choice maxOccurs="unbounded">
        <xs:element name="Master">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="MasterID" msdata:DataType="System.Guid, mscorlib" type="xs:string" />
              <xs:element name="UniqueText" minOccurs="0">
                <xs:simpleType>
                  <xs:restriction base="xs:string">
                    <xs:maxLength value="80" />
                  </xs:restriction>
                </xs:simpleType>
              </xs:element>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
        <xs:element name="Detail">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="DetailID" msdata:DataType="System.Guid, mscorlib" type="xs:string" />
              <xs:element name="MasterID_FK" msdata:DataType="System.Guid, mscorlib" type="xs:string" minOccurs="0" />
            </xs:sequence>
          </xs:complexType>
        </xs:element>
      </xs:choice>
    </xs:complexType>
    <xs:unique name="Constraint1" msdata:PrimaryKey="true">
      <xs:selector xpath=".//Master" />
      <xs:field xpath="MasterID" />
    </xs:unique>
    <xs:unique name="Detail_Constraint1" msdata:PrimaryKey="true">
      <xs:selector xpath=".//Detail" />
      <xs:field xpath="DetailID" />
    </xs:unique>
    <xs:keyref name="MasterDetail" refer="Constraint1">
      <xs:selector xpath=".//Detail" />
      <xs:field xpath="MasterID_FK" />
    </xs:keyref>
  </xs:element>
</xs:schema>"#;

fn write_schema(dir: &Path) -> PathBuf {
    let path = dir.join("masterdetail.xsd");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(MASTER_DETAIL_XSD.as_bytes()).unwrap();
    path
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_schema_options() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--schema"))
        .stdout(predicate::str::contains("--type"))
        .stdout(predicate::str::contains("--location"))
        .stdout(predicate::str::contains("--dbowner"))
        .stdout(predicate::str::contains("--tableprefix"))
        .stdout(predicate::str::contains("--existing"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("xsd2db"));
}

#[test]
fn test_log_format_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_unknown_flag_is_parse_error() {
    cmd().arg("--no-such-flag").assert().failure().code(2);
}

#[test]
fn test_missing_schema_file() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["-t", "jet", "-s"])
        .arg(dir.path().join("missing"))
        .assert()
        .failure()
        .code(6)
        .stderr(predicate::str::contains("File not found:"))
        .stderr(predicate::str::contains("missing.xsd"));
}

#[test]
fn test_missing_type_prints_instructions() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    cmd()
        .arg("-s")
        .arg(&schema)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("-- Error --"))
        .stderr(predicate::str::contains("-- Instructions --"));
}

#[test]
fn test_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    cmd()
        .args(["-t", "oracle", "-s"])
        .arg(&schema)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown engine type 'oracle'"));
}

#[test]
fn test_oledb_is_not_supported() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    cmd()
        .args(["-t", "oledb", "-s"])
        .arg(&schema)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("OleDb"));
}

#[test]
fn test_sql_requires_location() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    cmd()
        .args(["-t", "sql", "-s"])
        .arg(&schema)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("target.location"));
}

#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    let config = dir.path().join("bad.yaml");
    std::fs::write(&config, "target: [not, a, map]\n").unwrap();

    cmd()
        .arg("-c")
        .arg(&config)
        .arg("-s")
        .arg(&schema)
        .assert()
        .failure()
        .code(1);
}

// =============================================================================
// Script Output Tests
// =============================================================================

#[test]
fn test_script_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    cmd()
        .args(["-t", "sql", "--script", "-", "-p", "app_", "-s"])
        .arg(&schema)
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE DATABASE [Xsd2DbTest]"))
        .stdout(predicate::str::contains("USE [Xsd2DbTest];"))
        .stdout(predicate::str::contains("CREATE TABLE [dbo].[app_Master]"))
        .stdout(predicate::str::contains("[PK_app_Master] PRIMARY KEY CLUSTERED ([MasterID])"))
        .stdout(predicate::str::contains("ON DELETE CASCADE ON UPDATE NO ACTION"))
        .stdout(predicate::str::contains("\nGO\n"));
}

#[test]
fn test_script_existing_skips_create_database() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    let out = dir.path().join("out.sql");
    cmd()
        .args(["-t", "sql", "-e", "-n", "Other", "-s"])
        .arg(&schema)
        .arg("--script")
        .arg(&out)
        .assert()
        .success();

    let script = std::fs::read_to_string(&out).unwrap();
    assert!(!script.contains("CREATE DATABASE"));
    assert!(script.starts_with("USE [Other];"));
}

#[test]
fn test_script_requires_sql() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    cmd()
        .args(["-t", "jet", "--script", "-", "-s"])
        .arg(&schema)
        .assert()
        .failure()
        .code(1);
}

// =============================================================================
// Jet Catalog Tests
// =============================================================================

#[test]
fn test_jet_creates_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    cmd()
        .args(["-t", "jet", "-l"])
        .arg(dir.path())
        .arg("-s")
        .arg(&schema)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tables: 2"))
        .stdout(predicate::str::contains("Relations: 1"));

    assert!(dir.path().join("xsd2dbtest.jet.json").is_file());
    assert!(!dir.path().join("xsd2dbtest.jet.lock").exists());
}

#[test]
fn test_jet_output_json() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    let output = cmd()
        .args(["-t", "jet", "--output-json", "-n", "Renamed", "-l"])
        .arg(dir.path())
        .arg("-s")
        .arg(&schema)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["engine"], "jet");
    assert_eq!(report["tables_created"], 2);
    assert_eq!(report["primary_keys_created"], 2);
    assert!(dir.path().join("renamed.jet.json").is_file());
}

#[test]
fn test_jet_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_schema(dir.path());
    for _ in 0..2 {
        cmd()
            .args(["-t", "jet", "-l"])
            .arg(dir.path())
            .arg("-s")
            .arg(&schema)
            .assert()
            .success();
    }
    cmd()
        .args(["-t", "jet", "-f", "-l"])
        .arg(dir.path())
        .arg("-s")
        .arg(&schema)
        .assert()
        .success()
        .stdout(predicate::str::contains("Database: created"));
}
