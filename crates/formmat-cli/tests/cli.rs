/// Command-line smoke tests against the bundled sample configurations

use std::path::PathBuf;
use std::process::Command;

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs").join(name)
}

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_formmat-cli"))
}

#[test]
fn test_assemble_prints_json_report() {
    let output = cli().arg("assemble").arg(sample("mass.json")).output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mat_type"], "aij");
    assert_eq!(report["has_bcs"], true);
    assert_eq!(report["values"][0][0], 1.0);
    assert!(report["generated_at"].is_string());
}

#[test]
fn test_matrix_free_solve_report() {
    let output = cli()
        .arg("assemble")
        .arg(sample("poisson_matfree.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mat_type"], "matfree");
    assert!(report["values"].is_null());
    let solution = report["solve"]["solution"].as_array().unwrap();
    assert_eq!(solution.len(), 33);
    let u: Vec<f64> = solution.iter().map(|v| v.as_f64().unwrap()).collect();
    assert_eq!(u[0], 0.0);
    assert_eq!(u[32], 0.0);
    for k in 0..=16 {
        assert!((u[k] - u[32 - k]).abs() < 1e-6 * u[16].abs(), "asymmetric at {}", k);
    }
}

#[test]
fn test_validate_and_usage() {
    let output = cli().arg("validate").arg(sample("mass.json")).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("3x3"));

    let output = cli().arg("assemble").output().unwrap();
    assert_eq!(output.status.code(), Some(2));

    let output = cli().arg("assemble").arg(sample("absent.json")).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let output = cli().arg("bogus").arg(sample("absent.json")).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage"));
}
