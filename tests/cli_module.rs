use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn run(args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_chatops-router"));
    cmd.args(args)
        .env_remove("CHATOPS_CONFIG")
        .env_remove("CHATOPS_CONFIRM_SECRET")
        .env("CHATOPS_LOG", "error");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().expect("run chatops-router")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn write_settings(dir: &Path) -> String {
    let path = dir.join("config.yaml");
    fs::write(
        &path,
        r#"
backend:
  base_url: http://127.0.0.1:9
roles:
  principals:
    admin@company.com: [ml_admin, viewer]
    viewer@company.com: [viewer]
"#,
    )
    .expect("write settings");
    path.display().to_string()
}

#[test]
fn check_config_lists_catalog() {
    let dir = tempdir().expect("tempdir");
    let config = write_settings(dir.path());

    let output = run(&["check-config", "--config", &config], &[]);

    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("commands: 11"));
    assert!(text.contains("deploy -> deploy [ml_admin, ml_engineer] (confirm)"));
}

#[test]
fn check_config_reads_path_from_environment() {
    let dir = tempdir().expect("tempdir");
    let config = write_settings(dir.path());

    let output = run(&["check-config"], &[("CHATOPS_CONFIG", &config)]);

    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
}

#[test]
fn invalid_config_exits_nonzero() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("config.yaml");
    fs::write(&config, "backend:\n  base_url: nope\n").expect("write");

    let output = run(&["check-config", "--config", &config.display().to_string()], &[]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("backend.base_url"));
}

#[test]
fn invoke_without_confirmation_secret_refuses_to_start() {
    let dir = tempdir().expect("tempdir");
    let config = write_settings(dir.path());

    let output = run(
        &["invoke", "--config", &config, "--principal", "viewer@company.com", "help"],
        &[],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("CHATOPS_CONFIRM_SECRET"));
}

#[test]
fn invoke_proposes_deploy_and_denies_viewer() {
    let dir = tempdir().expect("tempdir");
    let config = write_settings(dir.path());
    let secret = [("CHATOPS_CONFIRM_SECRET", "cli-test-secret")];

    let output = run(
        &[
            "invoke",
            "--config",
            &config,
            "--principal",
            "admin@company.com",
            "deploy",
            "model",
            "fraud-detector",
            "2.1",
        ],
        &secret,
    );
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    let reply: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("reply json");
    assert_eq!(reply["type"], "dispatched");
    assert_eq!(reply["confirmation"]["command"], "deploy");

    let output = run(
        &[
            "invoke",
            "--config",
            &config,
            "--principal",
            "viewer@company.com",
            "deploy",
            "model",
            "x",
            "1.0",
        ],
        &secret,
    );
    let reply: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("reply json");
    assert_eq!(reply["type"], "denied");
}

#[test]
fn check_links_exit_code_flag() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("README.md"), "[broken](nowhere.md)\n").expect("write");
    let directory = dir.path().display().to_string();

    let strict = run(&["check-links", "--directory", &directory, "--quiet", "--exit-code"], &[]);
    assert_eq!(strict.status.code(), Some(1));
    assert!(stdout(&strict).is_empty());

    let lenient = run(&["check-links", "--directory", &directory], &[]);
    assert!(lenient.status.success());
    assert!(stdout(&lenient).contains("# Documentation Link Validation Report"));
}
