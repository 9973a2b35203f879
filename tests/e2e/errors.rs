use serial_test::serial;

use crate::harness::{combined, TestHarness};

#[test]
#[serial]
fn test_cli_missing_org() {
    let h = TestHarness::new("err_no_org");
    let project = h.project_path();

    for args in [
        vec!["up", "web", "--dir", project.to_str().unwrap()],
        vec!["destroy", "web", "--yes"],
        vec!["get"],
    ] {
        let output = h.run_cli(&args);
        assert!(!output.status.success(), "{:?} should fail without an org", args);
        let text = combined(&output);
        assert!(
            text.contains("must specify pulumi org"),
            "expected org error for {:?}.\nOutput:\n{}",
            args,
            text
        );
    }
}

#[test]
#[serial]
fn test_cli_engine_not_installed() {
    let h = TestHarness::new("err_no_engine");
    h.write_config("org = \"acme\"\npulumi_bin = \"/nonexistent/pulumi\"\n");

    let output = h.run_cli(&["get"]);
    assert!(!output.status.success());
    assert!(
        combined(&output).contains("pulumi CLI not found"),
        "expected install hint.\nOutput:\n{}",
        combined(&output)
    );
}

#[test]
#[serial]
fn test_cli_up_without_dockerfile() {
    let h = TestHarness::new("err_no_dockerfile");
    h.write_config("org = \"acme\"\n");

    let output = h.run_cli(&["up", "web", "--dir", h.home().to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(
        combined(&output).contains("No Dockerfile"),
        "expected Dockerfile error.\nOutput:\n{}",
        combined(&output)
    );
}

#[test]
#[serial]
fn test_cli_bad_config_file() {
    let h = TestHarness::new("err_bad_config");
    h.write_config("org = [");

    let output = h.run_cli(&["get"]);
    assert!(!output.status.success());
    assert!(
        combined(&output).contains("config.toml"),
        "expected the config path in the error.\nOutput:\n{}",
        combined(&output)
    );
}
