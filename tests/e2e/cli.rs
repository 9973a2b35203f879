use serial_test::serial;

use crate::harness::{combined, TestHarness};

#[test]
#[serial]
fn test_cli_help_lists_commands() {
    let h = TestHarness::new("cli_help");

    let output = h.run_cli(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["up", "destroy", "get"] {
        assert!(
            stdout.contains(command),
            "help should mention {}.\nOutput:\n{}",
            command,
            stdout
        );
    }
}

#[test]
#[serial]
fn test_cli_destroy_declined() {
    let h = TestHarness::new("cli_destroy_declined");
    h.write_config("org = \"acme\"\npulumi_bin = \"/nonexistent/pulumi\"\n");

    let output = h.run_cli_with_input(&["destroy", "web"], "n\n");
    assert!(
        output.status.success(),
        "declining should exit 0: {}",
        combined(&output)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Are you sure"), "prompt missing:\n{}", stdout);
    assert!(stdout.contains("Not deleting web"), "notice missing:\n{}", stdout);
}

#[cfg(unix)]
mod with_engine {
    use serial_test::serial;

    use crate::harness::{combined, TestHarness};

    const UP_SCRIPT: &str = r#"
case "$1" in
  up)
    log=""
    prev=""
    for arg in "$@"; do
      if [ "$prev" = "--event-log" ]; then log="$arg"; fi
      prev="$arg"
    done
    echo '{"resourcePreEvent":{"metadata":{"urn":"urn:pulumi:web::ploy::kubernetes:core/v1:Namespace::web","type":"kubernetes:core/v1:Namespace"}}}' >> "$log"
    echo '{"resOutputsEvent":{"metadata":{"urn":"urn:pulumi:web::ploy::kubernetes:core/v1:Namespace::web","type":"kubernetes:core/v1:Namespace","new":{"outputs":{}}}}}' >> "$log"
    echo "Updating (acme/web)"
    ;;
  stack)
    case "$2" in
      output) echo '{"address":"1.2.3.4"}' ;;
      ls) echo '[{"name":"web","lastUpdate":"2024-05-01T10:00:00.000Z","url":"https://app.pulumi.com/acme/ploy/web"}]' ;;
    esac
    ;;
esac
exit 0
"#;

    #[test]
    #[serial]
    fn test_cli_up_reports_endpoint() {
        let h = TestHarness::new("cli_up");
        h.install_engine("acme", UP_SCRIPT);
        let project = h.project_path();

        let output = h.run_cli(&["up", "web", "--dir", project.to_str().unwrap()]);
        assert!(output.status.success(), "up failed: {}", combined(&output));

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(
            stdout.contains("Ploy deployment created: web"),
            "missing success line:\n{}",
            stdout
        );
        assert!(
            stdout.contains("Your service is available at http://1.2.3.4"),
            "missing endpoint:\n{}",
            stdout
        );

        let calls = h.engine_calls();
        assert!(calls.iter().any(|c| c.starts_with("stack select --create")));
        assert!(calls.iter().any(|c| c.starts_with("config set aws:region us-west-2")));
        assert!(calls.iter().any(|c| c.starts_with("up --stack acme/ploy/web")));

        let program = std::fs::read_to_string(h.home().join(".ploy/workspaces/ploy/web/Pulumi.yaml"))
            .expect("program should be written");
        assert!(program.contains("docker:index/image:Image"));
    }

    #[test]
    #[serial]
    fn test_cli_region_flag_wins() {
        let h = TestHarness::new("cli_region");
        h.install_engine("acme", UP_SCRIPT);
        let project = h.project_path();

        let output = h.run_cli(&[
            "--region",
            "eu-central-1",
            "up",
            "web",
            "-d",
            project.to_str().unwrap(),
        ]);
        assert!(output.status.success(), "up failed: {}", combined(&output));
        assert!(h
            .engine_calls()
            .iter()
            .any(|c| c.starts_with("config set aws:region eu-central-1")));
    }

    #[test]
    #[serial]
    fn test_cli_get_lists_deployments() {
        let h = TestHarness::new("cli_get");
        h.install_engine("acme", UP_SCRIPT);

        let output = h.run_cli(&["get"]);
        assert!(output.status.success(), "get failed: {}", combined(&output));

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("web"), "missing row:\n{}", stdout);
        assert!(stdout.contains("http://1.2.3.4"), "missing URL:\n{}", stdout);
    }

    #[test]
    #[serial]
    fn test_cli_get_empty() {
        let h = TestHarness::new("cli_get_empty");
        h.install_engine("acme", r#"[ "$2" = "ls" ] && echo '[]'; exit 0"#);

        let output = h.run_cli(&["get"]);
        assert!(output.status.success(), "get failed: {}", combined(&output));
        assert!(String::from_utf8_lossy(&output.stdout).contains("No ploy apps currently deployed"));
    }

    #[test]
    #[serial]
    fn test_cli_destroy_declined_never_calls_engine() {
        let h = TestHarness::new("cli_destroy_no_engine");
        h.install_engine("acme", "exit 0");

        let output = h.run_cli_with_input(&["destroy", "web"], "no\n");
        assert!(output.status.success(), "{}", combined(&output));
        assert!(h.engine_calls().is_empty(), "engine was called: {:?}", h.engine_calls());
    }

    #[test]
    #[serial]
    fn test_cli_destroy_confirmed() {
        let h = TestHarness::new("cli_destroy_yes");
        h.install_engine("acme", "exit 0");

        let output = h.run_cli(&["destroy", "web", "--yes"]);
        assert!(output.status.success(), "destroy failed: {}", combined(&output));

        let calls = h.engine_calls();
        assert!(calls.iter().any(|c| c.starts_with("destroy --stack acme/ploy/web")));
        assert!(calls.iter().any(|c| c.starts_with("stack rm --yes")));
        assert!(String::from_utf8_lossy(&output.stdout).contains("Ploy deployment destroyed: web"));
    }
}
