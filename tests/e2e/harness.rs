use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// A throwaway home directory plus helpers for running the binary in it.
pub struct TestHarness {
    home: TempDir,
    name: String,
}

impl TestHarness {
    pub fn new(name: &str) -> Self {
        let home = TempDir::new().expect("failed to create temp home");
        fs::create_dir_all(home.path().join(".ploy")).expect("failed to create config dir");
        Self {
            home,
            name: name.to_string(),
        }
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    pub fn write_config(&self, content: &str) {
        fs::write(self.home.path().join(".ploy/config.toml"), content)
            .expect("failed to write config");
    }

    /// A build context holding a Dockerfile.
    pub fn project_path(&self) -> PathBuf {
        let dir = self.home.path().join(format!("{}-app", self.name));
        fs::create_dir_all(&dir).expect("failed to create project dir");
        fs::write(dir.join("Dockerfile"), "FROM nginx:alpine\n").expect("failed to write Dockerfile");
        dir
    }

    /// File the stand-in engine appends its arguments to.
    pub fn engine_log(&self) -> PathBuf {
        self.home.path().join("pulumi-calls.log")
    }

    /// Install a `pulumi` stand-in that runs `body` after logging its
    /// arguments, and point the config at it.
    #[cfg(unix)]
    pub fn install_engine(&self, org: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.home.path().join("pulumi");
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\n{}\n",
            self.engine_log().display(),
            body
        );
        fs::write(&path, script).expect("failed to write engine script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("failed to mark engine script executable");

        self.write_config(&format!(
            "org = \"{}\"\npulumi_bin = \"{}\"\nplugins = []\n",
            org,
            path.display()
        ));
        path
    }

    pub fn engine_calls(&self) -> Vec<String> {
        fs::read_to_string(self.engine_log())
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ploy"));
        cmd.args(args)
            .env("HOME", self.home.path())
            .env_remove("AWS_REGION")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn run_cli(&self, args: &[&str]) -> Output {
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .expect("failed to run ploy")
    }

    pub fn run_cli_with_input(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn ploy");
        child
            .stdin
            .take()
            .expect("stdin is piped")
            .write_all(input.as_bytes())
            .expect("failed to write stdin");
        child.wait_with_output().expect("failed to wait for ploy")
    }
}

pub fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}
