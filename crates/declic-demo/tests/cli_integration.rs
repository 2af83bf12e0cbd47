use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("config.yaml")
    }

    /// The demo binary with its configuration confined to the sandbox.
    fn demo(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_declic-demo"));
        cmd.env("DECLIC_DEMO_CONFIG", self.config())
            .env_remove("DECLIC_DEMO_ENVIRONMENT")
            .env_remove("DECLIC_DEMO_REGIONS")
            .env_remove("RUST_LOG")
            .stdin(Stdio::null());
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.demo().args(args).output().expect("failed to run declic-demo")
    }
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn assert_success(out: &Output, what: &str) {
    assert!(
        out.status.success(),
        "declic-demo {what} failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        stderr(out),
    );
}

#[test]
fn help_works() {
    let sandbox = Sandbox::new();
    let out = sandbox.run(&["--help"]);
    assert_success(&out, "--help");

    let help = stdout(&out);
    assert!(
        help.contains("greet") && help.contains("transform") && help.contains("Organization:"),
        "unexpected help output:\n{help}"
    );
    assert!(!help.contains("command-v1"), "hidden command listed:\n{help}");
}

#[test]
fn version_is_printed() {
    let sandbox = Sandbox::new();
    let out = sandbox.run(&["--version"]);
    assert_success(&out, "--version");
    assert_eq!(
        stdout(&out),
        format!("declic-demo version v{}\n", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn greet_and_alias() {
    let sandbox = Sandbox::new();
    let out = sandbox.run(&["greet", "alice"]);
    assert_success(&out, "greet");
    assert_eq!(stdout(&out), "Hello, ALICE!\n");

    let out = sandbox.run(&["hi", "bob", "-g", "Hey"]);
    assert_success(&out, "hi");
    assert_eq!(stdout(&out), "Hey, BOB!\n");
}

#[test]
fn unknown_commands_and_bad_input_fail() {
    let sandbox = Sandbox::new();

    let out = sandbox.run(&["nope"]);
    assert!(!out.status.success());
    assert!(
        stderr(&out).contains("unknown command \"nope\" for \"declic-demo\""),
        "stderr:\n{}",
        stderr(&out)
    );

    let out = sandbox.run(&["transform", "sideways", "x"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("unknown function \"sideways\""), "stderr:\n{}", stderr(&out));

    let out = sandbox.run(&["greet"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("Expected exactly 1 argument, got 0"), "stderr:\n{}", stderr(&out));
}

#[test]
fn stored_configuration_feeds_flags() {
    let sandbox = Sandbox::new();

    let out = sandbox.run(&["deploy", "api"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("no environment given"), "stderr:\n{}", stderr(&out));

    let out = sandbox.run(&["config", "set", "environment", "staging"]);
    assert_success(&out, "config set");
    assert_eq!(stdout(&out), "Set environment = staging\nConfiguration file updated\n");
    assert!(sandbox.config().is_file(), "config file not written");

    let out = sandbox.run(&["deploy", "api", "worker", "--dry-run"]);
    assert_success(&out, "deploy");
    assert_eq!(
        stdout(&out),
        "would deploy api to staging [eu]\nwould deploy worker to staging [eu]\n"
    );

    let out = sandbox
        .demo()
        .env("DECLIC_DEMO_REGIONS", "eu,us")
        .args(["deploy", "api", "-e", "prod"])
        .output()
        .expect("failed to run declic-demo");
    assert_success(&out, "deploy with env");
    assert_eq!(stdout(&out), "deployed api to prod [eu,us]\n");
}

#[test]
fn team_output_formats() {
    let sandbox = Sandbox::new();

    let out = sandbox.run(&["team", "list"]);
    assert_success(&out, "team list");
    assert_eq!(
        stdout(&out),
        "Name      Lead   Members\n\
         --------  -----  -------\n\
         core      alice  2\n\
         platform  carol  3\n"
    );

    let out = sandbox.run(&["team", "-o", "json", "show", "core"]);
    assert_success(&out, "team show");
    let json = stdout(&out);
    assert!(json.contains("\"name\": \"core\"") && json.contains("\"lead\": \"alice\""), "{json}");

    let out = sandbox.run(&["team"]);
    assert!(!out.status.success());
    assert!(stdout(&out).contains("Available Commands:"), "{}", stdout(&out));
}

#[test]
fn deprecated_commands_forward_to_their_replacement() {
    let sandbox = Sandbox::new();

    let mut child = sandbox
        .demo()
        .arg("command-v1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn declic-demo");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(b"y\n")
        .expect("failed to answer the prompt");
    let out = child.wait_with_output().expect("failed to wait for declic-demo");
    assert_success(&out, "command-v1");
    assert!(stdout(&out).ends_with("bar: value-for-from-v1\n"), "{}", stdout(&out));

    // Declining leaves the deprecation error.
    let out = sandbox.run(&["command-v2", "x"]);
    assert!(!out.status.success());
    assert!(
        stderr(&out).contains("please use \"declic-demo command-v3 value-for-x\" instead"),
        "stderr:\n{}",
        stderr(&out)
    );
}

#[test]
fn completion_protocol() {
    let sandbox = Sandbox::new();

    let out = sandbox.run(&["__complete", "deploy", "-e", "s"]);
    assert_success(&out, "__complete");
    assert_eq!(stdout(&out), "staging\n_activeHelp_ Choose the target environment\n:4\n");

    let out = sandbox.run(&["__complete", "deploy", "--manifest", ""]);
    assert_success(&out, "__complete");
    assert_eq!(stdout(&out), "yaml\nyml\n_activeHelp_ Select a file (*.yaml or *.yml).\n:8\n");

    let out = sandbox.run(&["__complete", "transform", "u"]);
    assert_success(&out, "__complete");
    assert_eq!(stdout(&out), "upper\n:4\n");
}

#[test]
fn config_path_honours_home_expansion() {
    let sandbox = Sandbox::new();
    let home: &Path = sandbox.dir.path();

    let out = sandbox
        .demo()
        .env("HOME", home)
        .env_remove("DECLIC_DEMO_CONFIG")
        .args(["--config", "~/demo.yaml", "config", "set", "environment", "dev"])
        .output()
        .expect("failed to run declic-demo");
    assert_success(&out, "config set with ~");
    assert!(home.join("demo.yaml").is_file(), "config not written under HOME");
}
