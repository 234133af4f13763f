//! Integration tests driving the `relman` binary.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// A scratch project with a `relman.toml` and no access token.
struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        std::fs::write(
            temp_dir.path().join("relman.toml"),
            "package_name = \"kumi\"\n",
        )
        .expect("failed to write config");
        Self { temp_dir }
    }

    fn releases(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("releases")
    }

    fn write_release(&self, name: &str, content: &str) {
        std::fs::create_dir_all(self.releases()).unwrap();
        std::fs::write(self.releases().join(name), content).unwrap();
    }

    fn relman_cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_relman"));
        cmd.current_dir(self.temp_dir.path());
        cmd.env_remove("RELMAN_GITHUB_TOKEN");
        cmd.env_remove("GITHUB_TOKEN");
        cmd.env_remove("RELMAN_CONFIG");
        cmd
    }
}

fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx
        .relman_cmd()
        .arg("--help")
        .output()
        .expect("failed to run relman");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("deploy"));
}

#[test]
fn test_prune_applies_retention() {
    let ctx = TestContext::new();
    ctx.write_release(
        "RELEASES",
        "h1 kumi-1.0-full.nupkg 1\n\
         h2 kumi-1.0-1.1-delta.nupkg 1\n\
         h3 kumi-1.1-full.nupkg 1\n",
    );
    for name in [
        "kumi-1.0-full.nupkg",
        "kumi-1.0-1.1-delta.nupkg",
        "kumi-1.1-full.nupkg",
    ] {
        ctx.write_release(name, "x");
    }

    let output = ctx
        .relman_cmd()
        .arg("prune")
        .output()
        .expect("failed to run relman");
    assert!(output.status.success(), "{output:?}");

    assert_eq!(
        names_in(&ctx.releases()),
        ["RELEASES", "kumi-1.0-1.1-delta.nupkg", "kumi-1.1-full.nupkg"]
    );
    assert_eq!(
        std::fs::read_to_string(ctx.releases().join("RELEASES")).unwrap(),
        "h2 kumi-1.0-1.1-delta.nupkg 1\nh3 kumi-1.1-full.nupkg 1\n"
    );
}

#[test]
fn test_check_reports_missing_files() {
    let ctx = TestContext::new();
    ctx.write_release("RELEASES", "h1 kumi-1.0-full.nupkg 1\n");

    let output = ctx
        .relman_cmd()
        .arg("check")
        .output()
        .expect("failed to run relman");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("kumi-1.0-full.nupkg"));
}

#[test]
fn test_malformed_manifest_fails_prune() {
    let ctx = TestContext::new();
    ctx.write_release("RELEASES", "not-a-record\n");

    let output = ctx
        .relman_cmd()
        .arg("prune")
        .output()
        .expect("failed to run relman");
    assert!(!output.status.success());
    assert_eq!(
        std::fs::read_to_string(ctx.releases().join("RELEASES")).unwrap(),
        "not-a-record\n"
    );
}

#[test]
fn test_publish_without_token_fails() {
    let ctx = TestContext::new();
    let output = ctx
        .relman_cmd()
        .args(["publish", "--version", "2024.1015.0"])
        .output()
        .expect("failed to run relman");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("access token"));
}

#[test]
fn test_missing_config_is_an_error() {
    let ctx = TestContext::new();
    let output = ctx
        .relman_cmd()
        .args(["--config", "nope.toml", "check"])
        .output()
        .expect("failed to run relman");
    assert!(!output.status.success());
}
