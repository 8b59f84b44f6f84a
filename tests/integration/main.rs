//! Integration tests for Drydock

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn drydock() -> Command {
        cargo_bin_cmd!("drydock")
    }

    #[test]
    fn help_displays() {
        drydock()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build-and-publish pipeline"));
    }

    #[test]
    fn version_displays() {
        drydock()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("drydock"));
    }

    #[test]
    #[serial]
    fn tags_plain_output() {
        let dir = TempDir::new().unwrap();
        drydock()
            .current_dir(dir.path())
            .args([
                "--no-local",
                "tags",
                "--revision",
                "0123abcd9876fedc0123abcd9876fedc01234567",
                "--repo",
                "Org/Repo",
                "--format",
                "plain",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("ghcr.io/org/repo:latest"))
            .stdout(predicate::str::contains("ghcr.io/org/repo:0123abc"));
    }

    #[test]
    fn tags_rejects_short_revision() {
        let dir = TempDir::new().unwrap();
        drydock()
            .current_dir(dir.path())
            .args(["--no-local", "tags", "--revision", "ab12"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("too short"));
    }

    #[test]
    fn tags_rejects_non_hex_revision() {
        let dir = TempDir::new().unwrap();
        drydock()
            .current_dir(dir.path())
            .args(["--no-local", "tags", "--revision", "not-a-revision"])
            .assert()
            .failure();
    }

    #[test]
    #[serial]
    fn runs_lists_or_reports_empty() {
        let dir = TempDir::new().unwrap();
        drydock()
            .current_dir(dir.path())
            .args(["--no-local", "runs"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("No recorded runs").or(predicate::str::contains("RUN")),
            );
    }

    #[test]
    fn config_path() {
        drydock()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    #[serial]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        drydock()
            .current_dir(dir.path())
            .args(["--no-local", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[registry]"));
    }

    #[test]
    #[serial]
    fn cache_status_runs() {
        let dir = TempDir::new().unwrap();
        drydock()
            .current_dir(dir.path())
            .args(["--no-local", "cache", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("active"));
    }

    #[test]
    fn init_writes_local_config() {
        let dir = TempDir::new().unwrap();
        drydock()
            .args(["init", "--path", dir.path().to_str().unwrap()])
            .assert()
            .success();

        assert!(dir.path().join(".drydock.toml").is_file());

        // A second init without --force refuses to overwrite
        drydock()
            .args(["init", "--path", dir.path().to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn local_config_overrides_registry_host() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".drydock.toml"),
            "[registry]\nhost = \"registry.example.com\"\n",
        )
        .unwrap();

        drydock()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("registry.example.com"));
    }

    #[test]
    fn run_requires_revision() {
        drydock()
            .env_remove("DRYDOCK_REVISION")
            .args(["run"])
            .assert()
            .failure();
    }
}
