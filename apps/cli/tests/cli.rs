use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn cli(workspace: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("codeshell-cli")?;
    cmd.arg("--workspace").arg(workspace);
    Ok(cmd)
}

fn saved_files(workspace: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let raw = fs::read_to_string(workspace.join(".codeshell").join("state.json"))?;
    let state: Value = serde_json::from_str(&raw)?;
    let files = state["openedFiles"]
        .as_array()
        .ok_or("openedFiles missing")?
        .iter()
        .filter_map(Value::as_str)
        .map(PathBuf::from)
        .collect();
    Ok(files)
}

#[test]
fn info_reports_language_and_icon() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    cli(dir.path())?
        .args(["info", "src/main.rs", "Dockerfile", "notes.unknownext"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rust\tfas fa-gear"))
        .stdout(predicate::str::contains("Dockerfile\tdockerfile"))
        .stdout(predicate::str::contains("notes.unknownext\tplaintext\tfas fa-file"));
    Ok(())
}

#[test]
fn tree_lists_directories_first_and_expands_on_request() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::create_dir(dir.path().join("src"))?;
    fs::write(dir.path().join("src").join("lib.rs"), "")?;
    fs::write(dir.path().join("README.md"), "")?;

    let output = cli(dir.path())?
        .args(["tree", "--expand", "src"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let src = stdout.find("v src/").ok_or("src row missing")?;
    let lib = stdout.find("lib.rs").ok_or("lib.rs row missing")?;
    let readme = stdout.find("README.md").ok_or("README row missing")?;
    assert!(src < lib && lib < readme, "unexpected order:\n{stdout}");
    Ok(())
}

#[test]
fn open_keeps_at_most_ten_documents() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let mut paths = Vec::new();
    for i in 0..11 {
        let path = dir.path().join(format!("file{i:02}.txt"));
        fs::write(&path, format!("{i}"))?;
        paths.push(path);
    }

    let mut cmd = cli(dir.path())?;
    cmd.arg("open").args(&paths);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "evicted {}",
            paths[0].display()
        )))
        .stdout(predicate::str::contains("* file10.txt"));

    assert_eq!(saved_files(dir.path())?, paths[1..].to_vec());
    Ok(())
}

#[test]
fn restore_skips_deleted_files_and_rewrites_state() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let [a, b, c] = ["a.txt", "b.txt", "c.txt"].map(|name| dir.path().join(name));
    for path in [&a, &b, &c] {
        fs::write(path, "x")?;
    }
    let mut cmd = cli(dir.path())?;
    cmd.arg("open").args([&a, &b, &c]);
    cmd.assert().success();

    fs::remove_file(&b)?;
    cli(dir.path())?
        .args(["session", "restore"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 2 document(s)"))
        .stdout(predicate::str::contains(format!("missing {}", b.display())));

    assert_eq!(saved_files(dir.path())?, vec![a, c]);
    Ok(())
}

#[test]
fn session_show_and_clear() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    cli(dir.path())?
        .args(["session", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved session"));

    let file = dir.path().join("notes.md");
    fs::write(&file, "# notes")?;
    let mut cmd = cli(dir.path())?;
    cmd.arg("open").arg(&file);
    cmd.assert().success();

    cli(dir.path())?
        .args(["session", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"lastOpenedFile\""))
        .stdout(predicate::str::contains("notes.md"));

    cli(dir.path())?
        .args(["session", "clear"])
        .assert()
        .success();
    assert!(!dir.path().join(".codeshell").join("state.json").exists());
    Ok(())
}

#[test]
fn theme_set_validates_and_persists() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    cli(dir.path())?
        .args(["theme", "get"])
        .assert()
        .success()
        .stdout(predicate::str::diff("vs-dark\n"));

    cli(dir.path())?
        .args(["theme", "set", "synthwave-84"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown theme"));

    cli(dir.path())?
        .args(["theme", "set", "Dracula"])
        .assert()
        .success();
    cli(dir.path())?
        .args(["theme", "get"])
        .assert()
        .success()
        .stdout(predicate::str::diff("dracula\n"));
    cli(dir.path())?
        .args(["theme", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* dracula (Dracula, dark, #282A36)"))
        .stdout(predicate::str::contains("- vs (Visual Studio Light, light, #FFFFFE)"));

    let prefs = fs::read_to_string(dir.path().join(".codeshell").join("preferences.json"))?;
    assert!(prefs.contains("\"dracula\""));
    Ok(())
}

#[test]
fn custom_state_path_is_honoured() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let file = dir.path().join("main.rs");
    fs::write(&file, "fn main() {}")?;
    let state = dir.path().join("elsewhere").join("session.json");

    let mut cmd = cli(dir.path())?;
    cmd.arg("--state").arg(&state).arg("open").arg(&file);
    cmd.assert().success();

    assert!(state.exists());
    assert!(!dir.path().join(".codeshell").join("state.json").exists());
    Ok(())
}

#[test]
fn link_opens_the_resolved_file() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let src = dir.path().join("src");
    fs::create_dir(&src)?;
    fs::write(src.join("app.js"), "import './util'")?;
    fs::write(src.join("util.ts"), "export {}")?;

    let mut cmd = cli(dir.path())?;
    cmd.args(["link", "./util", "--from"]).arg(src.join("app.js"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("util.ts"));
    assert_eq!(saved_files(dir.path())?, vec![src.join("app.js"), src.join("util.ts")]);

    cli(dir.path())?
        .args(["link", "./nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found for link"));
    Ok(())
}
