use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn ragchat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ragchat");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/ragchat.sqlite"

[retrieval]
k = 3

[chat]
upload_dir = "{}/uploads"
"#,
        root.display(),
        root.display()
    );
    let config_path = config_dir.join("ragchat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(ragchat_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run ragchat")
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let output = run(&config, &["init"]);
    assert!(
        output.status.success(),
        "init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Database initialized"));
    assert!(tmp.path().join("data/ragchat.sqlite").exists());

    // Idempotent
    assert!(run(&config, &["init"]).status.success());
}

#[test]
fn test_chats_and_documents_start_empty() {
    let (_tmp, config) = setup_test_env();
    run(&config, &["init"]);

    let output = run(&config, &["chats"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No chats."));

    let output = run(&config, &["documents"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No documents."));
}

#[test]
fn test_load_prints_chunks_in_order() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("files/alpha.md");
    let output = run(&config, &["load", file.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "load failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let alpha = stdout.find("# Alpha Document").unwrap();
    let cargo = stdout.find("cargo and crates").unwrap();
    assert!(alpha < cargo);
    assert!(stdout.contains("\"filetype\":\"md\""));
    assert!(stdout.contains("3 chunks"));
}

#[test]
fn test_load_missing_file_fails() {
    let (tmp, config) = setup_test_env();
    let missing = tmp.path().join("files/missing.pdf");
    let output = run(&config, &["load", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn test_history_of_unknown_chat_fails() {
    let (_tmp, config) = setup_test_env();
    run(&config, &["init"]);
    let output = run(&config, &["history", "9"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("chat not found"));
}

#[test]
fn test_ingest_requires_embedding_provider() {
    let (tmp, config) = setup_test_env();
    run(&config, &["init"]);
    let file = tmp.path().join("files/alpha.md");
    let output = run(&config, &["ingest", file.to_str().unwrap(), "--progress", "off"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("disabled"));
}

#[test]
fn test_retrieve_rejects_non_positive_k() {
    let (_tmp, config) = setup_test_env();
    run(&config, &["init"]);
    let output = run(&config, &["retrieve", "anything", "--k", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid argument"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _config) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(&bad, "[db]\npath = \"x\"\n[index]\nbatch_size = 0\n").unwrap();
    let output = run(&bad, &["chats"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("batch_size"));
}
