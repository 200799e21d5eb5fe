//! End-to-end CLI tests for kbase.
//!
//! These tests exercise the full CLI binary with isolated test environments.
//! Each test creates its own temporary config and seed files to ensure
//! isolation.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Environment Helper
// =============================================================================

/// Isolated test environment with its own config and seed files.
struct TestEnv {
    _temp_dir: TempDir,
    root: PathBuf,
    config_path: PathBuf,
}

impl TestEnv {
    /// Create an environment with one empty knowledge base named "docs".
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();

        let seed_path = root.join("docs.json");
        let config_path = root.join("config.toml");
        let config_content = format!(
            r#"
[[knowledge_bases]]
name = "docs"
description = "Test knowledge base"
backend_type = "vector"

[knowledge_bases.connection_info]
seed = "{}"
"#,
            seed_path.display()
        );
        fs::write(&config_path, config_content).expect("Failed to write config");

        Self {
            _temp_dir: temp_dir,
            root,
            config_path,
        }
    }

    /// Create an environment whose "docs" knowledge base is seeded with
    /// sample items.
    fn with_items() -> Self {
        let env = Self::new();

        let seed = r#"[
    {
        "id": "rust-errors",
        "content": "Use Result and Option types for error handling. The question mark operator propagates errors.",
        "title": "Error Handling",
        "category": "rust",
        "tags": ["rust", "errors"]
    },
    {
        "id": "aws-lambda",
        "content": "Best practices for serverless lambda functions. Use environment variables for configuration.",
        "title": "Lambda Patterns",
        "category": "aws",
        "tags": ["aws", "lambda"]
    }
]"#;
        fs::write(env.seed_path(), seed).expect("Failed to write seed");

        env
    }

    /// Get a Command configured for this test environment.
    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("kbase").expect("binary exists");
        cmd.env("KBASE_CONFIG", &self.config_path);
        cmd
    }

    fn seed_path(&self) -> PathBuf {
        self.root.join("docs.json")
    }
}

// =============================================================================
// 1. Help / No Command Tests
// =============================================================================

#[test]
fn tc_1_1_no_subcommand_shows_help() {
    let env = TestEnv::new();

    env.command()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("get"));
}

#[test]
fn tc_1_2_help_flag() {
    let env = TestEnv::new();

    env.command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("knowledge-base layer"));
}

#[test]
fn tc_1_3_version_flag() {
    let env = TestEnv::new();

    env.command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kbase"));
}

// =============================================================================
// 2. Search Command Tests
// =============================================================================

#[test]
fn tc_2_1_search_with_matches() {
    let env = TestEnv::with_items();

    env.command()
        .args(["search", "error handling"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rust-errors"))
        .stdout(predicate::str::contains("Error Handling"))
        .stdout(predicate::str::contains("result(s) found"));
}

#[test]
fn tc_2_2_search_with_no_matches() {
    let env = TestEnv::with_items();

    env.command()
        .args(["search", "xyznonexistent123"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No matches found for 'xyznonexistent123'",
        ));
}

#[test]
fn tc_2_3_search_with_top_k_limit() {
    let env = TestEnv::with_items();

    // "configuration" appears in both items' vocabulary neighborhoods; limit
    // the merge to one result.
    env.command()
        .args(["search", "for", "--top-k", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 result(s) found"));
}

#[test]
fn tc_2_4_search_single_kb_with_category_filter() {
    let env = TestEnv::with_items();

    env.command()
        .args(["search", "lambda", "--kb", "docs", "--category", "aws"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aws-lambda"));
}

#[test]
fn tc_2_5_search_category_filter_excludes_other_categories() {
    let env = TestEnv::with_items();

    env.command()
        .args(["search", "lambda", "--kb", "docs", "--category", "rust"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aws-lambda").not());
}

#[test]
fn tc_2_6_search_category_filter_requires_kb() {
    let env = TestEnv::with_items();

    env.command()
        .args(["search", "lambda", "--category", "aws"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--kb"));
}

#[test]
fn tc_2_7_search_unknown_kb_fails() {
    let env = TestEnv::with_items();

    env.command()
        .args(["search", "lambda", "--kb", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown knowledge base"));
}

#[test]
fn tc_2_8_search_zero_top_k_fails() {
    let env = TestEnv::with_items();

    env.command()
        .args(["search", "lambda", "--top-k", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("top_k"));
}

// =============================================================================
// 3. List Command Tests
// =============================================================================

#[test]
fn tc_3_1_list_all_items() {
    let env = TestEnv::with_items();

    env.command()
        .args(["list", "--kb", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rust: rust-errors"))
        .stdout(predicate::str::contains("aws: aws-lambda"))
        .stdout(predicate::str::contains("[rust, errors]"))
        .stdout(predicate::str::contains("[aws, lambda]"));
}

#[test]
fn tc_3_2_list_empty_knowledge_base() {
    let env = TestEnv::new();

    env.command()
        .args(["list", "--kb", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No items found"));
}

#[test]
fn tc_3_3_list_with_category_filter() {
    let env = TestEnv::with_items();

    env.command()
        .args(["list", "--kb", "docs", "--category", "rust"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rust-errors"))
        .stdout(predicate::str::contains("aws-lambda").not());
}

#[test]
fn tc_3_4_list_with_non_matching_category() {
    let env = TestEnv::with_items();

    env.command()
        .args(["list", "--kb", "docs", "--category", "nonexistent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No items found"));
}

#[test]
fn tc_3_5_list_item_without_tags_has_no_brackets() {
    let env = TestEnv::new();
    fs::write(
        env.seed_path(),
        r#"[{"id": "plain", "content": "content", "category": "test"}]"#,
    )
    .unwrap();

    env.command()
        .args(["list", "--kb", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("test: plain"))
        .stdout(predicate::str::contains("[").not());
}

#[test]
fn tc_3_6_list_with_tag_filter() {
    let env = TestEnv::with_items();

    env.command()
        .args(["list", "--kb", "docs", "--tags", "lambda"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aws-lambda"))
        .stdout(predicate::str::contains("rust-errors").not());
}

// =============================================================================
// 4. Add Command Tests
// =============================================================================

#[test]
fn tc_4_1_add_item_from_stdin() {
    let env = TestEnv::new();

    env.command()
        .args(["add", "--kb", "docs", "--id", "note-1", "--title", "Note"])
        .write_stdin("Some knowledge worth keeping.")
        .assert()
        .success()
        .stdout(predicate::str::contains("Added: note-1"));

    // Persisted to the seed file.
    let seed = fs::read_to_string(env.seed_path()).unwrap();
    assert!(seed.contains("note-1"));
    assert!(seed.contains("Some knowledge worth keeping."));
}

#[test]
fn tc_4_2_add_item_from_file() {
    let env = TestEnv::new();
    let input_file = env.root.join("input.txt");
    fs::write(&input_file, "Content from a file.").unwrap();

    let mut cmd = env.command();
    cmd.args(["add", "--kb", "docs", "--id", "from-file", "--file"])
        .arg(&input_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added: from-file"));
}

#[test]
fn tc_4_3_add_item_with_tags_and_category() {
    let env = TestEnv::new();

    env.command()
        .args([
            "add",
            "--kb",
            "docs",
            "--id",
            "tagged",
            "--category",
            "test",
            "--tags",
            "tag1, tag2, tag3",
        ])
        .write_stdin("content")
        .assert()
        .success();

    let seed = fs::read_to_string(env.seed_path()).unwrap();
    assert!(seed.contains("\"tag1\""));
    assert!(seed.contains("\"tag2\""));
    assert!(seed.contains("\"tag3\""));
    assert!(!seed.contains("\"  tag1  \""));
}

#[test]
fn tc_4_4_add_empty_content_fails() {
    let env = TestEnv::new();

    env.command()
        .args(["add", "--kb", "docs", "--id", "empty"])
        .write_stdin("   \n\t\n   ")
        .assert()
        .failure()
        .stderr(predicate::str::contains("content cannot be empty"));
}

#[test]
fn tc_4_5_add_file_not_found() {
    let env = TestEnv::new();

    env.command()
        .args([
            "add",
            "--kb",
            "docs",
            "--id",
            "x",
            "--file",
            "/nonexistent/path.md",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn tc_4_6_add_to_unknown_kb_fails() {
    let env = TestEnv::new();

    env.command()
        .args(["add", "--kb", "ghost", "--id", "x"])
        .write_stdin("content")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown knowledge base"));
}

#[test]
fn tc_4_7_add_same_id_replaces_item() {
    let env = TestEnv::new();

    env.command()
        .args(["add", "--kb", "docs", "--id", "note-1"])
        .write_stdin("first version")
        .assert()
        .success();

    env.command()
        .args(["add", "--kb", "docs", "--id", "note-1"])
        .write_stdin("second version")
        .assert()
        .success();

    env.command()
        .args(["get", "docs", "note-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("second version"));

    let seed = fs::read_to_string(env.seed_path()).unwrap();
    assert!(!seed.contains("first version"));
}

#[test]
fn tc_4_8_add_without_seed_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "[[knowledge_bases]]\nname = \"mem\"\nbackend_type = \"vector\"\n",
    )
    .unwrap();

    Command::cargo_bin("kbase")
        .expect("binary exists")
        .env("KBASE_CONFIG", &config_path)
        .args(["add", "--kb", "mem", "--id", "x"])
        .write_stdin("content")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no seed file"));
}

#[test]
fn tc_4_9_seed_rewrite_keeps_authored_embeddings() {
    let env = TestEnv::new();
    fs::write(
        env.seed_path(),
        r#"[{"id": "k1", "content": "hand indexed", "embedding": [0.1, 0.2, 0.3]}]"#,
    )
    .unwrap();

    env.command()
        .args(["add", "--kb", "docs", "--id", "k2"])
        .write_stdin("another item")
        .assert()
        .success();

    let seed = fs::read_to_string(env.seed_path()).unwrap();
    assert!(seed.contains("k2"));
    assert!(seed.contains("\"embedding\""));
    assert!(seed.contains("0.2"));
}

// =============================================================================
// 5. Get / Delete Command Tests
// =============================================================================

#[test]
fn tc_5_1_get_existing_item() {
    let env = TestEnv::with_items();

    env.command()
        .args(["get", "docs", "rust-errors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Result and Option"));
}

#[test]
fn tc_5_2_get_item_not_found() {
    let env = TestEnv::with_items();

    env.command()
        .args(["get", "docs", "nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Item not found: nonexistent"));
}

#[test]
fn tc_5_3_delete_existing_item() {
    let env = TestEnv::with_items();

    env.command()
        .args(["delete", "docs", "rust-errors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted: rust-errors"));

    // Gone from the seed file, so the next invocation no longer sees it.
    env.command()
        .args(["get", "docs", "rust-errors"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Item not found"));
}

#[test]
fn tc_5_4_delete_missing_item_reports_absence() {
    let env = TestEnv::with_items();

    env.command()
        .args(["delete", "docs", "nonexistent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No item with id 'nonexistent'"));
}

// =============================================================================
// 6. Summary and Config Tests
// =============================================================================

#[test]
fn tc_6_1_summary_lists_knowledge_bases() {
    let env = TestEnv::with_items();

    env.command()
        .arg("summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 knowledge base(s)"))
        .stdout(predicate::str::contains("docs (vector, enabled): 2 item(s)"));
}

#[test]
fn tc_6_2_summary_with_no_config_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let nonexistent_config = temp_dir.path().join("nonexistent/config.toml");

    Command::cargo_bin("kbase")
        .expect("binary exists")
        .env("KBASE_CONFIG", &nonexistent_config)
        .arg("summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 knowledge base(s)"));
}

#[test]
fn tc_6_3_invalid_config_toml_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "this is not valid toml {{{{").unwrap();

    Command::cargo_bin("kbase")
        .expect("binary exists")
        .env("KBASE_CONFIG", &config_path)
        .args(["search", "test"])
        .assert()
        .failure();
}

#[test]
fn tc_6_4_unsupported_backend_type_in_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "[[knowledge_bases]]\nname = \"bad\"\nbackend_type = \"pinecone\"\n",
    )
    .unwrap();

    Command::cargo_bin("kbase")
        .expect("binary exists")
        .env("KBASE_CONFIG", &config_path)
        .arg("summary")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported backend type"));
}

#[test]
fn tc_6_5_configured_default_top_k_applies_without_flag() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let seed = root.join("docs.json");
    fs::write(
        &seed,
        r#"[
    {"id": "k1", "content": "shared words here"},
    {"id": "k2", "content": "shared words too"}
]"#,
    )
    .unwrap();

    let config_path = root.join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[search]
default_top_k = 1

[[knowledge_bases]]
name = "docs"
backend_type = "vector"
[knowledge_bases.connection_info]
seed = "{}"
"#,
            seed.display()
        ),
    )
    .unwrap();

    Command::cargo_bin("kbase")
        .expect("binary exists")
        .env("KBASE_CONFIG", &config_path)
        .args(["search", "shared"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 result(s) found"));
}

#[test]
fn tc_6_6_fan_out_search_merges_multiple_knowledge_bases() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let seed_a = root.join("a.json");
    let seed_b = root.join("b.json");
    fs::write(
        &seed_a,
        r#"[{"id": "a1", "content": "unique shared topic alpha"}]"#,
    )
    .unwrap();
    fs::write(
        &seed_b,
        r#"[{"id": "b1", "content": "unique shared topic beta"}]"#,
    )
    .unwrap();

    let config_path = root.join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[[knowledge_bases]]
name = "a"
backend_type = "vector"
[knowledge_bases.connection_info]
seed = "{}"

[[knowledge_bases]]
name = "b"
backend_type = "vector"
[knowledge_bases.connection_info]
seed = "{}"
"#,
            seed_a.display(),
            seed_b.display()
        ),
    )
    .unwrap();

    Command::cargo_bin("kbase")
        .expect("binary exists")
        .env("KBASE_CONFIG", &config_path)
        .args(["search", "unique shared topic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a1"))
        .stdout(predicate::str::contains("b1"));
}

#[test]
fn tc_6_7_disabled_knowledge_base_skipped_by_fan_out() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let seed = root.join("off.json");
    fs::write(&seed, r#"[{"id": "hidden", "content": "findable text"}]"#).unwrap();

    let config_path = root.join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[[knowledge_bases]]
name = "off"
backend_type = "vector"
enabled = false
[knowledge_bases.connection_info]
seed = "{}"
"#,
            seed.display()
        ),
    )
    .unwrap();

    Command::cargo_bin("kbase")
        .expect("binary exists")
        .env("KBASE_CONFIG", &config_path)
        .args(["search", "findable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches found"));

    // Direct routing still reaches a disabled knowledge base.
    Command::cargo_bin("kbase")
        .expect("binary exists")
        .env("KBASE_CONFIG", &config_path)
        .args(["search", "findable", "--kb", "off"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hidden"));
}
