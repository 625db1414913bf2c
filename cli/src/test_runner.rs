use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use propbag::{ErrorKind, ParserOptions, PropertyMap, Value};
use resolver::ResolvedBag;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Expected resolved bag: one table per concrete class. Compared exactly.
    #[serde(default)]
    pub expect: Option<toml::Table>,

    /// The load error's Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Expected error kind, e.g. "CycleError" or "cycle".
    #[serde(default)]
    pub expect_kind: Option<String>,

    /// 1-based source line the first error is reported on.
    #[serde(default)]
    pub expect_line: Option<usize>,

    /// Parser options for this file.
    #[serde(default)]
    pub options: Option<ParserOptions>,
}

impl TestConfig {
    fn expects_error(&self) -> bool {
        self.expect_error.is_some() || self.expect_kind.is_some() || self.expect_line.is_some()
    }
}

fn toml_to_value(val: &toml::Value) -> Result<Value, String> {
    match val {
        toml::Value::Integer(n) => Ok(Value::Integer(*n)),
        toml::Value::Float(f) => Ok(Value::Float(*f)),
        toml::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        toml::Value::String(s) => Ok(Value::String(s.clone())),
        toml::Value::Table(table) => toml_to_map(table).map(Value::from),
        other => Err(format!(
            "unsupported {} in expect table: {}",
            other.type_str(),
            other
        )),
    }
}

fn toml_to_map(table: &toml::Table) -> Result<PropertyMap, String> {
    table
        .iter()
        .map(|(k, v)| Ok((k.clone(), toml_to_value(v)?)))
        .collect()
}

/// Parse a `.test.bag` file into its TOML config and property bag source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4; // skip \n---
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

#[derive(Debug, PartialEq)]
pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    let options = config.options.clone().unwrap_or_default();
    let result = resolver::load_with_options(source, &options);
    tracing::debug!(path = %path.display(), ok = result.is_ok(), "ran test file");

    let outcome = match check_result(&config, result) {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };

    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

/// Compare a load result against the expectations. Returns `Some(reason)` on mismatch.
fn check_result(
    config: &TestConfig,
    result: Result<ResolvedBag, resolver::LoadError>,
) -> Option<String> {
    match result {
        Err(err) if config.expects_error() => {
            if let Some(expected) = &config.expect_kind {
                let Some(kind) = ErrorKind::from_name(expected) else {
                    return Some(format!("unknown expect_kind \"{}\"", expected));
                };
                if err.kind() != kind {
                    return Some(format!("expected {}, got {}: {}", kind, err.kind(), err));
                }
            }
            if let Some(expected) = &config.expect_error {
                let msg = err.to_string();
                if !msg.contains(expected.as_str()) {
                    return Some(format!(
                        "expected error containing \"{}\", got: {}",
                        expected, msg
                    ));
                }
            }
            if let Some(expected) = config.expect_line {
                if err.line() != expected {
                    return Some(format!(
                        "expected error on line {}, but it is on line {}: {}",
                        expected,
                        err.line(),
                        err
                    ));
                }
            }
            None
        }
        Err(err) => Some(format!("unexpected error: {}", err)),
        Ok(_) if config.expects_error() => {
            Some("expected an error, but the file loaded successfully".into())
        }
        Ok(bag) => match &config.expect {
            Some(expected) => check_bag(&bag, expected),
            None => None,
        },
    }
}

fn check_bag(bag: &ResolvedBag, expected: &toml::Table) -> Option<String> {
    let actual_names: Vec<&str> = bag.class_names().collect();
    let mut expected_names: Vec<&str> = expected.keys().map(String::as_str).collect();
    let mut sorted_actual = actual_names.clone();
    sorted_actual.sort();
    expected_names.sort();
    if sorted_actual != expected_names {
        return Some(format!(
            "class mismatch\n  expected: [{}]\n  actual:   [{}]",
            expected_names.join(", "),
            actual_names.join(", ")
        ));
    }

    for (name, value) in expected {
        let toml::Value::Table(table) = value else {
            return Some(format!("expect.{} must be a table", name));
        };
        let expected_props = match toml_to_map(table) {
            Ok(map) => map,
            Err(e) => return Some(e),
        };
        let Some(actual_props) = bag.get(name) else {
            continue;
        };
        if *actual_props != expected_props {
            return Some(format!(
                "class \"{}\" mismatch\n  expected: {}\n  actual:   {}",
                name, expected_props, actual_props
            ));
        }
    }

    None
}

/// Discover `.test.bag` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
/// Returns a BTreeMap so categories are sorted alphabetically.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".test.bag") {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.bag files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn label(result: &TestResult) -> &str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_suffix(".test.bag"))
            .unwrap_or("?")
    })
}

/// Run all `.test.bag` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let run_categories: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        // single file mode ignores categories
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all_categories = discover_categorized(path);
        if all_categories.is_empty() {
            eprintln!("no .test.bag files found in {}", path.display());
            return 1;
        }
        select_categories(all_categories, categories)
    };

    if run_categories.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        if !path.is_file() {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", bold(header, no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), label(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", fail_label(no_color), label(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    let failed = failures.len();
    eprintln!();
    if failed == 0 {
        let ok = if no_color { "ok" } else { "\x1b[32mok\x1b[0m" };
        eprintln!("test result: {}. {} passed, 0 failed", ok, passed);
        0
    } else {
        let bad = if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" };
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            bad,
            passed,
            failed,
            passed + failed
        );
        1
    }
}

fn select_categories(
    all_categories: BTreeMap<String, Vec<PathBuf>>,
    categories: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if categories.is_empty() {
        return all_categories;
    }

    let mut filtered = BTreeMap::new();
    for requested in categories {
        let req = requested.trim_matches('/');
        let prefix = format!("{}/", req);
        let mut found = false;
        for (cat, files) in &all_categories {
            if cat == req || cat.starts_with(&prefix) {
                filtered.insert(cat.clone(), files.clone());
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all_categories
                    .keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn frontmatter_splits_config_and_source() {
        let (config, source) =
            parse_test_file("---\ndescription = \"d\"\n---\nc\n  a = 1\n").unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(source, "c\n  a = 1\n");
    }

    #[test]
    fn frontmatter_requires_delimiters() {
        assert!(parse_test_file("c\n  a = 1\n").is_err());
        assert!(parse_test_file("---\ndescription = \"d\"\n").is_err());
        assert!(parse_test_file("---\nbogus = 1\n---\n").is_err());
    }

    #[test]
    fn frontmatter_options() {
        let (config, _) =
            parse_test_file("---\n[options]\ncomment_marker = \"#\"\n---\n").unwrap();
        let options = config.options.unwrap();
        assert_eq!(options.comment_marker, "#");
        assert_eq!(options.max_depth, ParserOptions::default().max_depth);
    }

    #[test]
    fn passing_and_failing_files() {
        let dir = tempfile::tempdir().unwrap();
        let pass = write(
            dir.path(),
            "pass.test.bag",
            "---\n[expect.c]\na = 1\ng = { b = \"x\" }\n---\nc\n  a = 1\n  g\n    b = x\n",
        );
        let wrong_value = write(
            dir.path(),
            "wrong.test.bag",
            "---\n[expect.c]\na = 2\n---\nc\n  a = 1\n",
        );
        let extra_class = write(
            dir.path(),
            "extra.test.bag",
            "---\n[expect.c]\n---\nc\nd\n",
        );

        assert_eq!(run_single_test(&pass).outcome, TestOutcome::Pass);
        assert!(matches!(run_single_test(&wrong_value).outcome, TestOutcome::Fail(_)));
        assert!(matches!(run_single_test(&extra_class).outcome, TestOutcome::Fail(_)));
    }

    #[test]
    fn error_expectations() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = write(
            dir.path(),
            "cycle.test.bag",
            "---\nexpect_kind = \"CycleError\"\nexpect_error = \"a -> b -> a\"\nexpect_line = 2\n---\na :: b\nb :: a\n",
        );
        let wrong_kind = write(
            dir.path(),
            "kind.test.bag",
            "---\nexpect_kind = \"indentation\"\n---\na :: missing\n",
        );
        let no_error = write(
            dir.path(),
            "none.test.bag",
            "---\nexpect_kind = \"cycle\"\n---\na\n",
        );

        assert_eq!(run_single_test(&cycle).outcome, TestOutcome::Pass);
        assert!(matches!(run_single_test(&wrong_kind).outcome, TestOutcome::Fail(_)));
        assert!(matches!(run_single_test(&no_error).outcome, TestOutcome::Fail(_)));
    }

    #[test]
    fn categories_follow_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "top.test.bag", "---\n\n---\n");
        write(dir.path(), "errors/a.test.bag", "---\n\n---\n");
        write(dir.path(), "errors/deep/b.test.bag", "---\n\n---\n");
        write(dir.path(), "errors/notes.txt", "ignored");

        let all = discover_categorized(dir.path());
        let names: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(names, ["", "errors", "errors/deep"]);

        let selected = select_categories(all, &["errors".to_string()]);
        assert_eq!(selected.len(), 2);
        assert_eq!(run_tests(dir.path(), true, &[]), 0);
    }

    #[test]
    fn bundled_test_files_pass() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../tests/bag");
        let categories = discover_categorized(&root);
        assert!(!categories.is_empty(), "no test files in {}", root.display());

        let mut failures = Vec::new();
        for file in categories.values().flatten() {
            if let TestOutcome::Fail(reason) = run_single_test(file).outcome {
                failures.push(format!("{}: {}", file.display(), reason));
            }
        }
        assert!(failures.is_empty(), "{}", failures.join("\n"));
    }
}
