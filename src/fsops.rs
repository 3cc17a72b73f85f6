// Generic file and directory helpers exposed as MCP tools
// Relative paths resolve against the project root. Failures land in the
// outcome message instead of an error value so handlers can relay them
// verbatim, marked with isError.

use std::fs;

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::storage::Storage;

/// Directory names hidden from listings, alongside all dotfiles
const LIST_IGNORE: [&str; 9] = [
    ".git",
    "node_modules",
    ".z-agent",
    ".claude",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
];

/// The glob search skips fewer names; build output stays matchable
const GLOB_IGNORE: [&str; 7] = [
    ".git",
    "node_modules",
    ".z-agent",
    ".claude",
    "__pycache__",
    ".venv",
    "venv",
];

// ============================================
// OUTCOMES
// ============================================

/// Outcome of a file mutation
#[derive(Debug, Clone)]
pub struct FsOutcome {
    pub success: bool,
    pub message: String,
}

impl FsOutcome {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }

    fn fail(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

/// Outcome of a file read; `lines` is the total line count of the file
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub success: bool,
    pub content: String,
    pub message: String,
    pub lines: usize,
}

impl ReadOutcome {
    fn fail(message: String) -> Self {
        Self {
            success: false,
            content: String::new(),
            message,
            lines: 0,
        }
    }
}

/// Outcome of a directory listing or glob search
#[derive(Debug, Clone)]
pub struct ListOutcome {
    pub success: bool,
    pub entries: Vec<String>,
    pub message: String,
}

impl ListOutcome {
    fn fail(message: String) -> Self {
        Self {
            success: false,
            entries: Vec::new(),
            message,
        }
    }
}

// ============================================
// FILE OPERATIONS
// ============================================

/// Writes a file, creating parent directories as needed
pub fn write_file(storage: &Storage, file_path: &str, content: &str) -> FsOutcome {
    let resolved = storage.resolve(file_path);
    let write = || -> std::io::Result<()> {
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&resolved, content)
    };
    match write() {
        Ok(()) => {
            let lines = content.split('\n').count();
            FsOutcome::ok(format!("✅ {file_path} created ({lines} lines)"))
        }
        Err(err) => FsOutcome::fail(format!("❌ Write failed: {err}")),
    }
}

/// Replaces a string in a file, first or all occurrences. Line endings of
/// the search and replacement strings are normalized to whatever the file
/// uses; if that still finds nothing the raw strings get one more try.
pub fn edit_file(
    storage: &Storage,
    file_path: &str,
    old_string: &str,
    new_string: &str,
    replace_all: bool,
) -> FsOutcome {
    let resolved = storage.resolve(file_path);
    if !resolved.exists() {
        return FsOutcome::fail(format!("❌ File not found: {file_path}"));
    }
    let content = match fs::read_to_string(&resolved) {
        Ok(c) => c,
        Err(err) => return FsOutcome::fail(format!("❌ Edit failed: {err}")),
    };

    let file_eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut old_norm = old_string.replace("\r\n", "\n");
    let mut new_norm = new_string.replace("\r\n", "\n");
    if file_eol == "\r\n" {
        old_norm = old_norm.replace('\n', "\r\n");
        new_norm = new_norm.replace('\n', "\r\n");
    }
    if !content.contains(&old_norm) {
        if !content.contains(old_string) {
            return FsOutcome::fail("❌ No matching string found".to_string());
        }
        old_norm = old_string.to_string();
        new_norm = new_string.to_string();
    }

    let (updated, replacements) = if replace_all {
        let count = content.matches(old_norm.as_str()).count();
        (content.replace(&old_norm, &new_norm), count)
    } else {
        (content.replacen(&old_norm, &new_norm, 1), 1)
    };
    match fs::write(&resolved, updated) {
        Ok(()) => FsOutcome::ok(format!("✅ {file_path} edited ({replacements} replacements)")),
        Err(err) => FsOutcome::fail(format!("❌ Edit failed: {err}")),
    }
}

/// Reads a file with an optional line window; the content comes back with
/// LF line endings regardless of what the file uses
pub fn read_file(
    storage: &Storage,
    file_path: &str,
    offset: Option<usize>,
    limit: Option<usize>,
) -> ReadOutcome {
    let resolved = storage.resolve(file_path);
    if !resolved.exists() {
        return ReadOutcome::fail(format!("❌ File not found: {file_path}"));
    }
    let content = match fs::read_to_string(&resolved) {
        Ok(c) => c.replace("\r\n", "\n"),
        Err(err) => return ReadOutcome::fail(format!("❌ Read failed: {err}")),
    };
    let all_lines: Vec<&str> = content.split('\n').collect();
    let total = all_lines.len();
    let start = offset.unwrap_or(0).min(total);
    // a limit of zero means no limit, matching the absent case
    let end = match limit {
        Some(l) if l > 0 => (start + l).min(total),
        _ => total,
    };
    ReadOutcome {
        success: true,
        content: all_lines[start..end].join("\n"),
        message: format!("✅ {file_path} read"),
        lines: total,
    }
}

// ============================================
// DIRECTORY OPERATIONS
// ============================================

fn hidden_from_listing(name: &std::ffi::OsStr) -> bool {
    match name.to_str() {
        Some(name) => LIST_IGNORE.contains(&name) || name.starts_with('.'),
        None => true,
    }
}

fn hidden_from_glob(name: &std::ffi::OsStr) -> bool {
    match name.to_str() {
        Some(name) => GLOB_IGNORE.contains(&name),
        None => true,
    }
}

/// Lists a directory, optionally recursively. Directories get a trailing
/// slash; dotfiles, dependency trees, and the bookkeeping dir are skipped
/// unless the listing starts inside one of them.
pub fn list_dir(storage: &Storage, dir_path: &str, recursive: bool) -> ListOutcome {
    let resolved = storage.resolve(dir_path);
    if !resolved.exists() {
        return ListOutcome::fail(format!("❌ Directory not found: {dir_path}"));
    }
    if !resolved.is_dir() {
        return ListOutcome::fail(format!("❌ Not a directory: {dir_path}"));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut entries = Vec::new();
    let walker = WalkDir::new(&resolved)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !hidden_from_listing(e.file_name()));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => return ListOutcome::fail(format!("❌ List failed: {err}")),
        };
        let rel = entry
            .path()
            .strip_prefix(&resolved)
            .unwrap_or_else(|_| entry.path());
        let mut name = rel.display().to_string();
        if entry.file_type().is_dir() {
            name.push('/');
        }
        entries.push(name);
    }
    entries.sort();
    let message = format!("✅ {dir_path} ({} entries)", entries.len());
    ListOutcome {
        success: true,
        entries,
        message,
    }
}

/// Finds files matching a glob pattern under a base directory. The pattern
/// is tested against the relative path and, as a fallback, against the bare
/// filename, so `main.rs` finds `src/main.rs` too.
pub fn glob_files(storage: &Storage, pattern: &str, base_path: Option<&str>) -> ListOutcome {
    let display_base = base_path.unwrap_or(".");
    let resolved = match base_path {
        Some(base) => storage.resolve(base),
        None => storage.project_root.clone(),
    };
    if !resolved.exists() {
        return ListOutcome::fail(format!("❌ Path not found: {display_base}"));
    }
    let compiled = match Pattern::new(pattern) {
        Ok(p) => p,
        Err(err) => return ListOutcome::fail(format!("❌ Glob failed: {err}")),
    };
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::default()
    };

    let mut files = Vec::new();
    let walker = WalkDir::new(&resolved)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !hidden_from_glob(e.file_name()));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => return ListOutcome::fail(format!("❌ Glob failed: {err}")),
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&resolved)
            .unwrap_or_else(|_| entry.path());
        let by_path = compiled.matches_path_with(rel, options);
        let by_name = entry
            .file_name()
            .to_str()
            .is_some_and(|name| compiled.matches_with(name, options));
        if by_path || by_name {
            files.push(rel.display().to_string());
        }
    }
    files.sort();
    let message = format!("✅ {pattern} ({} files)", files.len());
    ListOutcome {
        success: true,
        entries: files,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_storage, StorageState};
    use tempfile::TempDir;

    fn test_storage() -> (TempDir, StorageState) {
        let dir = TempDir::new().unwrap();
        let storage = init_storage(dir.path(), false);
        storage.ensure_directories().unwrap();
        (dir, storage)
    }

    #[test]
    fn write_creates_parents_and_counts_lines() {
        let (dir, storage) = test_storage();
        let result = write_file(&storage, "src/deep/notes.txt", "one\ntwo\nthree");
        assert!(result.success);
        assert_eq!(result.message, "✅ src/deep/notes.txt created (3 lines)");
        let written = fs::read_to_string(dir.path().join("src/deep/notes.txt")).unwrap();
        assert_eq!(written, "one\ntwo\nthree");
    }

    #[test]
    fn edit_replaces_first_occurrence_by_default() {
        let (dir, storage) = test_storage();
        write_file(&storage, "a.txt", "foo bar foo");
        let result = edit_file(&storage, "a.txt", "foo", "baz", false);
        assert!(result.success);
        assert_eq!(result.message, "✅ a.txt edited (1 replacements)");
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "baz bar foo");
    }

    #[test]
    fn edit_replace_all_counts_occurrences() {
        let (dir, storage) = test_storage();
        write_file(&storage, "a.txt", "foo bar foo foo");
        let result = edit_file(&storage, "a.txt", "foo", "baz", true);
        assert_eq!(result.message, "✅ a.txt edited (3 replacements)");
        assert_eq!(
            fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "baz bar baz baz"
        );
    }

    #[test]
    fn edit_failures_report_why() {
        let (_dir, storage) = test_storage();
        let result = edit_file(&storage, "missing.txt", "a", "b", false);
        assert!(!result.success);
        assert_eq!(result.message, "❌ File not found: missing.txt");

        write_file(&storage, "a.txt", "content");
        let result = edit_file(&storage, "a.txt", "absent", "b", false);
        assert!(!result.success);
        assert_eq!(result.message, "❌ No matching string found");
    }

    #[test]
    fn edit_normalizes_line_endings_to_the_files_style() {
        let (dir, storage) = test_storage();
        fs::write(dir.path().join("crlf.txt"), "line one\r\nline two\r\n").unwrap();
        let result = edit_file(&storage, "crlf.txt", "one\nline two", "one\nline 2", false);
        assert!(result.success, "{}", result.message);
        let updated = fs::read_to_string(dir.path().join("crlf.txt")).unwrap();
        assert_eq!(updated, "line one\r\nline 2\r\n");
    }

    #[test]
    fn read_applies_offset_and_limit() {
        let (_dir, storage) = test_storage();
        write_file(&storage, "r.txt", "a\nb\nc\nd");
        let result = read_file(&storage, "r.txt", Some(1), Some(2));
        assert!(result.success);
        assert_eq!(result.content, "b\nc");
        assert_eq!(result.lines, 4);

        let whole = read_file(&storage, "r.txt", None, None);
        assert_eq!(whole.content, "a\nb\nc\nd");

        let past_end = read_file(&storage, "r.txt", Some(10), Some(5));
        assert!(past_end.success);
        assert_eq!(past_end.content, "");

        let missing = read_file(&storage, "gone.txt", None, None);
        assert!(!missing.success);
        assert_eq!(missing.message, "❌ File not found: gone.txt");
    }

    #[test]
    fn read_normalizes_crlf() {
        let (dir, storage) = test_storage();
        fs::write(dir.path().join("crlf.txt"), "a\r\nb").unwrap();
        let result = read_file(&storage, "crlf.txt", None, None);
        assert_eq!(result.content, "a\nb");
    }

    #[test]
    fn listing_marks_directories_and_skips_noise() {
        let (dir, storage) = test_storage();
        write_file(&storage, "src/main.rs", "fn main() {}");
        write_file(&storage, "README.md", "hi");
        write_file(&storage, "node_modules/pkg/index.js", "x");
        fs::write(dir.path().join(".env"), "secret").unwrap();

        let result = list_dir(&storage, ".", false);
        assert!(result.success);
        // .z-agent, node_modules, and dotfiles are all invisible
        assert_eq!(result.entries, vec!["README.md", "src/"]);

        let recursive = list_dir(&storage, ".", true);
        assert_eq!(recursive.entries, vec!["README.md", "src/", "src/main.rs"]);
    }

    #[test]
    fn listing_inside_an_ignored_dir_still_works() {
        let (_dir, storage) = test_storage();
        let result = list_dir(&storage, ".z-agent", false);
        assert!(result.success);
        assert!(result.entries.contains(&"tasks/".to_string()));
    }

    #[test]
    fn listing_a_file_is_an_error() {
        let (_dir, storage) = test_storage();
        write_file(&storage, "a.txt", "x");
        let result = list_dir(&storage, "a.txt", false);
        assert!(!result.success);
        assert_eq!(result.message, "❌ Not a directory: a.txt");

        let missing = list_dir(&storage, "nope", false);
        assert_eq!(missing.message, "❌ Directory not found: nope");
    }

    #[test]
    fn glob_matches_relative_paths_and_bare_filenames() {
        let (_dir, storage) = test_storage();
        write_file(&storage, "src/main.rs", "x");
        write_file(&storage, "src/lib.rs", "x");
        write_file(&storage, "src/nested/deep.rs", "x");
        write_file(&storage, "build.log", "x");

        let nested = glob_files(&storage, "**/*.rs", None);
        assert!(nested.success);
        assert_eq!(
            nested.entries,
            vec!["src/lib.rs", "src/main.rs", "src/nested/deep.rs"]
        );

        // a single star stays inside one directory
        let scoped = glob_files(&storage, "src/*.rs", None);
        assert_eq!(scoped.entries, vec!["src/lib.rs", "src/main.rs"]);

        // a bare filename matches anywhere
        let by_name = glob_files(&storage, "main.rs", None);
        assert_eq!(by_name.entries, vec!["src/main.rs"]);
    }

    #[test]
    fn glob_searches_build_output_that_listings_hide() {
        let (_dir, storage) = test_storage();
        write_file(&storage, "dist/bundle.js", "x");
        write_file(&storage, "node_modules/pkg/index.js", "x");

        let hits = glob_files(&storage, "**/*.js", None);
        assert_eq!(hits.entries, vec!["dist/bundle.js"]);

        let listing = list_dir(&storage, ".", false);
        assert!(!listing.entries.contains(&"dist/".to_string()));
    }

    #[test]
    fn glob_with_base_path_reports_missing_roots() {
        let (_dir, storage) = test_storage();
        write_file(&storage, "src/main.rs", "x");
        let result = glob_files(&storage, "*.rs", Some("src"));
        assert_eq!(result.entries, vec!["main.rs"]);

        let missing = glob_files(&storage, "*.rs", Some("nope"));
        assert!(!missing.success);
        assert_eq!(missing.message, "❌ Path not found: nope");
    }
}
