//! Artifact resolution and size measurement.
//!
//! Turns a list of user expressions (files, directories, glob-like patterns)
//! into measured files: raw size, gzip size, and the hash-free stable name
//! produced by [`crate::naming`].

use crate::naming::{remove_base_folder, remove_file_name_hash};
use anyhow::{Context, Result};
use flate2::Compression;
use serde::Serialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions measured by default when a directory is given without an
/// include pattern. Exclude takes precedence, so these are easy to narrow.
const DEFAULT_INCLUDE_PATTERN: &str = ".js .jsx .js.map .ts .tsx .css .json .jpg .jpeg .gif .png";

/// Errors from resolving file expressions.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("the pattern \"{0}\" does not match any files")]
    EmptyPattern(String),

    #[error(
        "no files found in directory \"{directory}\" with include pattern \
         \"{include}\" and exclude pattern \"{exclude}\""
    )]
    EmptyDirectory {
        directory: String,
        include: String,
        exclude: String,
    },
}

/// A file to be measured, together with the base folder its stable name is
/// relative to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSpec {
    pub root: PathBuf,
    pub filename: PathBuf,
}

/// A measured file, ready for submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasuredFile {
    /// Stable identifier: root-relative filename with the hash stripped.
    pub name: String,
    pub root: String,
    pub filename: String,
    /// The stripped hash, empty when the filename had none.
    pub hash: String,
    pub raw_size: u64,
    pub gzip_size: u64,
}

/// Include/exclude patterns applied when a directory is searched.
#[derive(Debug, Clone, Default)]
pub struct MatchingOptions {
    pub include: Option<String>,
    pub exclude: Option<String>,
}

/// Resolve expressions into concrete files. Each expression can be a file,
/// a directory, or a pattern with `*`/`**` wildcards. Duplicates are
/// dropped, first occurrence wins.
pub fn resolve_file_expressions(
    exprs: &[String],
    opts: &MatchingOptions,
) -> Result<Vec<FileSpec>, ResolveError> {
    let mut specs = Vec::new();
    let mut seen = HashSet::new();

    for expr in exprs {
        let found = if has_magic(expr) {
            resolve_pattern(expr)?
        } else {
            let path = Path::new(expr);
            match std::fs::metadata(path) {
                Ok(meta) if meta.is_dir() => find_files_in_directory(path, opts)?,
                Ok(_) => vec![FileSpec {
                    root: PathBuf::new(),
                    filename: path.to_path_buf(),
                }],
                Err(_) => return Err(ResolveError::NotFound(expr.clone())),
            }
        };

        for spec in found {
            if seen.insert(spec.filename.clone()) {
                specs.push(spec);
            }
        }
    }

    Ok(specs)
}

/// Measure every resolved file: raw size, gzip size, stable name.
pub fn measure_files(specs: &[FileSpec]) -> Result<Vec<MeasuredFile>> {
    specs.iter().map(measure_file).collect()
}

/// Resolve and measure in one step.
pub fn collect_files(
    exprs: &[String],
    opts: &MatchingOptions,
) -> Result<Vec<MeasuredFile>> {
    let specs = resolve_file_expressions(exprs, opts)?;
    measure_files(&specs)
}

fn measure_file(spec: &FileSpec) -> Result<MeasuredFile> {
    // Normalize both paths so `./`-prefixes never leak into stable names.
    let root = normalize_path(&spec.root);
    let filename = normalize_path(&spec.filename);

    let root_str = root.to_string_lossy().to_string();
    let filename_str = filename.to_string_lossy().to_string();

    let relative = remove_base_folder(&root_str, &filename_str);
    let extraction = remove_file_name_hash(&relative);

    let contents = std::fs::read(&filename)
        .with_context(|| format!("Failed to read file: {filename_str}"))?;

    tracing::debug!(
        file = %filename_str,
        name = %extraction.filename,
        hash = %extraction.hash,
        "measured artifact"
    );

    Ok(MeasuredFile {
        name: extraction.filename,
        root: root_str,
        filename: filename_str,
        hash: extraction.hash,
        raw_size: contents.len() as u64,
        gzip_size: gzip_size(&contents)?,
    })
}

/// Size of the file contents after gzip compression at the default level
/// bundlers and web servers commonly use.
fn gzip_size(data: &[u8]) -> Result<u64> {
    let mut encoder = flate2::read::GzEncoder::new(data, Compression::new(6));
    let mut out = Vec::new();
    encoder
        .read_to_end(&mut out)
        .context("Failed to gzip file contents")?;
    Ok(out.len() as u64)
}

/// Recursively find files under a directory, honoring include/exclude.
fn find_files_in_directory(
    directory: &Path,
    opts: &MatchingOptions,
) -> Result<Vec<FileSpec>, ResolveError> {
    let include_raw = match (&opts.include, &opts.exclude) {
        (None, None) => DEFAULT_INCLUDE_PATTERN.to_string(),
        (include, _) => include.clone().unwrap_or_default(),
    };
    let include = parse_include_pattern(&include_raw);
    let exclude = opts
        .exclude
        .as_deref()
        .map(parse_include_pattern)
        .unwrap_or_default();

    let mut specs = Vec::new();

    for entry in WalkDir::new(directory).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let path_str = path.to_string_lossy();

        let mut included = include.is_empty() || matches_any(&include, &path_str);
        if !exclude.is_empty() {
            // Exclude patterns take precedence over the include list.
            included = included && !matches_any(&exclude, &path_str);
        }

        if included {
            specs.push(FileSpec {
                root: directory.to_path_buf(),
                filename: path.to_path_buf(),
            });
        }
    }

    if specs.is_empty() {
        return Err(ResolveError::EmptyDirectory {
            directory: directory.to_string_lossy().to_string(),
            include: include.join(","),
            exclude: exclude.join(","),
        });
    }

    Ok(specs)
}

/// Expand a wildcard expression by walking from its non-magic prefix.
/// Matched files share their common path prefix as the root.
fn resolve_pattern(expr: &str) -> Result<Vec<FileSpec>, ResolveError> {
    let walk_root = pattern_walk_root(expr);

    let mut matches: Vec<PathBuf> = WalkDir::new(&walk_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| glob_match(expr, &p.to_string_lossy()))
        .collect();
    matches.sort();

    if matches.is_empty() {
        return Err(ResolveError::EmptyPattern(expr.to_string()));
    }

    let prefix = common_path_prefix(&matches);
    Ok(matches
        .into_iter()
        .map(|filename| FileSpec {
            root: prefix.clone(),
            filename,
        })
        .collect())
}

/// Does the expression contain wildcard characters?
fn has_magic(expr: &str) -> bool {
    expr.contains(['*', '?', '['])
}

/// The directory to start walking from: everything before the last path
/// separator preceding the first wildcard.
fn pattern_walk_root(expr: &str) -> PathBuf {
    let magic_at = expr
        .find(['*', '?', '['])
        .unwrap_or(expr.len());
    match expr[..magic_at].rfind('/') {
        Some(idx) => PathBuf::from(&expr[..idx]),
        None => PathBuf::from("."),
    }
}

/// Rather than a true pattern, users may just give a list of file
/// extensions (".js .css" or comma/semicolon separated); each expands to a
/// `*<ext>` alternative. A real wildcard pattern is passed through.
fn parse_include_pattern(pattern: &str) -> Vec<String> {
    if pattern.is_empty() {
        return Vec::new();
    }

    if has_magic(pattern) {
        return vec![pattern.to_string()];
    }

    pattern
        .split([',', ';', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| format!("*{part}"))
        .collect()
}

fn matches_any(patterns: &[String], path: &str) -> bool {
    patterns.iter().any(|pattern| {
        if pattern.contains('/') {
            glob_match(pattern, path)
        } else {
            // Bare patterns match against the basename.
            let basename = path.rsplit('/').next().unwrap_or(path);
            glob_match(pattern, basename) || glob_match(pattern, path)
        }
    })
}

/// Simple wildcard matching (supports * and **).
fn glob_match(pattern: &str, path: &str) -> bool {
    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.split("**").collect();
        if parts.len() == 2 {
            let prefix = parts[0].trim_end_matches('/');
            let suffix = parts[1].trim_start_matches('/');
            return (prefix.is_empty() || path.starts_with(prefix))
                && (suffix.is_empty() || path.ends_with(suffix));
        }
    }

    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            return path.starts_with(parts[0]) && path.ends_with(parts[1]);
        }
    }

    path == pattern
}

/// Longest common directory prefix of a list of paths.
fn common_path_prefix(paths: &[PathBuf]) -> PathBuf {
    let Some(first) = paths.first() else {
        return PathBuf::new();
    };

    let mut prefix: &Path = match first.parent() {
        Some(parent) => parent,
        None => return PathBuf::new(),
    };

    for path in &paths[1..] {
        while !path.starts_with(prefix) {
            prefix = match prefix.parent() {
                Some(parent) => parent,
                None => return PathBuf::new(),
            };
        }
    }

    prefix.to_path_buf()
}

/// Clean up `./` segments and redundant separators.
fn normalize_path(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path == Path::new(".") {
        return PathBuf::new();
    }
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_include_pattern_extension_list() {
        assert_eq!(
            parse_include_pattern(".js .css"),
            vec!["*.js".to_string(), "*.css".to_string()]
        );
        assert_eq!(parse_include_pattern(".js,.map"), vec!["*.js", "*.map"]);
    }

    #[test]
    fn test_parse_include_pattern_passes_wildcards_through() {
        assert_eq!(parse_include_pattern("dist/*.js"), vec!["dist/*.js"]);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.js", "app.js"));
        assert!(glob_match("dist/**/*.js", "dist/vendor/app.js"));
        assert!(!glob_match("*.css", "app.js"));
    }

    #[test]
    fn test_common_path_prefix() {
        let paths = vec![
            PathBuf::from("dist/js/app.js"),
            PathBuf::from("dist/css/app.css"),
        ];
        assert_eq!(common_path_prefix(&paths), PathBuf::from("dist"));
    }

    #[test]
    fn test_resolve_single_file() {
        let dir = TempDir::new().unwrap();
        let file = write_file(dir.path(), "app.js", b"var x = 1;");

        let specs = resolve_file_expressions(
            &[file.to_string_lossy().to_string()],
            &MatchingOptions::default(),
        )
        .unwrap();

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].root, PathBuf::new());
        assert_eq!(specs[0].filename, file);
    }

    #[test]
    fn test_resolve_missing_file_fails() {
        let err = resolve_file_expressions(
            &["does/not/exist.js".to_string()],
            &MatchingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_resolve_directory_with_default_includes() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "app.js", b"var x = 1;");
        write_file(dir.path(), "notes.txt", b"not an artifact");

        let specs = resolve_file_expressions(
            &[dir.path().to_string_lossy().to_string()],
            &MatchingOptions::default(),
        )
        .unwrap();

        assert_eq!(specs.len(), 1);
        assert!(specs[0].filename.ends_with("app.js"));
        assert_eq!(specs[0].root, dir.path());
    }

    #[test]
    fn test_exclude_takes_precedence() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "app.js", b"var x = 1;");
        write_file(dir.path(), "app.min.js", b"var x=1;");

        let specs = resolve_file_expressions(
            &[dir.path().to_string_lossy().to_string()],
            &MatchingOptions {
                include: Some(".js".to_string()),
                exclude: Some("*.min.js".to_string()),
            },
        )
        .unwrap();

        assert_eq!(specs.len(), 1);
        assert!(specs[0].filename.ends_with("app.js"));
    }

    #[test]
    fn test_empty_directory_fails() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "notes.txt", b"nothing measurable");

        let err = resolve_file_expressions(
            &[dir.path().to_string_lossy().to_string()],
            &MatchingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::EmptyDirectory { .. }));
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let dir = TempDir::new().unwrap();
        let file = write_file(dir.path(), "app.js", b"var x = 1;");
        let expr = file.to_string_lossy().to_string();

        let specs = resolve_file_expressions(
            &[expr.clone(), expr],
            &MatchingOptions::default(),
        )
        .unwrap();
        assert_eq!(specs.len(), 1);
    }

    #[test]
    fn test_measure_computes_sizes_and_stable_name() {
        let dir = TempDir::new().unwrap();
        let contents = b"console.log('hello hello hello hello');\n";
        write_file(dir.path(), "app.a43ff0.js", contents);

        let specs = vec![FileSpec {
            root: dir.path().to_path_buf(),
            filename: dir.path().join("app.a43ff0.js"),
        }];
        let measured = measure_files(&specs).unwrap();

        assert_eq!(measured.len(), 1);
        let file = &measured[0];
        assert_eq!(file.name, "app.js");
        assert_eq!(file.hash, "a43ff0");
        assert_eq!(file.raw_size, contents.len() as u64);
        assert!(file.gzip_size > 0);
    }

    #[test]
    fn test_pattern_resolution() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "out/app.js", b"var x = 1;");
        write_file(dir.path(), "out/vendor.js", b"var y = 2;");
        write_file(dir.path(), "out/style.css", b"body {}");

        let pattern = format!("{}/out/*.js", dir.path().to_string_lossy());
        let specs = resolve_file_expressions(&[pattern], &MatchingOptions::default()).unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].root, dir.path().join("out"));
    }
}
