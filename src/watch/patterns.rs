// src/watch/patterns.rs

//! Glob-style watch specifications compiled into regex matchers.
//!
//! A specification such as `src/**/*.rs` is split into a *directory part*
//! (`src/**`), which decides which directories get subscribed, and a
//! *file-name part* (`*.rs`), which decides which changed entries are
//! reported. Directory candidates are relative, `/`-terminated strings (see
//! [`normalize_dir`]); the watch base itself is the empty string.
//!
//! Translation rules for the directory part:
//!
//! - `**` matches zero or more whole segments: `([^/]*/)*`
//! - `*` inside a segment matches a run of non-separator characters: `[^/]*`
//! - every other character is literal
//!
//! A specification without any `*` is sugar for "that directory and
//! everything beneath it", i.e. `foo` is `foo/**/*`.

use std::fmt;
use std::path::PathBuf;

use regex::Regex;

use crate::errors::{RecmdError, Result};
use crate::watch::path_utils::{collapse_separators, normalize_dir, strip_dot_prefix};

/// Include pattern used when none is given: everything, at any depth.
pub const DEFAULT_INCLUDE: &str = "**/*";

/// Version-control metadata is never watched.
pub const DEFAULT_EXCLUDE: &str = "**/.git/**/*";

const ANY_SEGMENTS: &str = "([^/]*/)*";
const ANY_IN_SEGMENT: &str = "[^/]*";

/// What to watch, as given by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    pub include: String,
    pub excludes: Vec<String>,
}

impl WatchSpec {
    /// Build a spec; [`DEFAULT_EXCLUDE`] is always appended to the exclusions.
    pub fn new(include: impl Into<String>, excludes: Vec<String>) -> Self {
        let mut excludes = excludes;
        if !excludes.iter().any(|e| e == DEFAULT_EXCLUDE) {
            excludes.push(DEFAULT_EXCLUDE.to_string());
        }
        Self {
            include: include.into(),
            excludes,
        }
    }

    pub fn compile(&self) -> Result<PathMatcher> {
        PathMatcher::new(&self.include, &self.excludes)
    }

    /// Directory the initial walk starts from, relative to the watch base.
    ///
    /// This is the first segment of the include pattern when it is a plain
    /// name, and the base itself otherwise.
    pub fn watch_root(&self) -> PathBuf {
        let normalized = normalize_spec(&self.include);
        match normalized.split('/').next() {
            Some(first) if !first.is_empty() && !first.contains('*') => PathBuf::from(first),
            _ => PathBuf::from("."),
        }
    }
}

impl Default for WatchSpec {
    fn default() -> Self {
        Self::new(DEFAULT_INCLUDE, Vec::new())
    }
}

/// Matches the base name of a changed entry against the file-name part of a
/// specification. Runs of `*` match anything; the match is anchored at the
/// end of the name only.
#[derive(Clone)]
pub struct FileNameMatcher {
    regex: Option<Regex>,
}

impl FileNameMatcher {
    /// A matcher that accepts every name.
    pub fn any() -> Self {
        Self { regex: None }
    }

    pub fn compile(file_part: &str) -> Result<Self> {
        if file_part.chars().all(|c| c == '*') {
            return Ok(Self::any());
        }
        let source = file_regex_source(file_part);
        let regex = Regex::new(&source).map_err(|source| RecmdError::Pattern {
            pattern: file_part.to_string(),
            source,
        })?;
        Ok(Self { regex: Some(regex) })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.as_ref().is_none_or(|r| r.is_match(name))
    }

    pub fn matches_everything(&self) -> bool {
        self.regex.is_none()
    }
}

impl fmt::Debug for FileNameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.regex {
            Some(r) => write!(f, "FileNameMatcher({})", r.as_str()),
            None => f.write_str("FileNameMatcher(*)"),
        }
    }
}

/// One compiled specification: directory regex plus file-name matcher.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    spec: String,
    dir: Regex,
    file_name: FileNameMatcher,
    open_ended: bool,
}

impl CompiledPattern {
    pub fn compile(spec: &str) -> Result<Self> {
        let normalized = normalize_spec(spec);
        let (dir_part, file_part) = split_spec(&normalized);

        let dir = Regex::new(&dir_regex_source(dir_part)).map_err(|source| {
            RecmdError::Pattern {
                pattern: spec.to_string(),
                source,
            }
        })?;
        let file_name = match file_part {
            Some(part) => FileNameMatcher::compile(part)?,
            None => FileNameMatcher::any(),
        };

        let open_ended = dir_part.rsplit('/').next() == Some("**");
        Ok(Self {
            spec: normalized,
            dir,
            file_name,
            open_ended,
        })
    }

    /// The normalised specification this pattern was built from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// The anchored regex applied to directory candidates.
    pub fn dir_pattern(&self) -> &str {
        self.dir.as_str()
    }

    pub fn matches_dir(&self, normalized_dir: &str) -> bool {
        self.dir.is_match(normalized_dir)
    }

    pub fn matches_file_name(&self, name: &str) -> bool {
        self.file_name.is_match(name)
    }

    /// True if the pattern covers whole directories rather than a subset of
    /// the files inside them.
    pub fn covers_whole_dirs(&self) -> bool {
        self.file_name.matches_everything()
    }

    /// True if every directory below a matching directory matches as well,
    /// i.e. the directory part ends in `**` and the pattern covers whole
    /// directories.
    pub fn covers_subtrees(&self) -> bool {
        self.open_ended && self.covers_whole_dirs()
    }
}

/// Compiled include pattern plus exclusions. Exclusions are always checked
/// first.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include: CompiledPattern,
    excludes: Vec<CompiledPattern>,
}

impl PathMatcher {
    pub fn new<S: AsRef<str>>(include: &str, excludes: &[S]) -> Result<Self> {
        let include = CompiledPattern::compile(include)?;
        let excludes = excludes
            .iter()
            .map(|e| CompiledPattern::compile(e.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { include, excludes })
    }

    pub fn include(&self) -> &CompiledPattern {
        &self.include
    }

    /// Should the directory at relative path `dir` be subscribed?
    ///
    /// An exclusion only removes a directory when it covers the whole
    /// directory (its file-name part is empty or `*`); exclusions such as
    /// `**/*.tmp` filter reported files instead.
    pub fn is_watch_dir(&self, dir: &str) -> bool {
        let dir = normalize_dir(dir);
        if self
            .excludes
            .iter()
            .any(|e| e.covers_whole_dirs() && e.matches_dir(&dir))
        {
            return false;
        }
        self.include.matches_dir(&dir)
    }

    /// Can the walk skip everything below `dir`? True when an exclusion
    /// removes `dir` together with its whole subtree.
    pub fn is_pruned(&self, dir: &str) -> bool {
        let dir = normalize_dir(dir);
        self.excludes
            .iter()
            .any(|e| e.covers_subtrees() && e.matches_dir(&dir))
    }

    /// Should a change to the entry at relative path `rel_path` be reported?
    ///
    /// The entry is dropped when it lies in an excluded directory, or is
    /// itself a directory that an exclusion removes (`node_modules` for
    /// `-e node_modules`).
    pub fn is_reportable(&self, rel_path: &str) -> bool {
        let trimmed = rel_path.trim_end_matches('/');
        let (parent, name) = match trimmed.rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", trimmed),
        };
        let parent = normalize_dir(parent);
        let as_dir = normalize_dir(trimmed);

        if self.excludes.iter().any(|e| {
            (e.matches_dir(&parent) && e.matches_file_name(name))
                || (!as_dir.is_empty() && e.covers_whole_dirs() && e.matches_dir(&as_dir))
        }) {
            return false;
        }
        self.include.matches_file_name(name)
    }

    /// File-name test alone, for paths that cannot be related to the base.
    pub fn matches_file_name(&self, name: &str) -> bool {
        self.include.matches_file_name(name)
    }
}

/// Normalise a user specification: trim, collapse separators, strip `./`
/// prefixes and expand the wildcard-free sugar form.
pub fn normalize_spec(spec: &str) -> String {
    let collapsed = collapse_separators(spec.trim());
    let stripped = strip_dot_prefix(&collapsed);

    let as_dir = stripped.trim_end_matches('/');
    if as_dir.is_empty() || as_dir == "." {
        return DEFAULT_INCLUDE.to_string();
    }

    if stripped.contains('*') {
        stripped.to_string()
    } else {
        format!("{as_dir}/{DEFAULT_INCLUDE}")
    }
}

/// Split a normalised specification into its directory part and optional
/// file-name part.
///
/// A trailing `/`, or a final segment without `*`, makes the whole
/// specification a directory scope.
pub fn split_spec(normalized: &str) -> (&str, Option<&str>) {
    if let Some(dir) = normalized.strip_suffix('/') {
        return (dir, None);
    }
    match normalized.rsplit_once('/') {
        Some((dir, last)) if last.contains('*') => (dir, Some(last)),
        Some(_) => (normalized, None),
        None if normalized.contains('*') => ("", Some(normalized)),
        None => (normalized, None),
    }
}

/// Regex source for a directory part, anchored at both ends.
pub fn dir_regex_source(dir_part: &str) -> String {
    let mut pattern = String::from("^");
    for segment in dir_part.split('/').filter(|s| !s.is_empty()) {
        if segment == "**" {
            pattern.push_str(ANY_SEGMENTS);
            continue;
        }
        let translated: Vec<String> = segment.split('*').map(regex::escape).collect();
        pattern.push_str(&translated.join(ANY_IN_SEGMENT));
        pattern.push('/');
    }
    pattern.push('$');
    pattern
}

/// Regex source for a file-name part, anchored at the end only.
pub fn file_regex_source(file_part: &str) -> String {
    let mut collapsed = String::with_capacity(file_part.len());
    for c in file_part.chars() {
        if !(c == '*' && collapsed.ends_with('*')) {
            collapsed.push(c);
        }
    }
    let pieces: Vec<String> = collapsed.split('*').map(regex::escape).collect();
    format!("{}$", pieces.join(".*"))
}
