//! POSIX shell snippets that export app variables and extend `PATH`.
//!
//! The output is meant to be evaluated by the calling shell, e.g. `eval "$(qh add java)"`.

use std::{collections::HashSet, fmt};

use qh_config::{catalog::AppSetup, config::QhConfig, error::Result as ConfigResult};

pub const PATH_SEPARATOR: char = ':';

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Script {
    lines: Vec<String>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `export VAR="value"`.
    pub fn set(&mut self, var: &str, value: &str) {
        self.lines.push(format!("export {var}={}", quote(value)));
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Double-quotes `value` for a POSIX shell, escaping everything the shell would expand.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '`' | '$') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Insertion-ordered set of `PATH` entries.
#[derive(Debug, Default, Clone)]
pub struct PathSet {
    entries: Vec<String>,
    seen: HashSet<String>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a `PATH`-style value into its entries.
    pub fn parse(value: &str) -> Self {
        let mut set = Self::new();
        set.extend(value.split(PATH_SEPARATOR));
        set
    }

    /// Adds `entry` unless it is empty or already present. Returns whether it was added.
    pub fn add(&mut self, entry: impl Into<String>) -> bool {
        let entry = entry.into();
        if entry.is_empty() || self.seen.contains(&entry) {
            return false;
        }
        self.seen.insert(entry.clone());
        self.entries.push(entry);
        true
    }

    pub fn extend<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for entry in entries {
            self.add(entry);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn join(&self) -> String {
        self.entries.join(&PATH_SEPARATOR.to_string())
    }
}

/// Exports `PATH` as `entries` followed by the entries of `current_path`.
///
/// Nothing is emitted when `entries` is empty.
pub fn prepend_path(script: &mut Script, entries: &PathSet, current_path: Option<&str>) {
    if entries.is_empty() {
        return;
    }

    let mut path = entries.clone();
    if let Some(current) = current_path {
        path.extend(current.split(PATH_SEPARATOR));
    }
    script.set("PATH", &path.join());
}

/// Script for `apps`: each app's `sets`, then `PATH` with the app directories in front.
pub fn setup_apps(
    config: &QhConfig,
    apps: &[&AppSetup],
    current_path: Option<&str>,
) -> ConfigResult<Script> {
    let mut script = Script::new();
    let mut paths = PathSet::new();

    for app in apps {
        paths.add(config.app_path(app)?.to_string_lossy());
        for (var, value) in &app.sets {
            script.set(var, &config.expand_within(value, app)?);
        }
    }

    prepend_path(&mut script, &paths, current_path);
    Ok(script)
}
