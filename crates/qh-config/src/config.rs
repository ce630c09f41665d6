use std::{
    collections::{BTreeMap, HashMap},
    env, fs,
    path::{Path, PathBuf},
};

use qh_utils::path::{expand_with, xdg_config_home};
use serde::Deserialize;
use tracing::debug;

use crate::{
    catalog::{AppCatalog, AppEntry, AppSetup},
    error::{ConfigError, Result},
};

/// Variable holding the directory relative app paths are resolved against.
pub const ROOT_VAR: &str = "ROOT";
/// Variable that expands to an app's own resolved path inside its `sets`.
pub const APP_PATH_VAR: &str = "HQPATH";

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default, alias = "Vars")]
    vars: HashMap<String, String>,
    #[serde(default, alias = "Apps")]
    apps: BTreeMap<String, AppEntry>,
}

/// Application configuration: user variables and the app catalog.
#[derive(Clone, Debug, Default)]
pub struct QhConfig {
    pub vars: HashMap<String, String>,
    pub apps: AppCatalog,
}

/// Location of the config file: `$QH_CONFIG`, else `$XDG_CONFIG_HOME/qh/config.json`.
pub fn config_path() -> PathBuf {
    match env::var("QH_CONFIG") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => xdg_config_home().join("qh").join("config.json"),
    }
}

impl QhConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;

        Ok(Self {
            vars: raw.vars,
            apps: raw
                .apps
                .into_iter()
                .map(|(name, entry)| entry.into_setup(name))
                .collect(),
        })
    }

    /// Reads the config file at `path`.
    ///
    /// When the file does not define `ROOT`, it is set to the directory holding the file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| {
            ConfigError::Read {
                path: path.to_path_buf(),
                source: err,
            }
        })?;

        let mut config = Self::from_json(&content)?;
        if !config.has_root() {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => std::path::absolute(dir),
                _ => env::current_dir(),
            }
            .map_err(|err| {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                }
            })?;
            config.set_root(dir.to_string_lossy());
        }

        debug!(
            "Loaded {} apps from {}",
            config.apps.len(),
            path.display()
        );

        Ok(config)
    }

    pub fn root(&self) -> Option<&str> {
        self.vars.get(ROOT_VAR).map(String::as_str)
    }

    pub fn set_root(&mut self, root: impl Into<String>) {
        self.vars.insert(ROOT_VAR.to_string(), root.into());
    }

    pub fn has_root(&self) -> bool {
        self.vars.contains_key(ROOT_VAR)
    }

    /// Expands `path` and anchors it at `ROOT` unless it is already absolute.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let expanded = PathBuf::from(self.expand(path)?);
        if expanded.is_absolute() {
            return Ok(expanded);
        }

        Ok(match self.root() {
            Some(root) => Path::new(root).join(expanded),
            None => expanded,
        })
    }

    /// Resolved install directory of `app`.
    pub fn app_path(&self, app: &AppSetup) -> Result<PathBuf> {
        self.resolve(&app.path)
    }

    /// Expands `$VAR` and `${VAR}` from `vars`. Unknown variables expand to nothing.
    pub fn expand(&self, text: &str) -> Result<String> {
        Ok(expand_with(text, |var| {
            Some(self.vars.get(var).cloned().unwrap_or_default())
        })?)
    }

    /// Expands `text` in the scope of `app`.
    ///
    /// Lookup order is the app's own `sets`, then `HQPATH` as the app's resolved path, then
    /// `vars`. Values in `sets` may use `HQPATH` and `vars` but not each other.
    pub fn expand_within(&self, text: &str, app: &AppSetup) -> Result<String> {
        let app_path = self.app_path(app)?.to_string_lossy().into_owned();
        let scoped = |var: &str| -> String {
            if var == APP_PATH_VAR {
                app_path.clone()
            } else {
                self.vars.get(var).cloned().unwrap_or_default()
            }
        };

        let sets = app
            .sets
            .iter()
            .map(|(var, value)| -> Result<(&str, String)> {
                Ok((var.as_str(), expand_with(value, |v| Some(scoped(v)))?))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(expand_with(text, |var| {
            Some(sets.get(var).cloned().unwrap_or_else(|| scoped(var)))
        })?)
    }

    /// Apps in dependency order, see [`AppCatalog::resolve_all`].
    pub fn resolve_apps<I, S>(&self, names: I) -> Result<Vec<&AppSetup>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.apps.resolve_all(names)
    }

    /// Checks that every app path exists and is a directory.
    pub fn check(&self) -> Vec<ConfigError> {
        let mut problems = Vec::new();

        for app in self.apps.iter() {
            let path = match self.app_path(app) {
                Ok(path) => path,
                Err(err) => {
                    problems.push(err);
                    continue;
                }
            };

            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    problems.push(ConfigError::AppPathNotDirectory {
                        app: app.name.clone(),
                        path,
                    })
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    problems.push(ConfigError::MissingAppPath {
                        app: app.name.clone(),
                        path,
                    })
                }
                Err(err) => {
                    problems.push(ConfigError::AppPathInaccessible {
                        app: app.name.clone(),
                        path,
                        source: err,
                    })
                }
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const SAMPLE: &str = r#"{
        "vars": { "ROOT": "/opt/tools", "JDK": "jdk-21" },
        "apps": {
            "java": {
                "path": "$JDK",
                "uses": ["maven"],
                "sets": { "JAVA_HOME": "$HQPATH", "JAVA_OPTS": "-Dvendor=${JDK}" },
                "url": "https://example.com/jdk-21.tar.gz"
            },
            "maven": "maven/bin",
            "abs": "/usr/local/abs"
        }
    }"#;

    #[test]
    fn test_from_json() {
        let config = QhConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.root(), Some("/opt/tools"));
        assert_eq!(config.apps.len(), 3);

        let java = config.apps.get("java").unwrap();
        assert_eq!(java.name, "java");
        assert_eq!(java.uses, ["maven"]);
        assert_eq!(java.url.as_deref(), Some("https://example.com/jdk-21.tar.gz"));
        assert_eq!(config.apps.get("maven").unwrap().path, "maven/bin");
    }

    #[test]
    fn test_from_json_capitalized_keys() {
        let config = QhConfig::from_json(
            r#"{"Vars": {"ROOT": "/r"}, "Apps": {"go": {"Path": "go/bin", "Sets": {"GOROOT": "$HQPATH"}}}}"#,
        )
        .unwrap();

        let go = config.apps.get("go").unwrap();
        assert_eq!(go.path, "go/bin");
        assert_eq!(
            config.expand_within("$GOROOT", go).unwrap(),
            "/r/go/bin"
        );
    }

    #[test]
    fn test_from_json_empty_and_invalid() {
        let config = QhConfig::from_json("{}").unwrap();
        assert!(config.apps.is_empty());
        assert!(!config.has_root());

        assert!(matches!(
            QhConfig::from_json("{\"apps\": [1, 2]}"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_resolve() {
        let config = QhConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.resolve("/abs/path").unwrap(), PathBuf::from("/abs/path"));
        assert_eq!(
            config.resolve("maven/bin").unwrap(),
            PathBuf::from("/opt/tools/maven/bin")
        );
        assert_eq!(config.resolve("$JDK").unwrap(), PathBuf::from("/opt/tools/jdk-21"));
        assert_eq!(
            config.resolve("$ROOT/x").unwrap(),
            PathBuf::from("/opt/tools/x")
        );
    }

    #[test]
    fn test_resolve_without_root() {
        let config = QhConfig::default();
        assert_eq!(config.resolve("rel").unwrap(), PathBuf::from("rel"));
    }

    #[test]
    fn test_expand() {
        let config = QhConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.expand("${JDK}-home").unwrap(), "jdk-21-home");
        assert_eq!(config.expand("[$UNDEFINED]").unwrap(), "[]");
        assert_eq!(config.expand("cost: $").unwrap(), "cost: $");
        assert!(config.expand("${JDK").is_err());
    }

    #[test]
    fn test_expand_within_lookup_order() {
        let mut config = QhConfig::from_json(SAMPLE).unwrap();
        config.vars.insert("JAVA_HOME".into(), "/shadowed".into());
        let java = config.apps.get("java").unwrap();

        assert_eq!(
            config.expand_within("$JAVA_HOME/bin", java).unwrap(),
            "/opt/tools/jdk-21/bin"
        );
        assert_eq!(
            config.expand_within("$HQPATH:$JAVA_OPTS:$JDK:$NOPE", java).unwrap(),
            "/opt/tools/jdk-21:-Dvendor=jdk-21:jdk-21:"
        );
    }

    #[test]
    fn test_load_sets_root_to_config_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"apps": {"tool": "tool/bin"}}"#).unwrap();

        let config = QhConfig::load(&path).unwrap();
        assert_eq!(config.root(), Some(dir.path().to_string_lossy().as_ref()));
        assert_eq!(
            config.app_path(config.apps.get("tool").unwrap()).unwrap(),
            dir.path().join("tool/bin")
        );
    }

    #[test]
    fn test_load_keeps_explicit_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"vars": {"ROOT": "/srv"}}"#).unwrap();

        assert_eq!(QhConfig::load(&path).unwrap().root(), Some("/srv"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = QhConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_check() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("good")).unwrap();
        fs::write(dir.path().join("file"), "x").unwrap();

        let mut config = QhConfig::from_json(
            r#"{"apps": {"good": "good", "file": "file", "gone": "gone"}}"#,
        )
        .unwrap();
        config.set_root(dir.path().to_string_lossy());

        let problems = config.check();
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| matches!(
            p,
            ConfigError::AppPathNotDirectory { app, .. } if app == "file"
        )));
        assert!(problems.iter().any(|p| matches!(
            p,
            ConfigError::MissingAppPath { app, .. } if app == "gone"
        )));
    }

    #[test]
    fn test_resolve_apps() {
        let config = QhConfig::from_json(SAMPLE).unwrap();
        let apps = config.resolve_apps(["java"]).unwrap();

        let names: Vec<_> = apps.iter().map(|app| app.name.as_str()).collect();
        assert_eq!(names, ["java", "maven"]);
    }
}
