use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// A named app: where it lives, what it needs and which variables it exports.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AppSetup {
    /// Catalog key. Filled in when the app is added to a catalog.
    #[serde(skip)]
    pub name: String,

    /// Install directory, absolute or relative to `ROOT`. May reference `vars`.
    #[serde(default, alias = "Path")]
    pub path: String,

    /// Names of apps this app depends on, in declaration order.
    #[serde(default, alias = "Uses")]
    pub uses: Vec<String>,

    /// Variables exported when the app is added. Values may reference `$HQPATH`.
    #[serde(default, alias = "Sets")]
    pub sets: BTreeMap<String, String>,

    /// Package archive to install the app from.
    #[serde(default, alias = "Url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl AppSetup {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn uses<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uses.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn sets(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        self.sets.insert(var.into(), value.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// An app given either as a bare path or as a full setup.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum AppEntry {
    Path(String),
    Setup(AppSetup),
}

impl AppEntry {
    pub(crate) fn into_setup(self, name: String) -> AppSetup {
        match self {
            AppEntry::Path(path) => AppSetup::new(name, path),
            AppEntry::Setup(setup) => AppSetup { name, ..setup },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppCatalog {
    apps: BTreeMap<String, AppSetup>,
}

impl AppCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `app` under its name, returning the app it replaced.
    pub fn add(&mut self, app: AppSetup) -> Option<AppSetup> {
        self.apps.insert(app.name.clone(), app)
    }

    pub fn get(&self, name: &str) -> Option<&AppSetup> {
        self.apps.get(name)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Apps in name order.
    pub fn iter(&self) -> impl Iterator<Item = &AppSetup> {
        self.apps.values()
    }

    /// Direct dependencies of `name`.
    pub fn required(&self, name: &str) -> Result<Vec<&AppSetup>> {
        let app = self.lookup(name, &[])?;
        app.uses
            .iter()
            .map(|dep| self.lookup(dep, std::slice::from_ref(&app.name)))
            .collect()
    }

    /// `name` followed by its transitive dependencies, depth first in declaration order.
    ///
    /// Every app appears once, at its first position. Cycles are cut where they close.
    pub fn resolve(&self, name: &str) -> Result<Vec<&AppSetup>> {
        self.resolve_all([name])
    }

    /// Resolves several apps at once; an app shared by two of them is listed once.
    pub fn resolve_all<I, S>(&self, names: I) -> Result<Vec<&AppSetup>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();
        let mut chain = Vec::new();

        for name in names {
            self.visit(name.as_ref(), &mut chain, &mut seen, &mut resolved)?;
        }

        Ok(resolved)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        chain: &mut Vec<String>,
        seen: &mut HashSet<&'a str>,
        resolved: &mut Vec<&'a AppSetup>,
    ) -> Result<()> {
        let app = self.lookup(name, chain)?;
        if !seen.insert(app.name.as_str()) {
            return Ok(());
        }

        resolved.push(app);
        chain.push(app.name.clone());
        for dep in &app.uses {
            self.visit(dep, chain, seen, resolved)?;
        }
        chain.pop();

        Ok(())
    }

    fn lookup(&self, name: &str, chain: &[String]) -> Result<&AppSetup> {
        self.get(name).ok_or_else(|| {
            ConfigError::UnknownApp {
                name: name.to_string(),
                chain: chain.to_vec(),
            }
        })
    }
}

impl FromIterator<AppSetup> for AppCatalog {
    fn from_iter<T: IntoIterator<Item = AppSetup>>(iter: T) -> Self {
        let mut catalog = AppCatalog::new();
        for app in iter {
            catalog.add(app);
        }
        catalog
    }
}
