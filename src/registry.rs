// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The fixed set of services that make up a Hermes checkout

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ErrorKind;
use crate::Error;

/// Family of start/stop mechanics a component uses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LauncherKind {
    /// MongoDB, managed through `brew services`
    Database,
    /// Rack applications started with `rackup`
    Rackup,
    /// Rails applications started with `rails server`
    Rails,
}

impl LauncherKind {
    /// Web applications track their server process through a PID file
    pub fn uses_pid_file(self) -> bool {
        match self {
            LauncherKind::Database => false,
            LauncherKind::Rackup | LauncherKind::Rails => true,
        }
    }
}

impl fmt::Display for LauncherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LauncherKind::Database => "database",
            LauncherKind::Rackup => "rackup",
            LauncherKind::Rails => "rails",
        };

        f.write_str(name)
    }
}

/// A named service rooted in its own working directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    name: String,
    working_dir: PathBuf,
    kind: LauncherKind,
}

impl Component {
    pub fn new(name: impl Into<String>, working_dir: impl Into<PathBuf>, kind: LauncherKind) -> Self {
        Self {
            name: name.into(),
            working_dir: working_dir.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn kind(&self) -> LauncherKind {
        self.kind
    }
}

/// Lookup table from component names, and their aliases, to components
///
/// Built once per invocation and never changed afterwards. The order components are registered
///   in is the order of the default set.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    components: Vec<Component>,
    aliases: HashMap<String, String>,
}

impl Registry {
    pub fn new(components: Vec<Component>) -> Self {
        Self {
            components,
            aliases: HashMap::new(),
        }
    }

    /// The Hermes services: the database first, then each web application
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let home = config.home();

        let registry = Self::new(vec![
            Component::new("mongodb", home, LauncherKind::Database),
            Component::new(
                "image_service",
                home.join("services").join("image_service"),
                LauncherKind::Rackup,
            ),
            Component::new("core", home.join("core"), LauncherKind::Rails),
            Component::new("frontend", home.join("frontend"), LauncherKind::Rails),
        ]);

        registry.with_alias("db", "mongodb")
    }

    /// Registers `alias` as a synonym for the already registered `target`
    pub fn with_alias(mut self, alias: impl Into<String>, target: &str) -> Result<Self, Error> {
        let target = self.resolve(target)?.name().to_string();
        self.aliases.insert(alias.into(), target);
        Ok(self)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Finds the component by name or alias
    pub fn resolve(&self, name: &str) -> Result<&Component, Error> {
        let canonical = self.aliases.get(name).map(String::as_str).unwrap_or(name);

        self.components
            .iter()
            .find(|component| component.name == canonical)
            .ok_or_else(|| ErrorKind::UnknownComponent(name.to_string()).into())
    }

    /// Every registered component, in registration order
    pub fn default_set(&self) -> Vec<&Component> {
        self.components.iter().collect()
    }

    /// Resolves `names` in order, or the default set when `names` is empty
    ///
    /// A single unknown name fails the whole expansion.
    pub fn expand<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Component>, Error> {
        if names.is_empty() {
            return Ok(self.default_set());
        }

        names.iter().map(|name| self.resolve(name.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::from_config(&Config::new("/opt/hermes")).expect("default registry")
    }

    #[test]
    fn test_resolve() {
        let registry = registry();

        let core = registry.resolve("core").expect("core is registered");
        assert_eq!(core.name(), "core");
        assert_eq!(core.working_dir(), Path::new("/opt/hermes/core"));
        assert_eq!(core.kind(), LauncherKind::Rails);

        let image = registry.resolve("image_service").expect("image_service");
        assert_eq!(
            image.working_dir(),
            Path::new("/opt/hermes/services/image_service")
        );
        assert_eq!(image.kind(), LauncherKind::Rackup);

        assert_eq!(registry.resolve("core").unwrap(), core);
    }

    #[test]
    fn test_resolve_unknown() {
        let err = registry().resolve("billing").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownComponent(name) if name == "billing"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_alias() {
        let registry = registry();

        assert!(registry.is_alias("db"));
        assert!(!registry.is_alias("mongodb"));

        let db = registry.resolve("db").expect("db alias");
        assert_eq!(db.name(), "mongodb");
        assert_eq!(db.kind(), LauncherKind::Database);
    }

    #[test]
    fn test_alias_to_unknown_target() {
        assert!(Registry::default().with_alias("db", "mongodb").is_err());
    }

    #[test]
    fn test_default_order() {
        let registry = registry();
        let names = |components: Vec<&Component>| {
            components
                .into_iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
        };

        let expected = vec!["mongodb", "image_service", "core", "frontend"];
        assert_eq!(names(registry.default_set()), expected);
        assert_eq!(names(registry.expand::<&str>(&[]).unwrap()), expected);
    }

    #[test]
    fn test_expand_keeps_requested_order() {
        let registry = registry();
        let expanded = registry.expand(&["frontend", "db"]).unwrap();

        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].name(), "frontend");
        assert_eq!(expanded[1].name(), "mongodb");
    }

    #[test]
    fn test_expand_fails_on_any_unknown() {
        assert!(registry().expand(&["core", "nope", "frontend"]).is_err());
    }
}
