// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Raw, untyped view of a configuration file: an ordered map of sections, each an ordered map of
//! option names to values. Option names are kept exactly as written.

use std::path::Path;

use configparser::ini::Ini;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::error::{ConfigError, Result};

lazy_static! {
    /// NIC aliases are written `ib0-alias0` in the file because `:` is an INI delimiter.
    static ref ALIASED_NIC: Regex =
        Regex::new(r"(?P<nic>\w+)-alias(?P<alias>\d+)(?P<param>\w*)").unwrap();
}

/// Options of `host*` sections whose values may name aliased NICs.
const ALIASED_VALUE_KEYS: [&str; 4] = ["nic_list", "lnets", "ring0", "ring1"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConfig {
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl RawConfig {
    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut defaults = Ini::new_cs().defaults();
        defaults.multiline = true;
        let mut ini = Ini::new_from_defaults(defaults);
        let map = ini.read(text.to_string()).map_err(ConfigError::Syntax)?;

        let mut sections = IndexMap::new();
        for (section, options) in map.iter() {
            let options: IndexMap<String, String> = options
                .iter()
                .map(|(key, value)| (key.clone(), value.clone().unwrap_or_default()))
                .collect();
            sections.insert(section.clone(), options);
        }

        let mut raw = RawConfig { sections };
        raw.rewrite_nic_aliases();
        Ok(raw)
    }

    /// Read and parse the configuration file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!("loaded configuration from '{}'", path.display());
        Self::parse(&text)
    }

    /// Replace `ib0-alias0` style names with `ib0:0` in host related sections.
    fn rewrite_nic_aliases(&mut self) {
        for (name, options) in self.sections.iter_mut() {
            if !name.starts_with("host") {
                continue;
            }
            let rewritten: IndexMap<String, String> = options
                .drain(..)
                .map(|(key, value)| {
                    let value = if ALIASED_VALUE_KEYS.contains(&key.as_str()) {
                        ALIASED_NIC
                            .replace_all(&value, "${nic}:${alias}${param}")
                            .into_owned()
                    } else {
                        value
                    };
                    let key = ALIASED_NIC
                        .replace(&key, "${nic}:${alias}${param}")
                        .into_owned();
                    (key, value)
                })
                .collect();
            *options = rewritten;
        }
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn get(&self, section: &str, option: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|options| options.get(option))
            .map(String::as_str)
    }

    /// All options of `section` in file order.
    pub fn options<'a>(&'a self, section: &str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.sections
            .get(section)
            .into_iter()
            .flat_map(|options| options.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Section names in file order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

/// The primary configuration together with an optional shadow configuration whose options take
/// precedence, key by key.
#[derive(Debug, Clone, Copy)]
pub struct Sources<'a> {
    pub primary: &'a RawConfig,
    pub shadow: Option<&'a RawConfig>,
}

impl<'a> Sources<'a> {
    pub fn new(primary: &'a RawConfig, shadow: Option<&'a RawConfig>) -> Self {
        Sources { primary, shadow }
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.primary.has_section(section)
            || self.shadow.is_some_and(|shadow| shadow.has_section(section))
    }

    /// Look up a single option, preferring the shadow configuration.
    pub fn get(&self, section: &str, option: &str) -> Option<&'a str> {
        self.shadow
            .and_then(|shadow| shadow.get(section, option))
            .or_else(|| self.primary.get(section, option))
    }

    /// Options of `section`: primary options in file order, with shadow options replacing
    /// matching keys in place and new keys appended.
    pub fn options(&self, section: &str) -> IndexMap<String, String> {
        let mut options: IndexMap<String, String> = self
            .primary
            .options(section)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(shadow) = self.shadow {
            for (key, value) in shadow.options(section) {
                options.insert(key.to_string(), value.to_string());
            }
        }
        options
    }

    /// Names of `[host <name>]` sections of the primary configuration, in file order.
    pub fn host_section_names(&self) -> Vec<String> {
        self.primary
            .sections()
            .filter_map(|section| section.strip_prefix("host "))
            .map(|name| name.trim().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_rewritten() {
        let raw = RawConfig::parse(
            "[host oss1]\nnic_list = ib0 ib0-alias1\nib0-alias1_ip = 10.0.0.5\n\n[fs demo]\nx-alias1 = 1\n",
        )
        .unwrap();
        assert_eq!(raw.get("host oss1", "nic_list"), Some("ib0 ib0:1"));
        assert_eq!(raw.get("host oss1", "ib0:1_ip"), Some("10.0.0.5"));
        assert_eq!(raw.get("fs demo", "x-alias1"), Some("1"));
    }

    #[test]
    fn shadow_layers_on_primary() {
        let primary = RawConfig::parse("[global]\na = 1\nb = 2\n").unwrap();
        let shadow = RawConfig::parse("[global]\nb = 3\nc = 4\n").unwrap();
        let sources = Sources::new(&primary, Some(&shadow));
        assert_eq!(sources.get("global", "a"), Some("1"));
        assert_eq!(sources.get("global", "b"), Some("3"));
        let options: Vec<_> = sources.options("global").into_iter().collect();
        assert_eq!(
            options,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
                ("c".to_string(), "4".to_string()),
            ]
        );
    }
}
