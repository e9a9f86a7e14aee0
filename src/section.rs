// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The typed section parsing engine.
//!
//! Each section type declares a [`Schema`] naming its fields and their kinds. Loading a section
//! produces a [`Loaded`] record holding the typed values found in the configuration (shadow
//! configuration first, then primary) and an [`Unknown`] bag with every option the schema does
//! not claim. The section type then assigns its members from the record and consumes whatever
//! ad hoc keys it understands out of the bag.

use indexmap::IndexMap;
use log::{debug, warn};
use regex::Regex;

use crate::{
    error::{ConfigError, Result},
    nodeset,
    source::Sources,
};

/// The kind of a declared field, which decides how its raw text is coerced.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Str,
    Int,
    Bool,
    /// Whitespace separated list.
    SpaceList,
    /// Comma separated list.
    CommaList,
    /// List split in front of every match of the pattern, see [`nodeset::split_list_regex`].
    RegexList(Regex),
    /// Whitespace separated node specs, expanded into host names.
    NodeList,
}

#[derive(Debug, Clone)]
struct Field {
    name: &'static str,
    kind: FieldKind,
}

/// A typed value loaded from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

/// The declared fields of a section.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
    mandatory: Vec<&'static str>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, kind: FieldKind, names: &[&'static str]) -> Self {
        for name in names {
            self.fields.push(Field {
                name: *name,
                kind: kind.clone(),
            });
        }
        self
    }

    pub fn strings(self, names: &[&'static str]) -> Self {
        self.with(FieldKind::Str, names)
    }

    pub fn ints(self, names: &[&'static str]) -> Self {
        self.with(FieldKind::Int, names)
    }

    pub fn bools(self, names: &[&'static str]) -> Self {
        self.with(FieldKind::Bool, names)
    }

    pub fn space_lists(self, names: &[&'static str]) -> Self {
        self.with(FieldKind::SpaceList, names)
    }

    pub fn comma_lists(self, names: &[&'static str]) -> Self {
        self.with(FieldKind::CommaList, names)
    }

    pub fn regex_list(self, name: &'static str, delimiter: Regex) -> Self {
        self.with(FieldKind::RegexList(delimiter), &[name])
    }

    pub fn node_lists(self, names: &[&'static str]) -> Self {
        self.with(FieldKind::NodeList, names)
    }

    pub fn mandatory(mut self, names: &[&'static str]) -> Self {
        self.mandatory.extend_from_slice(names);
        self
    }

    pub fn claims(&self, option: &str) -> bool {
        self.fields.iter().any(|f| f.name == option)
    }

    /// Load `section` from `sources`.
    pub fn load(&self, sources: &Sources, section: &str) -> Result<Loaded> {
        let mut values = IndexMap::new();

        for field in self.fields.iter() {
            // The shadow value, if any, replaces the primary one.
            let Some(raw) = sources.get(section, field.name) else {
                continue;
            };
            let value = coerce(&field.kind, raw)
                .map_err(|reason| ConfigError::parse(section, field.name, raw, reason))?;
            values.insert(field.name, value);
        }

        let entries = sources
            .options(section)
            .into_iter()
            .filter(|(option, _)| !self.claims(option))
            .collect();

        Ok(Loaded {
            section: section.to_string(),
            values,
            mandatory: self.mandatory.clone(),
            unknown: Unknown {
                section: section.to_string(),
                entries,
                consumed: Vec::new(),
            },
        })
    }
}

fn coerce(kind: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
    Ok(match kind {
        FieldKind::Str => Value::Str(raw.to_string()),
        FieldKind::Int => Value::Int(raw.trim().parse::<i64>().map_err(|e| e.to_string())?),
        FieldKind::Bool => Value::Bool(parse_bool(raw)?),
        FieldKind::SpaceList => Value::List(
            raw.split_whitespace().map(String::from).collect(),
        ),
        FieldKind::CommaList => Value::List(nodeset::split_list(raw, ',')),
        FieldKind::RegexList(delimiter) => Value::List(nodeset::split_list_regex(raw, delimiter)),
        FieldKind::NodeList => {
            let specs: Vec<&str> = raw.split_whitespace().collect();
            Value::List(nodeset::parse_node_spec(&specs).map_err(|e| e.to_string())?)
        }
    })
}

fn parse_bool(raw: &str) -> std::result::Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

/// The typed values and unknown options of one loaded section.
#[derive(Debug, Clone)]
pub struct Loaded {
    section: String,
    values: IndexMap<&'static str, Value>,
    mandatory: Vec<&'static str>,
    pub unknown: Unknown,
}

impl Loaded {
    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn string(&self, field: &str) -> Option<String> {
        match self.values.get(field) {
            Some(Value::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn int(&self, field: &str) -> Option<i64> {
        match self.values.get(field) {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        match self.values.get(field) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn list(&self, field: &str) -> Option<Vec<String>> {
        match self.values.get(field) {
            Some(Value::List(l)) => Some(l.clone()),
            _ => None,
        }
    }

    /// An integer field that must not be negative.
    pub fn unsigned(&self, field: &str) -> Result<Option<u64>> {
        self.int(field)
            .map(|i| {
                u64::try_from(i).map_err(|_| {
                    ConfigError::parse(&self.section, field, &i.to_string(), "must not be negative")
                })
            })
            .transpose()
    }

    /// A count or index field.
    pub fn count(&self, field: &str) -> Result<Option<u32>> {
        self.int(field)
            .map(|i| {
                u32::try_from(i).map_err(|_| {
                    ConfigError::parse(&self.section, field, &i.to_string(), "not a valid count")
                })
            })
            .transpose()
    }

    /// Overwrite `target` when the field was set.
    pub fn set_string(&self, field: &str, target: &mut String) {
        if let Some(value) = self.string(field) {
            *target = value;
        }
    }

    pub fn set_opt_string(&self, field: &str, target: &mut Option<String>) {
        if let Some(value) = self.string(field) {
            *target = Some(value);
        }
    }

    pub fn set_bool(&self, field: &str, target: &mut bool) {
        if let Some(value) = self.bool(field) {
            *target = value;
        }
    }

    pub fn set_list(&self, field: &str, target: &mut Vec<String>) {
        if let Some(value) = self.list(field) {
            *target = value;
        }
    }

    pub fn set_unsigned(&self, field: &str, target: &mut u64) -> Result<()> {
        if let Some(value) = self.unsigned(field)? {
            *target = value;
        }
        Ok(())
    }

    pub fn set_opt_unsigned(&self, field: &str, target: &mut Option<u64>) -> Result<()> {
        if let Some(value) = self.unsigned(field)? {
            *target = Some(value);
        }
        Ok(())
    }

    /// Report mandatory fields that were not set. With `strict`, the first missing field is an
    /// error; otherwise every missing field is logged and resolution continues.
    pub fn check_mandatory(&self, strict: bool) -> Result<()> {
        for field in self.mandatory.iter() {
            if self.values.contains_key(field) {
                continue;
            }
            if strict {
                return Err(ConfigError::missing(&self.section, field));
            }
            warn!(
                "mandatory field '{field}' is missing from section [{}]",
                self.section
            );
        }
        Ok(())
    }
}

/// Options a section's schema does not claim. Section types consume the keys they understand;
/// every consumed key is remembered so that what is left over can be audited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unknown {
    section: String,
    entries: IndexMap<String, String>,
    consumed: Vec<String>,
}

impl Unknown {
    /// Remove `key` from the bag and return its value.
    pub fn consume(&mut self, key: &str) -> Option<String> {
        let value = self.entries.shift_remove(key)?;
        debug!("[{}] consumed '{key}'", self.section);
        self.consumed.push(key.to_string());
        Some(value)
    }

    /// Look at `key` without consuming it.
    pub fn peek(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Consume every remaining entry whose key matches `pred`, in order.
    pub fn consume_matching<F: Fn(&str) -> bool>(&mut self, pred: F) -> Vec<(String, String)> {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| pred(key))
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|key| self.consume(&key).map(|value| (key, value)))
            .collect()
    }

    /// Consume everything that is left.
    pub fn drain(&mut self) -> IndexMap<String, String> {
        let entries = std::mem::take(&mut self.entries);
        self.consumed.extend(entries.keys().cloned());
        entries
    }

    /// Keys consumed so far, in consumption order.
    pub fn consumed(&self) -> &[String] {
        &self.consumed
    }

    pub fn remaining(&self) -> &IndexMap<String, String> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
