// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The shell namespace: an explicit map from dotted paths to entries.

use std::collections::BTreeMap;

use crate::binder::{BoundCallable, PATH_SEPARATOR};

/// Help text installed as the static `help` entry.
pub const HELP_TEXT: &str = "Instructions for the Functions Shell can be found at: \
https://firebase.google.com/docs/functions/local-emulator";

/// A value reachable from the shell.
#[derive(Debug, Clone)]
pub enum Entry {
    Callable(BoundCallable),
    Text(String),
}

/// Result of resolving a path.
#[derive(Debug)]
pub enum Lookup<'a> {
    Entry(&'a Entry),
    /// A prefix shared by nested entries; lists the next path segments.
    Group(Vec<String>),
    Missing,
}

/// Paths bound in the interactive session.
#[derive(Debug, Default)]
pub struct Namespace {
    entries: BTreeMap<String, Entry>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace with the static `help` entry already installed.
    pub fn with_help() -> Self {
        let mut namespace = Self::new();
        namespace.install_help();
        namespace
    }

    /// Set the `help` entry, replacing anything bound there.
    pub fn install_help(&mut self) {
        if let Some(Entry::Callable(callable)) = self.entries.get("help") {
            tracing::warn!(
                function = %callable.trigger_name(),
                "Function bound at 'help' is shadowed by the help text"
            );
        }
        self.set_text("help", HELP_TEXT);
    }

    /// Install a callable at its path. A later callable with the same path
    /// replaces the earlier one.
    pub fn install(&mut self, callable: BoundCallable) {
        let path = callable.path().to_string();
        if let Some(Entry::Callable(previous)) =
            self.entries.insert(path.clone(), Entry::Callable(callable))
        {
            tracing::warn!(
                path = %path,
                replaced = %previous.trigger_name(),
                "Namespace path bound twice, keeping the later function"
            );
        }
    }

    pub fn set_text(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(path.into(), Entry::Text(text.into()));
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Resolve `path` to an entry, a group of nested entries, or nothing.
    pub fn lookup(&self, path: &str) -> Lookup<'_> {
        if let Some(entry) = self.entries.get(path) {
            return Lookup::Entry(entry);
        }

        let prefix = format!("{}{}", path, PATH_SEPARATOR);
        let mut members: Vec<String> = Vec::new();
        for key in self.entries.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                let head = rest.split(PATH_SEPARATOR).next().unwrap_or(rest);
                if !members.iter().any(|member| member == head) {
                    members.push(head.to_string());
                }
            }
        }

        if members.is_empty() {
            Lookup::Missing
        } else {
            Lookup::Group(members)
        }
    }

    /// Installed callables, ordered by path.
    pub fn callables(&self) -> impl Iterator<Item = &BoundCallable> {
        self.entries.values().filter_map(|entry| match entry {
            Entry::Callable(callable) => Some(callable),
            Entry::Text(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
