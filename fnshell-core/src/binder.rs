// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Turns triggers into callables the shell can expose.

use std::fmt;

use serde_json::Value;

use crate::emulator::{Invocation, RunningEmulator, Trigger};
use crate::error::InvocationError;

/// Character that separates function groups in trigger names.
pub const GROUP_SEPARATOR: char = '-';

/// Separator for nested namespace paths.
pub const PATH_SEPARATOR: char = '.';

/// Namespace path for a trigger name: each group separator becomes a nested
/// path separator, so `onCreate-a` is reachable as `onCreate.a`.
pub fn namespace_path(trigger_name: &str) -> String {
    trigger_name.replace(GROUP_SEPARATOR, &PATH_SEPARATOR.to_string())
}

/// A trigger bound to the emulator instance that serves it.
#[derive(Clone)]
pub struct BoundCallable {
    path: String,
    trigger: Trigger,
    instance: RunningEmulator,
}

impl BoundCallable {
    /// Name of the underlying trigger.
    pub fn trigger_name(&self) -> &str {
        &self.trigger.name
    }

    /// Namespace path the callable is installed under.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Call the trigger through the emulator's invocation channel.
    pub async fn invoke(&self, argument: Option<Value>) -> Result<Invocation, InvocationError> {
        tracing::debug!(
            function = %self.trigger.name,
            has_argument = argument.is_some(),
            "Invoking function"
        );
        self.instance.invoke(&self.trigger, argument).await
    }
}

impl fmt::Debug for BoundCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCallable")
            .field("path", &self.path)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Binds triggers to callables.
pub struct CallableBinder;

impl CallableBinder {
    pub fn bind(trigger: Trigger, instance: &RunningEmulator) -> BoundCallable {
        BoundCallable {
            path: namespace_path(&trigger.name),
            trigger,
            instance: RunningEmulator::clone(instance),
        }
    }
}
