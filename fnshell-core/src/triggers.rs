// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Enumeration of the triggers a running emulator can serve.

use crate::emulator::{EmulatorInstance, Trigger};

/// Derives the emulated trigger set from a running instance.
pub struct TriggerRegistry;

impl TriggerRegistry {
    /// Triggers the instance can serve, in declaration order. A trigger is
    /// included only when the instance lists its name as emulated; the
    /// returned triggers all carry `emulated == true`.
    pub fn list_emulated(instance: &dyn EmulatorInstance) -> Vec<Trigger> {
        let emulated = instance.emulated_functions();
        let triggers: Vec<Trigger> = instance
            .triggers()
            .into_iter()
            .map(|mut trigger| {
                trigger.emulated = trigger.emulated && emulated.contains(&trigger.name);
                trigger
            })
            .filter(|trigger| {
                if !trigger.emulated {
                    tracing::debug!(function = %trigger.name, "Skipping function that is not emulated");
                }
                trigger.emulated
            })
            .collect();

        tracing::debug!(count = triggers.len(), "Emulated functions");
        triggers
    }
}
