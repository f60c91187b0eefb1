// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fnshell validate` command - Validate a function manifest.

use fnshell_core::{namespace_path, ConfigLoader, TriggerConfig};

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating manifest");

    match ConfigLoader::load_file(file) {
        Ok(manifest) => {
            println!("✓ Manifest is valid");
            println!();
            println!("Functions ({}):", manifest.functions.len());
            for func in &manifest.functions {
                let trigger = match &func.trigger {
                    TriggerConfig::Http => "http".to_string(),
                    TriggerConfig::Event { event_type, .. } => event_type.clone(),
                };
                let served = if func.emulated && func.trigger.is_emulatable() {
                    ""
                } else {
                    " [not emulated]"
                };
                println!(
                    "  - {} as {} ({}, region: {}, port: {}){}",
                    func.name,
                    namespace_path(func.name.as_str()),
                    trigger,
                    func.region,
                    func.handler_port,
                    served
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Manifest validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
