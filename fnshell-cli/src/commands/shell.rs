// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fnshell shell` command - Interactive functions shell.

use std::sync::Arc;

use fnshell_core::{ConfigError, ConfigLoader, LocatorHubClient, Manifest, Shell, ShellOptions};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use crate::emulator::GatewayEmulator;

pub async fn execute(
    options: ShellOptions,
    manifest_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = match ConfigLoader::load_file(manifest_path) {
        Ok(manifest) => manifest,
        Err(ConfigError::ManifestNotFound { path }) => {
            tracing::warn!(path = %path.display(), "Manifest not found, no functions to emulate");
            Manifest::default()
        }
        Err(e) => return Err(e.into()),
    };
    tracing::debug!(functions = manifest.functions.len(), "Loaded manifest");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            // Only the first interrupt matters; later ones land on a
            // cancelled token.
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("Interrupt received");
                shutdown.cancel();
            }
        });
    }

    let shell = Shell::new(
        LocatorHubClient::new(),
        Arc::new(GatewayEmulator::new(manifest)),
    );
    let mut stdout = tokio::io::stdout();
    let outcome = shell
        .run(
            &options,
            BufReader::new(tokio::io::stdin()),
            &mut stdout,
            shutdown,
        )
        .await?;

    tracing::debug!(?outcome, "Shell finished");
    // The blocking stdin reader would otherwise hold the runtime open.
    std::process::exit(outcome.exit_code());
}
