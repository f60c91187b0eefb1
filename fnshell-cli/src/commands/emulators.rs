// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fnshell emulators` command - List emulators registered with the hub.

use fnshell_core::{HubDiscovery, LocatorHubClient, ProjectId};

pub async fn execute(project: &str) -> Result<(), Box<dyn std::error::Error>> {
    let project = ProjectId::new(project)?;
    let peers = HubDiscovery::new(LocatorHubClient::new())
        .locate(&project)
        .await;

    if peers.is_empty() {
        println!("No running emulators found for project {}.", project);
        return Ok(());
    }

    println!("╔═════════════════╦═══════════════════════════════╦════════════╗");
    println!("║ Emulator        ║ Host                          ║ Port       ║");
    println!("╠═════════════════╬═══════════════════════════════╬════════════╣");
    for endpoint in peers.values() {
        println!(
            "║ {:<15} ║ {:<29} ║ {:<10} ║",
            endpoint.kind.as_str(),
            endpoint.host,
            endpoint.port.value()
        );
    }
    println!("╚═════════════════╩═══════════════════════════════╩════════════╝");
    println!();
    println!("Total: {} emulator(s)", peers.len());

    Ok(())
}
