// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use mbserial_protocol::{Layout, PROTOCOL_VERSION};

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("mbserial - Serial-over-Modbus register tunnel bridge");
    println!();
    println!("Version Information:");
    println!("  mbserial-bin:      {}", crate::VERSION);
    println!("  mbserial-modbus:   {}", mbserial_modbus::VERSION);
    println!("  mbserial-protocol: {}", mbserial_protocol::VERSION);
    println!("  Tunnel protocol:   {}", PROTOCOL_VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2024");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Register Layouts:");
    for layout in Layout::ALL {
        let map = layout.register_map();
        println!(
            "  {:<13} status {}, receive {}, transmit {}",
            layout.name(),
            map.status,
            map.receive,
            map.transmit
        );
    }
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
