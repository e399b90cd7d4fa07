// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! mbserial - Serial-over-Modbus register tunnel bridge.

use mbserial_bin::config::ConfigLoader;
use mbserial_bin::error::report_error_and_exit;
use mbserial_bin::{Cli, commands, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    // The logging section is read before the command loads the file in
    // earnest; a broken file is reported by the command itself.
    let file_logging = ConfigLoader::new()
        .load(&cli.config)
        .ok()
        .map(|config| config.logging);
    init_logging(&cli.effective_logging(file_logging.as_ref()));

    if let Err(e) = commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
