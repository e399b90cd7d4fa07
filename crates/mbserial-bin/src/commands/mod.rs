// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! One module per subcommand.

mod run;
mod status;
mod validate;
mod version;

pub use run::run;
pub use status::{StatusReport, status};
pub use validate::validate;
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Dispatches to the selected subcommand.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Status(args) => status::status(&cli, args).await,
        Commands::Version => version::version(&cli),
    }
}
