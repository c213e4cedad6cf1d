//! CLI command handlers.

mod check;
mod preview;

pub use check::run_check_command;
pub use preview::run_preview_command;

use std::path::Path;

use anyhow::{Context, Result};
use downloadview::{DownloadViewConfig, SmartDownloadMiddleware};

/// Loads `rules` and builds the middleware they describe.
fn load_middleware(rules: &Path) -> Result<(DownloadViewConfig, SmartDownloadMiddleware)> {
    let config = DownloadViewConfig::load(rules)
        .with_context(|| format!("failed to load rules from {}", rules.display()))?;
    let middleware = SmartDownloadMiddleware::from_config(&config)
        .with_context(|| format!("invalid rules in {}", rules.display()))?;
    Ok((config, middleware))
}
