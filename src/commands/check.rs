//! Check command handler: validate a rules file.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use super::load_middleware;

pub fn run_check_command(rules: &Path) -> Result<()> {
    let (config, middleware) = load_middleware(rules)?;

    println!("backend = {}", config.backend);
    println!("rules = {}", config.rules.len());
    for (key, rule) in middleware.dispatcher().keys().into_iter().zip(&config.rules) {
        println!("{key} = {}", rule.describe());
    }
    info!(path = %rules.display(), "rules are valid");
    Ok(())
}
