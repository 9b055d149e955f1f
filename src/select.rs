//! Service selection.
//!
//! Resolves the set of service names to run from the declared set and the
//! include/exclude intent given on the command line. Pure logic, no side
//! effects; every error here is reported before anything is launched.

use std::collections::HashSet;

use anyhow::{bail, Result};

/// What the caller asked to run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Run only these services.
    pub only: Vec<String>,
    /// Run everything except these services.
    pub except: Vec<String>,
    /// Run each service's pre-startup steps before its startup commands.
    pub include_pre_steps: bool,
}

/// Resolves the selected service names against the declared set.
///
/// `only` and `except` are mutually exclusive. Unknown names in either
/// list are collected and reported together, not one at a time.
pub fn resolve(declared: &[String], request: &RunRequest) -> Result<HashSet<String>> {
    if !request.only.is_empty() && !request.except.is_empty() {
        bail!("--only and --except cannot both be specified");
    }
    if !request.only.is_empty() {
        ensure_known(declared, &request.only)?;
        return Ok(request.only.iter().cloned().collect());
    }
    if !request.except.is_empty() {
        ensure_known(declared, &request.except)?;
        return Ok(declared
            .iter()
            .filter(|name| !request.except.contains(name))
            .cloned()
            .collect());
    }
    Ok(declared.iter().cloned().collect())
}

fn ensure_known(declared: &[String], names: &[String]) -> Result<()> {
    let unknown: Vec<&str> = names
        .iter()
        .filter(|name| !declared.contains(name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!("unknown service names: {}", unknown.join(", "));
    }
    Ok(())
}
