//! Persisted chain state between runs.
//!
//! The file holds a single line: the name of the structure linked last. A
//! missing or blank file means the next run starts at the head of the chain.

use crate::catalog::error::CatalogError;
use crate::catalog::identity::{StructureName, is_identifier};
use crate::chain::LinkState;
use crate::write_atomic;
use anyhow::{Context, Result, bail};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub fn read_state(path: &Path) -> Result<LinkState> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(LinkState::head()),
        Err(err) => {
            return Err(err).with_context(|| format!("reading state file {}", path.display()));
        }
    };

    let mut lines = data.lines().map(str::trim).filter(|line| !line.is_empty());
    let Some(prev) = lines.next() else {
        return Ok(LinkState::head());
    };
    if lines.next().is_some() {
        bail!("state file {} holds more than one line", path.display());
    }
    // Existence cannot be checked: the structure was emitted by an earlier run.
    if !is_identifier(prev) {
        return Err(CatalogError::MalformedPredecessor {
            value: prev.to_string(),
        })
        .with_context(|| format!("reading state file {}", path.display()));
    }
    Ok(LinkState::after(StructureName(prev.to_string())))
}

pub fn write_state(path: &Path, state: &LinkState) -> Result<()> {
    let contents = match &state.prev {
        Some(prev) => format!("{prev}\n"),
        None => String::new(),
    };
    write_atomic(path, contents.as_bytes())
        .with_context(|| format!("writing state file {}", path.display()))
}
