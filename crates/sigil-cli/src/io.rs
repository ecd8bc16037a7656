//! File and stdio plumbing.

use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
};

use sigil_core::{Block, ParseConfig, TransferableKey};
use tracing::debug;

use crate::error::{CliError, Result};

fn is_stdio(path: Option<&Path>) -> bool {
    path.is_none_or(|p| p.as_os_str() == "-")
}

/// Contents of `path`, or stdin when it is absent or `-`.
pub fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if !is_stdio(Some(path)) => std::fs::read(path)
            .map_err(|source| CliError::Io { path: path.display().to_string(), source }),
        _ => {
            let mut data = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut data)
                .map_err(|source| CliError::Io { path: "<stdin>".into(), source })?;
            Ok(data)
        },
    }
}

/// Write `data` to `path`, or stdout when it is absent or `-`.
pub fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) if !is_stdio(Some(path)) => {
            debug!(path = %path.display(), len = data.len(), "writing output");
            std::fs::write(path, data)
                .map_err(|source| CliError::Io { path: path.display().to_string(), source })
        },
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(data)
                .and_then(|()| stdout.flush())
                .map_err(|source| CliError::Io { path: "<stdout>".into(), source })
        },
    }
}

/// Write report lines to stderr.
pub fn report(lines: &[String]) -> Result<()> {
    let mut stderr = std::io::stderr().lock();
    for line in lines {
        writeln!(stderr, "{line}").map_err(|source| CliError::Io { path: "<stderr>".into(), source })?;
    }
    Ok(())
}

/// Every transferable key in the given armored or binary files.
pub fn read_keys(paths: &[PathBuf]) -> Result<Vec<TransferableKey>> {
    let config = ParseConfig { skip_invalid_keys: true, ..ParseConfig::default() };
    let mut keys = Vec::new();
    for path in paths {
        let data = read_input(Some(path))?;
        let found = sigil_core::parse_keys(&data, &config)?;
        if found.is_empty() {
            return Err(CliError::Usage(format!("{}: no keys found", path.display())));
        }
        debug!(path = %path.display(), count = found.len(), "keys loaded");
        keys.extend(found);
    }
    Ok(keys)
}

/// Blocks of armored or binary input.
pub fn parse_input(data: &[u8]) -> Result<Vec<Block>> {
    let blocks = match std::str::from_utf8(data) {
        Ok(text) if text.contains("-----BEGIN PGP ") => sigil_core::parse_ascii_multi(text)?,
        _ => sigil_core::parse_bytes_multi(data)?,
    };
    Ok(blocks)
}
