//! Result envelope persistence
//!
//! One JSON document per probe; writing replaces whatever was there.

use pb_core::Result;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::record::ResultEnvelope;

/// Write `envelope` to `path`, replacing any existing file.
pub fn write_envelope(path: &Path, envelope: &ResultEnvelope) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(envelope)?;
    fs::write(path, json)?;
    debug!(path = %path.display(), records = envelope.info.len(), "Envelope written");
    Ok(())
}

/// Read an envelope previously written with [`write_envelope`].
pub fn read_envelope(path: &Path) -> Result<ResultEnvelope> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
