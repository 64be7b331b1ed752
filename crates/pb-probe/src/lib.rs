//! pb-probe: run a ping probe and turn its output into a JSON envelope
//!
//! ```text
//! Target ──► ProbeRunner ──► raw stdout ──► parser ──► ProbeResult
//!                                                         │
//!                     ping_results.json ◄── store ◄── ResultEnvelope
//! ```

pub mod parser;
pub mod record;
pub mod runner;
pub mod store;

pub use parser::{parse_ping_output, OutputLayout, ParseError};
pub use record::{ProbeRecord, ProbeResponse, ProbeResult, ResponseKind, ResultEnvelope};
pub use runner::{PingCommand, ProbeOutput, ProbeRunner, Target};
pub use store::{read_envelope, write_envelope};

use pb_core::Result;
use std::path::Path;
use tracing::info;

/// Probe `target`, parse the output and persist the envelope at `path`.
///
/// Any existing file at `path` is replaced.
pub async fn probe_to_json(
    runner: &dyn ProbeRunner,
    target: &Target,
    path: &Path,
) -> Result<ResultEnvelope> {
    let output = runner.run(target).await?;
    let result = parse_ping_output(&output.stdout)?;
    let envelope = ResultEnvelope::from_result(&result);
    write_envelope(path, &envelope)?;

    info!(
        target = %target,
        records = envelope.info.len(),
        received = result.packets_received,
        path = %path.display(),
        "Probe results written"
    );
    Ok(envelope)
}

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        parse_ping_output, probe_to_json, PingCommand, ProbeRunner, ResultEnvelope, Target,
    };
}
