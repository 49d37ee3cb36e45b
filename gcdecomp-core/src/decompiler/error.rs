//! Error Types
//!
//! Recoverable failures surfaced by the decompiler core. Most analysis
//! trouble is absorbed internally (unknown encodings decode as `Invalid`,
//! unmapped branch targets become silent exits, stack width conflicts union
//! their type sets); only conditions the caller must react to become errors.
//! Internal invariant violations - like overlapping bind regions - are
//! programming errors and fail fast instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecompilerError {
    /// The requested subroutine entrypoint is not in any mapped section.
    #[error("subroutine entrypoint {0:#010x} is not mapped")]
    UnmappedEntrypoint(u32),

    /// The entrypoint decodes to nothing executable.
    #[error("no decodable code at subroutine entrypoint {0:#010x}")]
    EmptySubroutine(u32),

    /// ABI configuration sidecar could not be parsed.
    #[error("malformed ABI configuration: {0}")]
    AbiConfig(#[from] serde_json::Error),
}
