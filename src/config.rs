// In: src/config.rs

//! The single source of truth for codec configuration.
//!
//! A `CodecConfig` is created once at the application boundary and handed to a
//! `ClusterCodec`. It is read-only for the lifetime of that codec instance: the
//! version and the column-combination switch select how a record is *encoded*,
//! while decoding always derives both from the container itself, never from the
//! instance configuration.

use serde::{Deserialize, Serialize};

use crate::error::CctfError;

//==================================================================================
// I. Wire-format version
//==================================================================================

/// The recognized coded-stream wire formats.
///
/// This is a closed set: both tags must remain decodable indefinitely so that
/// containers produced by older deployments stay readable. New formats are added
/// as new variants; unknown tags are a hard decode failure.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnsVersion {
    /// Legacy format: fixed-width frequency tables.
    Compat,
    /// Current format: LEB128 delta-coded frequency tables.
    #[default]
    V1,
}

impl AnsVersion {
    /// The on-wire tag stored in the container header.
    pub fn tag(self) -> u16 {
        match self {
            AnsVersion::Compat => 0,
            AnsVersion::V1 => 1,
        }
    }

    /// Explicit lookup from a container tag. This is the only place a tag is
    /// turned back into a version; decode dispatch goes through here.
    pub fn from_tag(tag: u16) -> Result<Self, CctfError> {
        match tag {
            0 => Ok(AnsVersion::Compat),
            1 => Ok(AnsVersion::V1),
            other => Err(CctfError::UnsupportedVersion(other)),
        }
    }
}

//==================================================================================
// II. The unified CodecConfig
//==================================================================================

/// Configuration for one codec instance. Immutable during an in-flight
/// encode/decode; separate instances share no state and need no locking.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CodecConfig {
    /// The coded-stream wire format used when *encoding*. Decoding ignores this
    /// and dispatches on the container's own tag.
    #[serde(default)]
    pub version: AnsVersion,

    /// When true, statically-paired columns of the same family are concatenated
    /// and coded as a single stream sharing one frequency table, trading
    /// per-stream overhead for a wider shared alphabet.
    #[serde(default)]
    pub combine_columns: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            version: AnsVersion::default(),
            combine_columns: false,
        }
    }
}
