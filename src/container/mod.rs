// In: src/container/mod.rs

//! The self-describing byte container produced by encoding one record.
//!
//! This module is the single source of truth for container serialization,
//! deserialization, and efficient metadata peeking. A container is a linear
//! sequence of self-contained sections:
//!
//! `[magic][version tag][flags][serialized counters][section count]` followed by
//! one section per coded stream: `[stream id][storage mode][element count]
//! [payload length][payload]`. Every length is declared up front, so each
//! section decodes independently with no look-ahead.
//!
//! The container exclusively owns its coded bytes and is immutable once built;
//! it is the unit handed to and read back from external storage.

use serde::Serialize;
use std::io::Cursor;

use crate::config::AnsVersion;
use crate::error::CctfError;
use crate::schema::{ColumnId, Counters, HEADER_BYTES};

//==================================================================================
// Format Constants
//==================================================================================

/// The magic number identifying a cctf container.
pub const CONTAINER_MAGIC: &[u8; 4] = b"CCTF";

/// Header flag: statically-paired columns were concatenated into shared streams.
pub const FLAG_COMBINED_COLUMNS: u16 = 0x0001;

/// magic(4) + version(2) + flags(2) + counters(32) + section count(2).
const FIXED_HEADER_SIZE: usize = 4 + 2 + 2 + HEADER_BYTES + 2;

/// stream id(1) + mode(1) + element count(8) + payload length(4).
const SECTION_HEADER_SIZE: usize = 14;

//==================================================================================
// Public Structs
//==================================================================================

/// How one coded stream's payload is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// rANS entropy coded: `[frequency table][state][renorm bytes]`.
    Entropy = 0,
    /// Fixed-width bit packing: `[bit width: u8][packed bits]`.
    Packed = 1,
    /// Little-endian `u32` literals; also the canonical form of an empty stream.
    Raw = 2,
}

impl StreamMode {
    pub fn name(self) -> &'static str {
        match self {
            StreamMode::Entropy => "entropy",
            StreamMode::Packed => "packed",
            StreamMode::Raw => "raw",
        }
    }

    fn from_u8(byte: u8) -> Result<Self, CctfError> {
        match byte {
            0 => Ok(StreamMode::Entropy),
            1 => Ok(StreamMode::Packed),
            2 => Ok(StreamMode::Raw),
            other => Err(CctfError::CorruptStream(format!(
                "unknown stream storage mode {other}"
            ))),
        }
    }
}

/// One coded stream: a column group's payload plus the metadata needed to decode
/// it independently of every other section.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSection {
    /// The group-leader column; doubles as the on-wire stream identifier.
    pub column: ColumnId,
    pub mode: StreamMode,
    /// Total elements coded into this stream (all group members concatenated).
    pub num_values: u64,
    pub payload: Vec<u8>,
}

/// A fully parsed (or fully built) container.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub version: AnsVersion,
    pub combined_columns: bool,
    pub counters: Counters,
    /// Sections in canonical column order.
    pub sections: Vec<StreamSection>,
}

/// Metadata extracted from a serialized container without copying payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerInfo {
    pub version_tag: u16,
    pub combined_columns: bool,
    pub counters: Counters,
    pub streams: Vec<StreamInfo>,
    pub header_size: usize,
    pub data_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    pub name: &'static str,
    pub mode: &'static str,
    pub num_values: u64,
    pub payload_len: usize,
}

//==================================================================================
// Core Implementation
//==================================================================================

impl Container {
    /// Serializes the container into its canonical, final byte vector. Sections
    /// are written in the order they are held, which the codec guarantees to be
    /// canonical column order, so output is deterministic.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CctfError> {
        let data_size: usize = self.sections.iter().map(|s| s.payload.len()).sum();
        let total = FIXED_HEADER_SIZE + self.sections.len() * SECTION_HEADER_SIZE + data_size;
        let mut out = Vec::with_capacity(total);

        out.extend_from_slice(CONTAINER_MAGIC);
        out.extend_from_slice(&self.version.tag().to_le_bytes());
        let mut flags = 0u16;
        if self.combined_columns {
            flags |= FLAG_COMBINED_COLUMNS;
        }
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&self.counters.to_bytes());
        let section_count = u16::try_from(self.sections.len()).map_err(|_| {
            CctfError::Internal(format!(
                "{} sections exceed the u16 section count field",
                self.sections.len()
            ))
        })?;
        out.extend_from_slice(&section_count.to_le_bytes());

        for section in &self.sections {
            // The wire format caps a section payload at u32::MAX bytes; a
            // stream past that limit must fail here, never wrap silently.
            let payload_len = u32::try_from(section.payload.len()).map_err(|_| {
                CctfError::LayoutOverflow(format!(
                    "stream {} payload of {} bytes exceeds the u32 section limit",
                    section.column.name(),
                    section.payload.len()
                ))
            })?;
            out.push(section.column as u8);
            out.push(section.mode as u8);
            out.extend_from_slice(&section.num_values.to_le_bytes());
            out.extend_from_slice(&payload_len.to_le_bytes());
            out.extend_from_slice(&section.payload);
        }
        Ok(out)
    }

    /// Deserializes a byte slice into a full in-memory container.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CctfError> {
        let (info, payload_ranges) = parse_header(bytes)?;
        let version = AnsVersion::from_tag(info.version_tag)?;

        let mut sections = Vec::with_capacity(info.streams.len());
        for (stream, (id, mode, range)) in info.streams.iter().zip(payload_ranges) {
            sections.push(StreamSection {
                column: id,
                mode,
                num_values: stream.num_values,
                payload: bytes[range].to_vec(),
            });
        }

        Ok(Self {
            version,
            combined_columns: info.combined_columns,
            counters: info.counters,
            sections,
        })
    }

    /// Peeks into a serialized container's metadata without copying payloads.
    /// Unlike [`from_bytes`](Self::from_bytes) this does not reject unknown
    /// version tags, so it stays usable as a diagnostic on foreign containers.
    pub fn peek_info(bytes: &[u8]) -> Result<ContainerInfo, CctfError> {
        parse_header(bytes).map(|(info, _)| info)
    }

    /// Read-only diagnostic: logs a human-readable summary of counters and
    /// per-stream sizes. Not required for correctness.
    pub fn print(&self, prefix: &str) {
        let c = &self.counters;
        log::info!(
            "{prefix} container v{} combined={} | unattached {} attached {} reduced {} tracks {} sector-rows {}",
            self.version.tag(),
            self.combined_columns,
            c.n_unattached,
            c.n_attached,
            c.n_attached_reduced,
            c.n_tracks,
            c.n_sector_rows,
        );
        for s in &self.sections {
            log::info!(
                "{prefix}   {:<26} {:>8} values {:>8} bytes [{}]",
                s.column.name(),
                s.num_values,
                s.payload.len(),
                s.mode.name(),
            );
        }
        if let Ok(json) = serde_json::to_string(&self.info()) {
            log::debug!("{prefix} {json}");
        }
    }

    /// The same metadata [`peek_info`](Self::peek_info) extracts, computed from
    /// the in-memory form.
    pub fn info(&self) -> ContainerInfo {
        let data_size = self.sections.iter().map(|s| s.payload.len()).sum();
        ContainerInfo {
            version_tag: self.version.tag(),
            combined_columns: self.combined_columns,
            counters: self.counters,
            streams: self
                .sections
                .iter()
                .map(|s| StreamInfo {
                    name: s.column.name(),
                    mode: s.mode.name(),
                    num_values: s.num_values,
                    payload_len: s.payload.len(),
                })
                .collect(),
            header_size: FIXED_HEADER_SIZE + self.sections.len() * SECTION_HEADER_SIZE,
            data_size,
        }
    }
}

//==================================================================================
// Private Helpers
//==================================================================================

type SectionMeta = (ColumnId, StreamMode, std::ops::Range<usize>);

fn parse_header(bytes: &[u8]) -> Result<(ContainerInfo, Vec<SectionMeta>), CctfError> {
    if bytes.len() < FIXED_HEADER_SIZE {
        return Err(CctfError::CorruptStream(format!(
            "container too small to be valid: minimum {FIXED_HEADER_SIZE}, got {}",
            bytes.len()
        )));
    }

    let mut cursor = Cursor::new(bytes);
    let magic = take(&mut cursor, 4)?;
    if magic != CONTAINER_MAGIC {
        return Err(CctfError::CorruptStream("invalid container magic".to_string()));
    }
    let version_tag = take_u16(&mut cursor)?;
    let flags = take_u16(&mut cursor)?;
    if flags & !FLAG_COMBINED_COLUMNS != 0 {
        return Err(CctfError::CorruptStream(format!(
            "unknown container flags {flags:#06x}"
        )));
    }
    let counters = Counters::from_bytes(take(&mut cursor, HEADER_BYTES)?)?;
    let section_count = take_u16(&mut cursor)? as usize;

    let mut streams = Vec::with_capacity(section_count);
    let mut ranges = Vec::with_capacity(section_count);
    let mut data_size = 0usize;
    for _ in 0..section_count {
        let header = take(&mut cursor, SECTION_HEADER_SIZE)?;
        let column = ColumnId::from_u8(header[0])?;
        let mode = StreamMode::from_u8(header[1])?;
        let num_values = u64::from_le_bytes([
            header[2], header[3], header[4], header[5], header[6], header[7], header[8],
            header[9],
        ]);
        let payload_len =
            u32::from_le_bytes([header[10], header[11], header[12], header[13]]) as usize;

        let start = cursor.position() as usize;
        let end = start
            .checked_add(payload_len)
            .filter(|&e| e <= bytes.len())
            .ok_or_else(|| {
                CctfError::CorruptStream(format!(
                    "declared payload of stream {} exceeds container size",
                    column.name()
                ))
            })?;
        cursor.set_position(end as u64);

        data_size += payload_len;
        streams.push(StreamInfo {
            name: column.name(),
            mode: mode.name(),
            num_values,
            payload_len,
        });
        ranges.push((column, mode, start..end));
    }

    if cursor.position() as usize != bytes.len() {
        return Err(CctfError::CorruptStream(format!(
            "{} trailing bytes after last section",
            bytes.len() - cursor.position() as usize
        )));
    }

    Ok((
        ContainerInfo {
            version_tag,
            combined_columns: flags & FLAG_COMBINED_COLUMNS != 0,
            counters,
            streams,
            header_size: bytes.len() - data_size,
            data_size,
        },
        ranges,
    ))
}

fn take_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, CctfError> {
    let bytes = take(cursor, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn take<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8], CctfError> {
    let pos = cursor.position() as usize;
    let slice = cursor
        .get_ref()
        .get(pos..pos + len)
        .ok_or_else(|| CctfError::CorruptStream("truncated container header".to_string()))?;
    cursor.set_position((pos + len) as u64);
    Ok(slice)
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_container() -> Container {
        Container {
            version: AnsVersion::V1,
            combined_columns: true,
            counters: Counters {
                n_unattached: 12,
                n_attached: 34,
                n_attached_reduced: 5,
                n_tracks: 6,
                n_sector_rows: 7,
                compression_mode: 1,
                calibration: 0.25,
                max_time: 999,
            },
            sections: vec![
                StreamSection {
                    column: ColumnId::QTotA,
                    mode: StreamMode::Entropy,
                    num_values: 68,
                    payload: vec![1; 40],
                },
                StreamSection {
                    column: ColumnId::FlagsA,
                    mode: StreamMode::Packed,
                    num_values: 34,
                    payload: vec![2; 9],
                },
            ],
        }
    }

    #[test]
    fn test_container_roundtrip() {
        let original = test_container();
        let bytes = original.to_bytes().unwrap();
        let reconstructed = Container::from_bytes(&bytes).unwrap();
        assert_eq!(original, reconstructed);
    }

    #[test]
    fn test_to_bytes_is_deterministic() {
        let bytes1 = test_container().to_bytes().unwrap();
        let bytes2 = test_container().to_bytes().unwrap();
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn test_peek_info_matches_contents() {
        let container = test_container();
        let bytes = container.to_bytes().unwrap();
        let info = Container::peek_info(&bytes).unwrap();
        assert_eq!(info, container.info());
        assert_eq!(info.header_size + info.data_size, bytes.len());
        assert_eq!(info.streams[0].name, "qtot_a");
        assert_eq!(info.streams[1].mode, "packed");
    }

    #[test]
    fn test_unknown_version_tag_is_hard_failure() {
        let mut bytes = test_container().to_bytes().unwrap();
        bytes[4] = 0xFF;
        bytes[5] = 0xFF;
        let err = Container::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CctfError::UnsupportedVersion(0xFFFF)));
        // peek stays usable as a diagnostic.
        assert_eq!(Container::peek_info(&bytes).unwrap().version_tag, 0xFFFF);
    }

    #[test]
    fn test_parsing_errors_are_handled_gracefully() {
        assert!(matches!(
            Container::from_bytes(b"short"),
            Err(CctfError::CorruptStream(_))
        ));

        let mut bad_magic = test_container().to_bytes().unwrap();
        bad_magic[0] = b'X';
        assert!(matches!(
            Container::from_bytes(&bad_magic),
            Err(CctfError::CorruptStream(_))
        ));

        // Truncated mid-section.
        let bytes = test_container().to_bytes().unwrap();
        assert!(matches!(
            Container::from_bytes(&bytes[..bytes.len() - 4]),
            Err(CctfError::CorruptStream(_))
        ));

        // Trailing garbage after the last section.
        let mut padded = test_container().to_bytes().unwrap();
        padded.extend_from_slice(&[0; 3]);
        assert!(matches!(
            Container::from_bytes(&padded),
            Err(CctfError::CorruptStream(_))
        ));
    }

    #[test]
    fn test_section_count_overflow_is_rejected() {
        // The wire holds the section count in a u16; more sections must fail
        // serialization instead of wrapping.
        let mut container = test_container();
        container.sections = (0..=u16::MAX as usize + 1)
            .map(|_| StreamSection {
                column: ColumnId::QTotA,
                mode: StreamMode::Raw,
                num_values: 0,
                payload: Vec::new(),
            })
            .collect();
        let err = container.to_bytes().unwrap_err();
        assert!(matches!(err, CctfError::Internal(_)));
    }

    #[test]
    fn test_header_fields_parse_from_known_bytes() {
        let counters = test_container().counters;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(CONTAINER_MAGIC);
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&FLAG_COMBINED_COLUMNS.to_le_bytes());
        bytes.extend_from_slice(&counters.to_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());

        let info = Container::peek_info(&bytes).unwrap();
        assert_eq!(info.version_tag, 1);
        assert!(info.combined_columns);
        assert_eq!(info.counters, counters);
        assert!(info.streams.is_empty());
    }

    #[test]
    fn test_unknown_flags_are_rejected() {
        let mut bytes = test_container().to_bytes().unwrap();
        bytes[6] = 0x80;
        assert!(matches!(
            Container::from_bytes(&bytes),
            Err(CctfError::CorruptStream(_))
        ));
    }
}
