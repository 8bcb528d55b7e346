// In: src/schema/mod.rs

//! The record schema: counters, the fixed column table, and stream grouping.
//!
//! A record is shaped entirely by its `Counters`: every column's logical length
//! equals one of the five counts. The column set, element widths and flat-layout
//! order are fixed at compile time; the codec treats the stored values as opaque
//! fixed-width unsigned integers.

pub mod layout;

use serde::{Deserialize, Serialize};

use crate::error::CctfError;

//==================================================================================
// I. Counters
//==================================================================================

/// Size of the serialized counters header at the start of every flat region and
/// every container.
pub const HEADER_BYTES: usize = 32;

/// The fixed set of integers describing the shape of one record, plus two scalar
/// physical metadata fields. Set once at record construction, immutable after.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Counters {
    pub n_unattached: u32,
    pub n_attached: u32,
    pub n_attached_reduced: u32,
    pub n_tracks: u32,
    pub n_sector_rows: u32,
    /// Tag describing which lossy reduction modes were applied upstream.
    pub compression_mode: u8,
    /// Calibration constant captured with the record (field strength).
    pub calibration: f32,
    /// Largest time-bin value present in the record.
    pub max_time: u32,
}

impl Counters {
    /// Serializes to the canonical 32-byte little-endian header. Three reserved
    /// zero bytes follow the mode tag so that all wider fields stay 4-aligned.
    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        out[0..4].copy_from_slice(&self.n_unattached.to_le_bytes());
        out[4..8].copy_from_slice(&self.n_attached.to_le_bytes());
        out[8..12].copy_from_slice(&self.n_attached_reduced.to_le_bytes());
        out[12..16].copy_from_slice(&self.n_tracks.to_le_bytes());
        out[16..20].copy_from_slice(&self.n_sector_rows.to_le_bytes());
        out[20] = self.compression_mode;
        out[24..28].copy_from_slice(&self.calibration.to_bits().to_le_bytes());
        out[28..32].copy_from_slice(&self.max_time.to_le_bytes());
        out
    }

    /// Parses the canonical header back. Reserved bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CctfError> {
        if bytes.len() < HEADER_BYTES {
            return Err(CctfError::BufferTooSmall {
                needed: HEADER_BYTES,
                got: bytes.len(),
            });
        }
        let le32 = |off: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[off..off + 4]);
            u32::from_le_bytes(buf)
        };
        Ok(Self {
            n_unattached: le32(0),
            n_attached: le32(4),
            n_attached_reduced: le32(8),
            n_tracks: le32(12),
            n_sector_rows: le32(16),
            compression_mode: bytes[20],
            calibration: f32::from_bits(le32(24)),
            max_time: le32(28),
        })
    }

    /// The logical length of every column in the given family.
    pub fn count_for(&self, family: ColumnFamily) -> u32 {
        match family {
            ColumnFamily::Unattached => self.n_unattached,
            ColumnFamily::Attached => self.n_attached,
            ColumnFamily::Reduced => self.n_attached_reduced,
            ColumnFamily::Track => self.n_tracks,
            ColumnFamily::SectorRow => self.n_sector_rows,
        }
    }
}

//==================================================================================
// II. Column table
//==================================================================================

/// Which counter governs a column's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFamily {
    Unattached,
    Attached,
    Reduced,
    Track,
    SectorRow,
}

/// Every column of the record, in flat-layout order. The `u8` discriminant is the
/// stream identifier stored in container sections, so the numbering is part of the
/// wire format and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ColumnId {
    QTotA = 0,
    QMaxA = 1,
    FlagsA = 2,
    RowDiffA = 3,
    SectorLegDiffA = 4,
    PadResA = 5,
    TimeResA = 6,
    SigmaPadA = 7,
    SigmaTimeA = 8,
    QPtA = 9,
    RowA = 10,
    SectorA = 11,
    TimeA = 12,
    PadA = 13,
    QTotU = 14,
    QMaxU = 15,
    FlagsU = 16,
    PadDiffU = 17,
    TimeDiffU = 18,
    SigmaPadU = 19,
    SigmaTimeU = 20,
    TrackClusterCounts = 21,
    SectorRowClusterCounts = 22,
}

/// All columns in flat-layout order.
pub const COLUMN_ORDER: [ColumnId; 23] = [
    ColumnId::QTotA,
    ColumnId::QMaxA,
    ColumnId::FlagsA,
    ColumnId::RowDiffA,
    ColumnId::SectorLegDiffA,
    ColumnId::PadResA,
    ColumnId::TimeResA,
    ColumnId::SigmaPadA,
    ColumnId::SigmaTimeA,
    ColumnId::QPtA,
    ColumnId::RowA,
    ColumnId::SectorA,
    ColumnId::TimeA,
    ColumnId::PadA,
    ColumnId::QTotU,
    ColumnId::QMaxU,
    ColumnId::FlagsU,
    ColumnId::PadDiffU,
    ColumnId::TimeDiffU,
    ColumnId::SigmaPadU,
    ColumnId::SigmaTimeU,
    ColumnId::TrackClusterCounts,
    ColumnId::SectorRowClusterCounts,
];

impl ColumnId {
    /// Element width in bytes (1, 2 or 4). Natural alignment equals the width.
    pub fn width(self) -> usize {
        use ColumnId::*;
        match self {
            FlagsA | RowDiffA | SectorLegDiffA | SigmaPadA | SigmaTimeA | QPtA | RowA
            | SectorA | FlagsU | SigmaPadU | SigmaTimeU => 1,
            QTotA | QMaxA | PadResA | PadA | QTotU | QMaxU | PadDiffU | TrackClusterCounts => 2,
            TimeResA | TimeA | TimeDiffU | SectorRowClusterCounts => 4,
        }
    }

    pub fn family(self) -> ColumnFamily {
        use ColumnId::*;
        match self {
            QTotA | QMaxA | FlagsA | SigmaPadA | SigmaTimeA => ColumnFamily::Attached,
            RowDiffA | SectorLegDiffA | PadResA | TimeResA => ColumnFamily::Reduced,
            QPtA | RowA | SectorA | TimeA | PadA | TrackClusterCounts => ColumnFamily::Track,
            QTotU | QMaxU | FlagsU | PadDiffU | TimeDiffU | SigmaPadU | SigmaTimeU => {
                ColumnFamily::Unattached
            }
            SectorRowClusterCounts => ColumnFamily::SectorRow,
        }
    }

    pub fn name(self) -> &'static str {
        use ColumnId::*;
        match self {
            QTotA => "qtot_a",
            QMaxA => "qmax_a",
            FlagsA => "flags_a",
            RowDiffA => "row_diff_a",
            SectorLegDiffA => "sector_leg_diff_a",
            PadResA => "pad_res_a",
            TimeResA => "time_res_a",
            SigmaPadA => "sigma_pad_a",
            SigmaTimeA => "sigma_time_a",
            QPtA => "qpt_a",
            RowA => "row_a",
            SectorA => "sector_a",
            TimeA => "time_a",
            PadA => "pad_a",
            QTotU => "qtot_u",
            QMaxU => "qmax_u",
            FlagsU => "flags_u",
            PadDiffU => "pad_diff_u",
            TimeDiffU => "time_diff_u",
            SigmaPadU => "sigma_pad_u",
            SigmaTimeU => "sigma_time_u",
            TrackClusterCounts => "track_cluster_counts",
            SectorRowClusterCounts => "sector_row_cluster_counts",
        }
    }

    /// Inverse of the `u8` discriminant, used when parsing container sections.
    pub fn from_u8(id: u8) -> Result<Self, CctfError> {
        COLUMN_ORDER
            .get(id as usize)
            .copied()
            .ok_or_else(|| CctfError::CorruptStream(format!("unknown stream id {id}")))
    }
}

//==================================================================================
// III. Stream grouping
//==================================================================================

/// The statically-known pairs of correlated columns that may share one coded
/// stream. Each pair lives in the same family, so both members always have the
/// same logical length.
pub const COMBINED_PAIRS: [[ColumnId; 2]; 5] = [
    [ColumnId::QTotA, ColumnId::QMaxA],
    [ColumnId::RowDiffA, ColumnId::SectorLegDiffA],
    [ColumnId::SigmaPadA, ColumnId::SigmaTimeA],
    [ColumnId::QTotU, ColumnId::QMaxU],
    [ColumnId::SigmaPadU, ColumnId::SigmaTimeU],
];

/// One coded stream's worth of columns. The first column is the group leader and
/// provides the stream identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGroup {
    pub columns: Vec<ColumnId>,
}

impl StreamGroup {
    pub fn leader(&self) -> ColumnId {
        self.columns[0]
    }

    /// Total number of elements the group contributes to its coded stream.
    pub fn total_elements(&self, counters: &Counters) -> u64 {
        self.columns
            .iter()
            .map(|c| counters.count_for(c.family()) as u64)
            .sum()
    }
}

/// Computes the grouping map for one (counters, combine_columns) pair. This is
/// the only place the combination policy lives; the entropy coder itself only
/// ever sees one logical symbol array per group.
pub fn stream_groups(combine_columns: bool) -> Vec<StreamGroup> {
    let mut groups = Vec::with_capacity(COLUMN_ORDER.len());
    for &col in COLUMN_ORDER.iter() {
        if combine_columns {
            if let Some(pair) = COMBINED_PAIRS.iter().find(|p| p.contains(&col)) {
                if pair[0] == col {
                    groups.push(StreamGroup {
                        columns: pair.to_vec(),
                    });
                }
                // trailing member of a pair: folded into its leader's group
                continue;
            }
        }
        groups.push(StreamGroup { columns: vec![col] });
    }
    groups
}

//==================================================================================
// Unit Tests
//==================================================================================
