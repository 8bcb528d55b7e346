// In: src/schema/layout.rs

//! Flat-region layout: one contiguous allocation holding the serialized counters
//! header followed by every column's storage, each column offset rounded up to
//! the natural alignment of its element width.
//!
//! The layout is a pure function of the counters: equal counters always yield an
//! identical size and identical per-column offsets, and no padding depends on the
//! data values. Inter-column padding bytes are canonically zero, which makes the
//! whole region deterministic given (counters, column values) and lets the codec
//! promise a byte-exact round trip over the entire allocation.

use bytemuck::Pod;

use crate::error::CctfError;
use crate::schema::{ColumnId, Counters, COLUMN_ORDER, HEADER_BYTES};

//==================================================================================
// I. Layout descriptor
//==================================================================================

/// Placement of one column inside the flat region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSlot {
    /// Byte offset from the start of the region. Always a multiple of `width`.
    pub offset: usize,
    /// Logical element count (the governing counter's value).
    pub len: usize,
    /// Element width in bytes.
    pub width: usize,
}

impl ColumnSlot {
    /// Byte length of the column's storage.
    pub fn byte_len(&self) -> usize {
        self.len * self.width
    }
}

/// The computed layout for one set of counters. This descriptor is the only
/// artifact that crosses the layout boundary; no raw offset arithmetic leaks out.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatLayout {
    counters: Counters,
    slots: [ColumnSlot; COLUMN_ORDER.len()],
    size: usize,
    alignment: usize,
}

fn align_up(offset: usize, align: usize) -> Result<usize, CctfError> {
    let rem = offset % align;
    if rem == 0 {
        return Ok(offset);
    }
    offset
        .checked_add(align - rem)
        .ok_or_else(|| CctfError::LayoutOverflow("alignment padding".into()))
}

impl FlatLayout {
    /// Computes the layout for the given counters. Pure and deterministic:
    /// calling this twice with equal counters returns equal results.
    pub fn for_counters(counters: &Counters) -> Result<Self, CctfError> {
        let mut slots = [ColumnSlot {
            offset: 0,
            len: 0,
            width: 0,
        }; COLUMN_ORDER.len()];

        let mut offset = HEADER_BYTES;
        let mut alignment = 4; // header fields are 4-aligned
        for (i, &col) in COLUMN_ORDER.iter().enumerate() {
            let width = col.width();
            let len = counters.count_for(col.family()) as usize;
            offset = align_up(offset, width)?;
            let bytes = len
                .checked_mul(width)
                .ok_or_else(|| CctfError::LayoutOverflow(format!("column {}", col.name())))?;
            slots[i] = ColumnSlot { offset, len, width };
            offset = offset
                .checked_add(bytes)
                .ok_or_else(|| CctfError::LayoutOverflow(format!("column {}", col.name())))?;
            alignment = alignment.max(width);
        }

        Ok(Self {
            counters: *counters,
            slots,
            size: offset,
            alignment,
        })
    }

    /// Exact byte size of the flat region. Nonzero even for all-zero counters:
    /// the header is always present.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Required alignment of the region's base address.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn slot(&self, col: ColumnId) -> &ColumnSlot {
        &self.slots[col as u8 as usize]
    }
}

//==================================================================================
// II. Flat region
//==================================================================================

/// An owned flat region. The backing store is a `Vec<u64>` so every column offset
/// (a multiple of its element width) lands on a correctly aligned address for
/// `bytemuck` casts, regardless of platform allocator behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRegion {
    layout: FlatLayout,
    buf: Vec<u64>,
}

impl FlatRegion {
    /// Allocates a zero-initialized region for the given counters and writes the
    /// serialized counters into the header.
    pub fn new(counters: &Counters) -> Result<Self, CctfError> {
        let layout = FlatLayout::for_counters(counters)?;
        let words = layout
            .size()
            .checked_add(7)
            .ok_or_else(|| CctfError::LayoutOverflow("backing store".into()))?
            / 8;
        let mut region = Self {
            layout,
            buf: vec![0u64; words],
        };
        let header = counters.to_bytes();
        region.as_bytes_mut()[..HEADER_BYTES].copy_from_slice(&header);
        Ok(region)
    }

    /// Materializes a region from a caller-supplied raw buffer: copies the bytes
    /// into aligned storage, rewrites the serialized counters into the header
    /// region, and canonically zeroes inter-column padding.
    pub fn from_bytes(counters: &Counters, bytes: &[u8]) -> Result<Self, CctfError> {
        let mut region = Self::new(counters)?;
        let size = region.layout.size();
        if bytes.len() < size {
            return Err(CctfError::BufferTooSmall {
                needed: size,
                got: bytes.len(),
            });
        }
        region.as_bytes_mut().copy_from_slice(&bytes[..size]);
        let header = counters.to_bytes();
        region.as_bytes_mut()[..HEADER_BYTES].copy_from_slice(&header);
        region.zero_padding();
        Ok(region)
    }

    fn zero_padding(&mut self) {
        let layout = self.layout.clone();
        let bytes = self.as_bytes_mut();
        let mut prev_end = HEADER_BYTES;
        for &col in COLUMN_ORDER.iter() {
            let slot = layout.slot(col);
            bytes[prev_end..slot.offset].fill(0);
            prev_end = slot.offset + slot.byte_len();
        }
        bytes[prev_end..].fill(0);
    }

    pub fn layout(&self) -> &FlatLayout {
        &self.layout
    }

    pub fn counters(&self) -> &Counters {
        self.layout.counters()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.buf)[..self.layout.size]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let size = self.layout.size;
        &mut bytemuck::cast_slice_mut(&mut self.buf)[..size]
    }

    /// Borrows a column as a typed slice. `T` must match the column's element
    /// width exactly.
    pub fn column_slice<T: Pod>(&self, col: ColumnId) -> Result<&[T], CctfError> {
        let slot = *self.layout.slot(col);
        if std::mem::size_of::<T>() != slot.width {
            return Err(CctfError::PodCast(format!(
                "column {} has {}-byte elements, requested {}",
                col.name(),
                slot.width,
                std::mem::size_of::<T>()
            )));
        }
        let bytes = &self.as_bytes()[slot.offset..slot.offset + slot.byte_len()];
        Ok(bytemuck::try_cast_slice(bytes)?)
    }

    /// Mutable variant of [`column_slice`](Self::column_slice).
    pub fn column_slice_mut<T: Pod>(&mut self, col: ColumnId) -> Result<&mut [T], CctfError> {
        let slot = *self.layout.slot(col);
        if std::mem::size_of::<T>() != slot.width {
            return Err(CctfError::PodCast(format!(
                "column {} has {}-byte elements, requested {}",
                col.name(),
                slot.width,
                std::mem::size_of::<T>()
            )));
        }
        let bytes = &mut self.as_bytes_mut()[slot.offset..slot.offset + slot.byte_len()];
        Ok(bytemuck::try_cast_slice_mut(bytes)?)
    }

    /// Reads one element, widened to `u32`. Bounds-checked; used by the codec's
    /// gather path, which must not care about the concrete element type.
    pub fn read_element(&self, col: ColumnId, index: usize) -> Result<u32, CctfError> {
        let slot = self.layout.slot(col);
        if index >= slot.len {
            return Err(CctfError::Internal(format!(
                "read past end of column {} ({index} >= {})",
                col.name(),
                slot.len
            )));
        }
        let start = slot.offset + index * slot.width;
        let bytes = &self.as_bytes()[start..start + slot.width];
        let mut buf = [0u8; 4];
        buf[..slot.width].copy_from_slice(bytes);
        Ok(u32::from_le_bytes(buf))
    }

    /// Writes one element from a `u32`. The caller must have verified that the
    /// value fits the column's element width.
    pub fn write_element(&mut self, col: ColumnId, index: usize, value: u32) -> Result<(), CctfError> {
        let slot = *self.layout.slot(col);
        if index >= slot.len {
            return Err(CctfError::Internal(format!(
                "write past end of column {} ({index} >= {})",
                col.name(),
                slot.len
            )));
        }
        debug_assert!(slot.width == 4 || value < (1u32 << (slot.width * 8)));
        let start = slot.offset + index * slot.width;
        let le = value.to_le_bytes();
        self.as_bytes_mut()[start..start + slot.width].copy_from_slice(&le[..slot.width]);
        Ok(())
    }
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_counters() -> Counters {
        Counters {
            n_unattached: 88,
            n_attached: 99,
            n_attached_reduced: 77,
            n_tracks: 66,
            n_sector_rows: 55,
            compression_mode: 1,
            calibration: 0.5,
            max_time: 1000,
        }
    }

    #[test]
    fn test_layout_is_deterministic() {
        let c = sample_counters();
        let a = FlatLayout::for_counters(&c).unwrap();
        let b = FlatLayout::for_counters(&c).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.size(), b.size());
        assert_eq!(a.alignment(), 4);
    }

    #[test]
    fn test_columns_never_overlap_and_are_aligned() {
        let layout = FlatLayout::for_counters(&sample_counters()).unwrap();
        let mut prev_end = HEADER_BYTES;
        for &col in COLUMN_ORDER.iter() {
            let slot = layout.slot(col);
            assert!(slot.offset >= prev_end, "column {} overlaps", col.name());
            assert_eq!(slot.offset % slot.width, 0);
            prev_end = slot.offset + slot.byte_len();
        }
        assert_eq!(prev_end, layout.size());
    }

    #[test]
    fn test_zero_counters_still_have_a_header() {
        let layout = FlatLayout::for_counters(&Counters::default()).unwrap();
        assert_eq!(layout.size(), HEADER_BYTES);
        for &col in COLUMN_ORDER.iter() {
            assert_eq!(layout.slot(col).len, 0);
        }
    }

    #[test]
    fn test_region_header_is_written() {
        let c = sample_counters();
        let region = FlatRegion::new(&c).unwrap();
        let parsed = Counters::from_bytes(region.as_bytes()).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn test_materialize_rejects_short_buffer() {
        let c = sample_counters();
        let layout = FlatLayout::for_counters(&c).unwrap();
        let short = vec![0u8; layout.size() - 1];
        let err = FlatRegion::from_bytes(&c, &short).unwrap_err();
        assert!(matches!(err, CctfError::BufferTooSmall { .. }));
    }

    #[test]
    fn test_materialize_zeroes_padding_and_rewrites_header() {
        let c = sample_counters();
        let layout = FlatLayout::for_counters(&c).unwrap();
        // Garbage everywhere, including padding and header.
        let raw = vec![0xABu8; layout.size()];
        let region = FlatRegion::from_bytes(&c, &raw).unwrap();
        assert_eq!(Counters::from_bytes(region.as_bytes()).unwrap(), c);
        // Column payloads survive.
        let qtot: &[u16] = region.column_slice(ColumnId::QTotA).unwrap();
        assert!(qtot.iter().all(|&v| v == 0xABAB));
        // Padding between flags_a (u8 x 99) and the next 1-aligned column is the
        // tail of the region; check the gap before pad_res_a (u16) instead.
        let gap_start = layout.slot(ColumnId::SectorLegDiffA).offset
            + layout.slot(ColumnId::SectorLegDiffA).byte_len();
        let gap_end = layout.slot(ColumnId::PadResA).offset;
        assert!(region.as_bytes()[gap_start..gap_end].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_typed_views_enforce_width() {
        let region = FlatRegion::new(&sample_counters()).unwrap();
        assert!(region.column_slice::<u16>(ColumnId::QTotA).is_ok());
        assert!(region.column_slice::<u32>(ColumnId::QTotA).is_err());
        assert!(region.column_slice::<u8>(ColumnId::FlagsA).is_ok());
        assert!(region.column_slice::<u32>(ColumnId::TimeDiffU).is_ok());
    }

    #[test]
    fn test_element_accessors_roundtrip() {
        let mut region = FlatRegion::new(&sample_counters()).unwrap();
        region.write_element(ColumnId::PadA, 3, 0xBEEF).unwrap();
        assert_eq!(region.read_element(ColumnId::PadA, 3).unwrap(), 0xBEEF);
        assert!(region.read_element(ColumnId::PadA, 66).is_err());
    }
}
