// In: src/codec/mod.rs

//! Round-trip orchestration: the façade external callers use.
//!
//! `ClusterCodec` coordinates the schema layout, the stream planner and the
//! entropy kernels. Encoding gathers each column group into one logical symbol
//! array, picks the cheapest storage mode for it, and assembles the sections
//! into a [`Container`]. Decoding walks the container's sections in canonical
//! order and scatters the reconstructed symbols into a freshly allocated flat
//! region, byte-identical to the one that was encoded.
//!
//! A codec instance holds nothing but its configuration; independent records
//! may be processed concurrently on separate instances with no locking.

use crate::config::{AnsVersion, CodecConfig};
use crate::container::{Container, StreamMode, StreamSection};
use crate::error::CctfError;
use crate::kernels::{bitpack, rans};
use crate::schema::layout::FlatRegion;
use crate::schema::{stream_groups, Counters, StreamGroup};

pub struct ClusterCodec {
    config: CodecConfig,
}

impl ClusterCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    //------------------------------------------------------------------------------
    // Encode
    //------------------------------------------------------------------------------

    /// Entropy-encodes a populated flat region into a container. The region may
    /// be discarded afterwards; the container owns every byte it needs.
    pub fn encode(&self, region: &FlatRegion) -> Result<Container, CctfError> {
        let counters = *region.counters();
        let groups = stream_groups(self.config.combine_columns);

        let mut sections = Vec::with_capacity(groups.len());
        for group in &groups {
            let symbols = gather(region, group)?;
            let (mode, payload) = plan_stream(group, &symbols, self.config.version)?;
            sections.push(StreamSection {
                column: group.leader(),
                mode,
                num_values: symbols.len() as u64,
                payload,
            });
        }

        Ok(Container {
            version: self.config.version,
            combined_columns: self.config.combine_columns,
            counters,
            sections,
        })
    }

    /// Byte-level convenience over [`encode`](Self::encode).
    pub fn compress(&self, region: &FlatRegion) -> Result<Vec<u8>, CctfError> {
        self.encode(region)?.to_bytes()
    }

    //------------------------------------------------------------------------------
    // Decode
    //------------------------------------------------------------------------------

    /// Reconstructs the counters and a byte-identical flat region from a
    /// container. Both the wire version and the column-combination flag are
    /// taken from the container itself; this instance's configuration only
    /// affects encoding.
    pub fn decode(&self, container: &Container) -> Result<(Counters, FlatRegion), CctfError> {
        let counters = container.counters;
        let mut region = FlatRegion::new(&counters)?;
        let groups = stream_groups(container.combined_columns);

        if container.sections.len() != groups.len() {
            return Err(CctfError::CorruptStream(format!(
                "expected {} stream sections, found {}",
                groups.len(),
                container.sections.len()
            )));
        }

        for (group, section) in groups.iter().zip(&container.sections) {
            if section.column != group.leader() {
                return Err(CctfError::CorruptStream(format!(
                    "unexpected stream {} where {} belongs",
                    section.column.name(),
                    group.leader().name()
                )));
            }
            let expected = group.total_elements(&counters);
            if section.num_values != expected {
                return Err(CctfError::CounterMismatch(format!(
                    "stream {} declares {} elements, counters imply {}",
                    section.column.name(),
                    section.num_values,
                    expected
                )));
            }
            let symbols = decode_section(section, expected as usize, container.version)?;
            scatter(&mut region, group, &symbols)?;
        }

        Ok((counters, region))
    }

    /// Byte-level convenience over [`decode`](Self::decode).
    pub fn decompress(&self, bytes: &[u8]) -> Result<(Counters, FlatRegion), CctfError> {
        self.decode(&Container::from_bytes(bytes)?)
    }
}

//==================================================================================
// Gather / scatter between flat region and logical symbol streams
//==================================================================================

/// Concatenates a group's columns into one logical `u32` symbol array, in group
/// member order.
fn gather(region: &FlatRegion, group: &StreamGroup) -> Result<Vec<u32>, CctfError> {
    let counters = region.counters();
    let mut symbols = Vec::with_capacity(group.total_elements(counters) as usize);
    for &col in &group.columns {
        let len = region.counters().count_for(col.family()) as usize;
        for i in 0..len {
            symbols.push(region.read_element(col, i)?);
        }
    }
    Ok(symbols)
}

/// Splits a decoded symbol array back into the group's columns. The per-column
/// lengths are already known from the counters, so the split is unambiguous.
fn scatter(region: &mut FlatRegion, group: &StreamGroup, symbols: &[u32]) -> Result<(), CctfError> {
    let mut k = 0usize;
    for &col in &group.columns {
        let len = region.counters().count_for(col.family()) as usize;
        let width = col.width();
        for i in 0..len {
            let v = symbols[k];
            if width < 4 && v >= 1u32 << (width * 8) {
                return Err(CctfError::CorruptStream(format!(
                    "decoded symbol {v} exceeds the {width}-byte elements of column {}",
                    col.name()
                )));
            }
            region.write_element(col, i, v)?;
            k += 1;
        }
    }
    debug_assert_eq!(k, symbols.len());
    Ok(())
}

//==================================================================================
// Stream planning
//==================================================================================

/// Picks the storage mode for one stream and produces its payload.
///
/// Both an entropy-coded and a bit-packed candidate are considered and the
/// smaller one wins; streams whose alphabet exceeds the frequency-table
/// capacity can only be packed. The choice depends only on the stream's own
/// histogram, so re-encoding identical data always yields identical output.
fn plan_stream(
    group: &StreamGroup,
    symbols: &[u32],
    version: AnsVersion,
) -> Result<(StreamMode, Vec<u8>), CctfError> {
    if symbols.is_empty() {
        return Ok((StreamMode::Raw, Vec::new()));
    }

    let counts = rans::count_symbols(symbols);
    // BTreeMap keys are sorted; the last one is the alphabet maximum.
    let max = *counts.keys().next_back().unwrap_or(&0);
    let bit_width = bitpack::bits_for(max);
    let packed_payload_len = 1 + (symbols.len() * bit_width as usize).div_ceil(8);

    if counts.len() <= rans::MAX_TABLE_SYMBOLS {
        let entropy = rans::encode_stream(symbols, version)?;
        if entropy.len() <= packed_payload_len {
            log::debug!(
                "stream {}: {} values, {} symbols -> entropy ({} bytes)",
                group.leader().name(),
                symbols.len(),
                counts.len(),
                entropy.len()
            );
            return Ok((StreamMode::Entropy, entropy));
        }
    }

    let mut payload = Vec::with_capacity(packed_payload_len);
    payload.push(bit_width);
    payload.extend(bitpack::encode(symbols, bit_width)?);
    log::debug!(
        "stream {}: {} values, {} symbols -> packed at {} bits ({} bytes)",
        group.leader().name(),
        symbols.len(),
        counts.len(),
        bit_width,
        payload.len()
    );
    Ok((StreamMode::Packed, payload))
}

/// Decodes one section's payload back into its symbol array.
fn decode_section(
    section: &StreamSection,
    num_values: usize,
    version: AnsVersion,
) -> Result<Vec<u32>, CctfError> {
    match section.mode {
        StreamMode::Entropy => rans::decode_stream(&section.payload, num_values, version),
        StreamMode::Packed => {
            let (&bit_width, packed) = section.payload.split_first().ok_or_else(|| {
                CctfError::CorruptStream("packed stream is missing its bit width".to_string())
            })?;
            let expected_len = (num_values * bit_width as usize).div_ceil(8);
            if packed.len() != expected_len {
                return Err(CctfError::CorruptStream(format!(
                    "packed stream {} holds {} payload bytes, expected {}",
                    section.column.name(),
                    packed.len(),
                    expected_len
                )));
            }
            bitpack::decode(packed, bit_width, num_values)
        }
        StreamMode::Raw => {
            if section.payload.len() != num_values * 4 {
                return Err(CctfError::CorruptStream(format!(
                    "raw stream {} holds {} bytes for {} values",
                    section.column.name(),
                    section.payload.len(),
                    num_values
                )));
            }
            Ok(section
                .payload
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect())
        }
    }
}

//==================================================================================
// Unit Tests
//==================================================================================
