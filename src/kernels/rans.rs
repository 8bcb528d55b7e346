// In: src/kernels/rans.rs

//! The kernel for range Asymmetric Numeral Systems (rANS) entropy coding.
//!
//! This coder operates as a last-in, first-out state machine over a stream of
//! `u32` symbols: frequencies are normalized to a fixed probability scale, the
//! encoder walks the input in reverse emitting renormalization bytes, and the
//! decoder replays the stream forward. Unlike a byte-oriented coder, the symbol
//! table is sparse: column elements are up to 32 bits wide, so the table stores
//! (symbol, frequency) pairs rather than a dense 256-entry array.
//!
//! Two frequency-table wire formats coexist permanently. `Compat` writes
//! fixed-width pairs; `V1` delta-codes the (sorted) symbols and frequencies with
//! LEB128. A stream's payload is `[table][final state: u32 LE][renorm bytes]`,
//! and decoding validates that the payload is consumed exactly and the state
//! returns to its initial value.

use std::collections::BTreeMap;
use std::io::Cursor;

use crate::config::AnsVersion;
use crate::error::CctfError;
use crate::kernels::leb128;

// --- rANS Constants ---
pub const PROB_BITS: u32 = 12;
pub const PROB_SCALE: u32 = 1 << PROB_BITS; // 4096
const STATE_MIN: u32 = 1 << 16;

/// Upper bound on distinct symbols a table can hold: every symbol needs a
/// normalized frequency of at least 1.
pub const MAX_TABLE_SYMBOLS: usize = PROB_SCALE as usize;

//==================================================================================
// I. Symbol statistics
//==================================================================================

/// Counts symbol occurrences. A `BTreeMap` keeps the alphabet sorted, which the
/// sparse table and the `V1` delta coding both rely on.
pub fn count_symbols(values: &[u32]) -> BTreeMap<u32, u64> {
    let mut counts = BTreeMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0u64) += 1;
    }
    counts
}

/// One row of the normalized frequency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableEntry {
    sym: u32,
    freq: u32,
    cum: u32,
}

/// A normalized, sorted frequency table. Frequencies always sum to exactly
/// `PROB_SCALE`; a degenerate single-symbol table carries the full scale and
/// costs the encoder zero renormalization bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    entries: Vec<TableEntry>,
}

impl SymbolTable {
    /// Builds a normalized table from raw counts. The caller (the stream
    /// planner) must have verified the alphabet fits `MAX_TABLE_SYMBOLS`.
    pub fn from_counts(counts: &BTreeMap<u32, u64>) -> Result<Self, CctfError> {
        if counts.is_empty() {
            return Err(CctfError::Internal(
                "cannot build a frequency table for an empty stream".to_string(),
            ));
        }
        if counts.len() > MAX_TABLE_SYMBOLS {
            return Err(CctfError::Internal(format!(
                "alphabet of {} symbols exceeds table capacity {}",
                counts.len(),
                MAX_TABLE_SYMBOLS
            )));
        }

        let total: u64 = counts.values().sum();
        let mut syms: Vec<u32> = Vec::with_capacity(counts.len());
        let mut freqs: Vec<u32> = Vec::with_capacity(counts.len());
        for (&sym, &count) in counts {
            let freq = ((count * PROB_SCALE as u64) / total).max(1) as u32;
            syms.push(sym);
            freqs.push(freq);
        }

        // Fix up rounding drift so frequencies sum to exactly PROB_SCALE.
        // Always adjust the currently-largest frequency; ties resolve to the
        // first entry, keeping the result deterministic.
        let mut sum: u64 = freqs.iter().map(|&f| f as u64).sum();
        while sum > PROB_SCALE as u64 {
            let idx = largest_index(&freqs);
            debug_assert!(freqs[idx] > 1);
            freqs[idx] -= 1;
            sum -= 1;
        }
        while sum < PROB_SCALE as u64 {
            let idx = largest_index(&freqs);
            freqs[idx] += 1;
            sum += 1;
        }

        let mut entries = Vec::with_capacity(syms.len());
        let mut cum = 0u32;
        for (sym, freq) in syms.into_iter().zip(freqs) {
            entries.push(TableEntry { sym, freq, cum });
            cum += freq;
        }
        Ok(Self { entries })
    }

    pub fn num_symbols(&self) -> usize {
        self.entries.len()
    }

    fn lookup_sym(&self, sym: u32) -> Result<&TableEntry, CctfError> {
        self.entries
            .binary_search_by_key(&sym, |e| e.sym)
            .map(|i| &self.entries[i])
            .map_err(|_| CctfError::Internal(format!("symbol {sym} missing from frequency table")))
    }

    fn lookup_slot(&self, slot: u32) -> &TableEntry {
        // Frequencies cover [0, PROB_SCALE), so a match always exists.
        let idx = self.entries.partition_point(|e| e.cum <= slot) - 1;
        &self.entries[idx]
    }

    //------------------------------------------------------------------------------
    // Wire formats
    //------------------------------------------------------------------------------

    /// Serializes the table in the requested wire format, appending to `out`.
    pub fn write(&self, version: AnsVersion, out: &mut Vec<u8>) -> Result<(), CctfError> {
        match version {
            AnsVersion::Compat => {
                out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
                for e in &self.entries {
                    out.extend_from_slice(&e.sym.to_le_bytes());
                    out.extend_from_slice(&(e.freq as u16).to_le_bytes());
                }
            }
            AnsVersion::V1 => {
                leb128::encode_one(self.entries.len() as u32, out)?;
                let mut prev: Option<u32> = None;
                for e in &self.entries {
                    // Symbols are strictly increasing; store the first verbatim
                    // and every successor as gap-minus-one.
                    let delta = match prev {
                        None => e.sym,
                        Some(p) => e.sym - p - 1,
                    };
                    leb128::encode_one(delta, out)?;
                    leb128::encode_one(e.freq, out)?;
                    prev = Some(e.sym);
                }
            }
        }
        Ok(())
    }

    /// Parses a table in the given wire format, validating normalization.
    pub fn read(version: AnsVersion, cursor: &mut Cursor<&[u8]>) -> Result<Self, CctfError> {
        let num_symbols = match version {
            AnsVersion::Compat => read_u32(cursor)? as usize,
            AnsVersion::V1 => leb128::decode_one::<u32>(cursor)? as usize,
        };
        if num_symbols == 0 || num_symbols > MAX_TABLE_SYMBOLS {
            return Err(CctfError::CorruptStream(format!(
                "frequency table declares {num_symbols} symbols"
            )));
        }

        let mut entries = Vec::with_capacity(num_symbols);
        let mut cum = 0u32;
        let mut prev: Option<u32> = None;
        for _ in 0..num_symbols {
            let (sym, freq) = match version {
                AnsVersion::Compat => {
                    let sym = read_u32(cursor)?;
                    let freq = read_u16(cursor)? as u32;
                    (sym, freq)
                }
                AnsVersion::V1 => {
                    let delta = leb128::decode_one::<u32>(cursor)?;
                    let sym = match prev {
                        None => delta,
                        Some(p) => p
                            .checked_add(delta)
                            .and_then(|s| s.checked_add(1))
                            .ok_or_else(|| {
                                CctfError::CorruptStream("frequency table symbol overflow".to_string())
                            })?,
                    };
                    let freq = leb128::decode_one::<u32>(cursor)?;
                    (sym, freq)
                }
            };
            if let Some(p) = prev {
                if sym <= p {
                    return Err(CctfError::CorruptStream(
                        "frequency table symbols not strictly increasing".to_string(),
                    ));
                }
            }
            if freq == 0 {
                return Err(CctfError::CorruptStream(
                    "frequency table contains a zero frequency".to_string(),
                ));
            }
            if cum as u64 + freq as u64 > PROB_SCALE as u64 {
                return Err(CctfError::CorruptStream(
                    "cumulative frequency exceeds probability scale".to_string(),
                ));
            }
            entries.push(TableEntry { sym, freq, cum });
            cum += freq;
            prev = Some(sym);
        }
        if cum != PROB_SCALE {
            return Err(CctfError::CorruptStream(format!(
                "frequencies sum to {cum}, expected {PROB_SCALE}"
            )));
        }
        Ok(Self { entries })
    }
}

fn largest_index(freqs: &[u32]) -> usize {
    let mut best = 0;
    for (i, &f) in freqs.iter().enumerate() {
        if f > freqs[best] {
            best = i;
        }
    }
    best
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, CctfError> {
    let pos = cursor.position() as usize;
    let bytes = cursor
        .get_ref()
        .get(pos..pos + 4)
        .ok_or_else(|| CctfError::CorruptStream("truncated table: cannot read u32".to_string()))?;
    cursor.set_position((pos + 4) as u64);
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(buf))
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, CctfError> {
    let pos = cursor.position() as usize;
    let bytes = cursor
        .get_ref()
        .get(pos..pos + 2)
        .ok_or_else(|| CctfError::CorruptStream("truncated table: cannot read u16".to_string()))?;
    cursor.set_position((pos + 2) as u64);
    let mut buf = [0u8; 2];
    buf.copy_from_slice(bytes);
    Ok(u16::from_le_bytes(buf))
}

//==================================================================================
// II. Stream coding
//==================================================================================

/// Entropy-encodes a symbol stream into a self-contained payload:
/// `[table][final state][renorm bytes]`. The input must be non-empty and every
/// value must appear in the table.
pub fn encode_stream(values: &[u32], version: AnsVersion) -> Result<Vec<u8>, CctfError> {
    let counts = count_symbols(values);
    let table = SymbolTable::from_counts(&counts)?;

    let mut out = Vec::new();
    table.write(version, &mut out)?;

    let mut state = STATE_MIN;
    let mut renorm = Vec::with_capacity(values.len());
    for &v in values.iter().rev() {
        let e = table.lookup_sym(v)?;
        while state >= e.freq << PROB_BITS {
            renorm.push((state & 0xFF) as u8);
            state >>= 8;
        }
        state = (state / e.freq) * PROB_SCALE + (state % e.freq) + e.cum;
    }

    out.extend_from_slice(&state.to_le_bytes());
    out.extend(renorm.iter().rev());
    Ok(out)
}

/// Decodes a payload produced by [`encode_stream`] back into exactly
/// `num_values` symbols. Fails with `CorruptStream` if the payload is truncated,
/// carries trailing bytes, or does not settle back to the initial coder state.
pub fn decode_stream(
    payload: &[u8],
    num_values: usize,
    version: AnsVersion,
) -> Result<Vec<u32>, CctfError> {
    let mut cursor = Cursor::new(payload);
    let table = SymbolTable::read(version, &mut cursor)?;

    let mut state = read_u32(&mut cursor).map_err(|_| {
        CctfError::CorruptStream("truncated stream: cannot read initial state".to_string())
    })?;
    let data = &payload[cursor.position() as usize..];
    let mut data_pos = 0usize;

    let mut out = Vec::with_capacity(num_values);
    while out.len() < num_values {
        let slot = state & (PROB_SCALE - 1);
        let e = table.lookup_slot(slot);
        out.push(e.sym);

        state = e.freq * (state >> PROB_BITS) + slot - e.cum;
        while state < STATE_MIN {
            if data_pos >= data.len() {
                return Err(CctfError::CorruptStream(
                    "stream truncated during renormalization".to_string(),
                ));
            }
            state = (state << 8) | data[data_pos] as u32;
            data_pos += 1;
        }
    }

    // A well-formed stream returns the coder to its initial state and consumes
    // every byte; anything else is corruption.
    if state != STATE_MIN {
        return Err(CctfError::CorruptStream(format!(
            "final coder state {state:#x} does not match initial state"
        )));
    }
    if data_pos != data.len() {
        return Err(CctfError::CorruptStream(format!(
            "{} trailing bytes after coded payload",
            data.len() - data_pos
        )));
    }
    Ok(out)
}

//==================================================================================
// Unit Tests
//==================================================================================
