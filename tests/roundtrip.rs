// In: tests/roundtrip.rs

//! End-to-end round-trip tests over the public façade: flat region in,
//! container bytes out, byte-identical flat region back.

use rand::{Rng, SeedableRng};

use cctf_core::{
    AnsVersion, CctfError, ClusterCodec, CodecConfig, Container, Counters, EntryStore, FlatRegion,
    MemoryEntryStore, COLUMN_ORDER,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn reference_counters() -> Counters {
    Counters {
        n_unattached: 88,
        n_attached: 99,
        n_attached_reduced: 77,
        n_tracks: 66,
        n_sector_rows: 55,
        compression_mode: 3,
        calibration: -5.0068,
        max_time: 445_312,
    }
}

/// Fills every column with its own element index. All reference counts are
/// below 256, so the values fit even the 1-byte columns.
fn indexed_region(counters: &Counters) -> FlatRegion {
    let mut region = FlatRegion::new(counters).unwrap();
    for &col in COLUMN_ORDER.iter() {
        let len = counters.count_for(col.family()) as usize;
        for i in 0..len {
            region.write_element(col, i, i as u32).unwrap();
        }
    }
    region
}

fn all_configs() -> Vec<CodecConfig> {
    let mut configs = Vec::new();
    for version in [AnsVersion::Compat, AnsVersion::V1] {
        for combine_columns in [false, true] {
            configs.push(CodecConfig {
                version,
                combine_columns,
            });
        }
    }
    configs
}

#[test]
fn test_reference_record_roundtrips_in_every_configuration() {
    init_logger();
    let counters = reference_counters();
    let region = indexed_region(&counters);

    for config in all_configs() {
        let codec = ClusterCodec::new(config);
        let bytes = codec.compress(&region).unwrap();
        let (restored_counters, restored) = codec.decompress(&bytes).unwrap();
        assert_eq!(restored_counters, counters, "config {config:?}");
        assert_eq!(
            restored.as_bytes(),
            region.as_bytes(),
            "region bytes differ for config {config:?}"
        );
    }
}

#[test]
fn test_decoder_follows_container_not_instance_config() {
    init_logger();
    let region = indexed_region(&reference_counters());

    let writer = ClusterCodec::new(CodecConfig {
        version: AnsVersion::Compat,
        combine_columns: true,
    });
    let bytes = writer.compress(&region).unwrap();

    // A reader configured for the other wire version and no combination must
    // still decode correctly: both choices travel inside the container.
    let reader = ClusterCodec::new(CodecConfig {
        version: AnsVersion::V1,
        combine_columns: false,
    });
    let (_, restored) = reader.decompress(&bytes).unwrap();
    assert_eq!(restored.as_bytes(), region.as_bytes());
}

#[test]
fn test_empty_record_roundtrips() {
    init_logger();
    let counters = Counters::default();
    let region = FlatRegion::new(&counters).unwrap();

    for config in all_configs() {
        let codec = ClusterCodec::new(config);
        let bytes = codec.compress(&region).unwrap();
        let (restored_counters, restored) = codec.decompress(&bytes).unwrap();
        assert_eq!(restored_counters, counters);
        assert_eq!(restored.as_bytes(), region.as_bytes());
    }
}

#[test]
fn test_randomized_records_roundtrip() {
    init_logger();
    // Fixed seed so any failure reproduces from the log alone.
    let mut rng = rand::rngs::StdRng::seed_from_u64(23);

    for _ in 0..5 {
        let counters = Counters {
            n_unattached: rng.random_range(0..500),
            n_attached: rng.random_range(0..500),
            n_attached_reduced: rng.random_range(0..500),
            n_tracks: rng.random_range(0..200),
            n_sector_rows: rng.random_range(0..100),
            compression_mode: rng.random_range(0..8),
            calibration: 0.25,
            max_time: rng.random_range(0..1_000_000),
        };
        let mut region = FlatRegion::new(&counters).unwrap();
        for &col in COLUMN_ORDER.iter() {
            let len = counters.count_for(col.family()) as usize;
            let bound: u64 = 1u64 << (col.width() * 8);
            for i in 0..len {
                let v = rng.random_range(0..bound) as u32;
                region.write_element(col, i, v).unwrap();
            }
        }

        for config in all_configs() {
            let codec = ClusterCodec::new(config);
            let bytes = codec.compress(&region).unwrap();
            let (_, restored) = codec.decompress(&bytes).unwrap();
            assert_eq!(restored.as_bytes(), region.as_bytes());
        }
    }
}

#[test]
fn test_unknown_version_tag_is_a_hard_failure() {
    init_logger();
    let region = indexed_region(&reference_counters());
    let codec = ClusterCodec::new(CodecConfig::default());
    let mut bytes = codec.compress(&region).unwrap();

    // The version tag sits right after the 4-byte magic.
    bytes[4] = 0x77;
    bytes[5] = 0x77;
    let err = codec.decompress(&bytes).unwrap_err();
    assert!(matches!(err, CctfError::UnsupportedVersion(0x7777)));

    // Diagnostics still work on a container the decoder refuses.
    assert!(Container::peek_info(&bytes).is_ok());
}

#[test]
fn test_counter_mismatch_is_detected() {
    init_logger();
    let codec = ClusterCodec::new(CodecConfig::default());
    let region = indexed_region(&reference_counters());
    let mut container = codec.encode(&region).unwrap();
    container.sections[3].num_values = 12_345;
    let err = codec.decode(&container).unwrap_err();
    assert!(matches!(err, CctfError::CounterMismatch(_)));
}

#[test]
fn test_container_bytes_survive_an_entry_store() {
    init_logger();
    let codec = ClusterCodec::new(CodecConfig::default());
    let region = indexed_region(&reference_counters());
    let bytes = codec.compress(&region).unwrap();

    let mut store = MemoryEntryStore::new();
    store.write_entry("run_0042/record_7", &bytes).unwrap();
    let fetched = store.read_entry("run_0042/record_7").unwrap();
    assert_eq!(fetched, bytes);

    let (_, restored) = codec.decompress(&fetched).unwrap();
    assert_eq!(restored.as_bytes(), region.as_bytes());

    assert!(matches!(
        store.read_entry("run_0042/record_8").unwrap_err(),
        CctfError::EntryNotFound(_)
    ));
}
