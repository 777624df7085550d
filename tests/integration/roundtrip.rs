use crate::*;

use listslice_core::wire::PRESENT;
use listslice_transfer::{
    ParcelableCodec, ParceledListSlice, SerdeCodec, StringCodec, StringParceledListSlice,
};

/// 100 small records under a generous ceiling travel in one message.
#[test]
fn test_hundred_pairs_inline() -> anyhow::Result<()> {
    init_tracing();
    let config = SliceConfig::default();
    let transport = CountingTransport::new(config.max_ipc_size);
    let slice = ParceledListSlice::parcelables(pairs(100));

    let mut parcel = Parcel::new();
    let registration = slice.write_to_parcel(&mut parcel, &transport, &config)?;
    assert!(registration.is_none(), "no remainder expected");
    let bytes = parcel.freeze();

    let mut reader = ParcelReader::new(bytes.clone());
    assert_eq!(reader.read_i32()?, 100);
    assert_eq!(reader.read_type_tag()?, pair_tag());
    for i in 0..100 {
        assert_eq!(reader.read_i32()?, PRESENT);
        let record = Record::create_from_parcel(&pair_tag(), &mut reader)?;
        assert_eq!(record, Record::Pair { a: i, b: -i });
    }
    assert!(!reader.has_remaining(), "nothing follows a complete inline run");

    let mut reader = ParcelReader::new(bytes);
    let decoded = ListSlice::read_from_parcel(
        &mut reader,
        ParcelableCodec::<Record>::new(),
        &transport,
        &config,
    )?;
    assert_eq!(decoded.list(), pairs(100).as_slice());
    assert_eq!(transport.calls(), 0);
    Ok(())
}

#[test]
fn test_empty_and_single_element() -> anyhow::Result<()> {
    init_tracing();
    let config = SliceConfig::default();
    let transport = LocalTransport::from_config(&config);

    let empty = transfer(
        &ParceledListSlice::<Record>::parcelables(Vec::new()),
        ParcelableCodec::new(),
        &transport,
        &config,
    )?;
    assert!(empty.is_empty());

    let single = transfer(
        &ParceledListSlice::parcelables(quints(1)),
        ParcelableCodec::<Record>::new(),
        &transport,
        &config,
    )?;
    assert_eq!(single.list(), quints(1).as_slice());
    Ok(())
}

#[test]
fn test_round_trip_around_inline_limit() -> anyhow::Result<()> {
    init_tracing();
    let config = SliceConfig::default();
    let transport = LocalTransport::from_config(&config);

    for n in [0, 1, 7, 8, 9, 40] {
        let slice = ParceledListSlice::parcelables(pairs(n)).with_inline_count_limit(8);
        let decoded = transfer(&slice, ParcelableCodec::<Record>::new(), &transport, &config)?;
        assert_eq!(decoded.list(), pairs(n).as_slice(), "n = {n}");
    }
    assert_eq!(transport.live_handles(), 0, "every registration was dropped");
    Ok(())
}

#[test]
fn test_decoding_twice_yields_equal_lists() -> anyhow::Result<()> {
    init_tracing();
    let config = SliceConfig {
        max_ipc_size: 512,
        ..SliceConfig::default()
    };
    let transport = LocalTransport::from_config(&config);
    let slice = ParceledListSlice::parcelables(quints(60));

    let mut parcel = Parcel::new();
    let _registration = slice.write_to_parcel(&mut parcel, &transport, &config)?;
    let bytes = parcel.freeze();

    let first = ListSlice::read_from_parcel(
        &mut ParcelReader::new(bytes.clone()),
        ParcelableCodec::<Record>::new(),
        &transport,
        &config,
    )?;
    let second = ListSlice::read_from_parcel(
        &mut ParcelReader::new(bytes),
        ParcelableCodec::<Record>::new(),
        &transport,
        &config,
    )?;
    assert_eq!(first.list(), second.list());
    assert_eq!(first.list(), slice.list());
    Ok(())
}

#[test]
fn test_string_slice_round_trip() -> anyhow::Result<()> {
    init_tracing();
    let config = SliceConfig {
        max_ipc_size: 256,
        ..SliceConfig::default()
    };
    let transport = LocalTransport::from_config(&config);
    let names: Vec<String> = (0..120).map(|i| format!("com.example.lib{i}")).collect();

    let decoded = transfer(
        &StringParceledListSlice::strings(names.clone()),
        StringCodec,
        &transport,
        &config,
    )?;
    assert_eq!(decoded.into_list(), names);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Library {
    name: String,
    version: u32,
}

fn library_tag(_: &Library) -> TypeTag {
    type_tag(b"test.library")
}

#[test]
fn test_serde_slice_round_trip() -> anyhow::Result<()> {
    init_tracing();
    let config = SliceConfig {
        max_ipc_size: 300,
        ..SliceConfig::default()
    };
    let transport = CountingTransport::new(config.max_ipc_size);
    let libraries: Vec<Library> = (0..40)
        .map(|i| Library {
            name: format!("lib{i}"),
            version: i,
        })
        .collect();

    let slice = ListSlice::new(libraries.clone(), SerdeCodec::new(library_tag));
    let decoded = transfer(&slice, SerdeCodec::new(library_tag), &transport, &config)?;
    assert_eq!(decoded.list(), libraries.as_slice());
    assert!(transport.calls() > 0, "40 JSON records cannot fit in 300 bytes");
    Ok(())
}
