//! Record codec: round trips, compression modes, corrupt input.

use glutton::codec::record_codec::{Codec, CodecConfig, StoredForm, RECORD_FORMAT_VERSION};
use glutton::compression::compress::{CompressedBlock, CompressionType, MAX_DECOMPRESSED_SIZE};
use glutton::core::error::ErrorKind;
use glutton::core::types::{BiblioRecord, IstexRecord, PmidRecord};

const ALL_COMPRESSIONS: [CompressionType; 4] = [
    CompressionType::None,
    CompressionType::LZ4,
    CompressionType::Zstd,
    CompressionType::Snappy,
];

fn sample_istex() -> IstexRecord {
    IstexRecord {
        corpus_name: "bmj".to_string(),
        istex_id: "052DBC6D84C9F6A40D3CE1ED2E9E5E1B2D5E4F13".to_string(),
        doi: vec!["10.1136/sti.53.1.56".to_string()],
        ark: vec!["ark:/67375/NVC-8SNSRJ6Z-Z".to_string()],
        mesh: vec!["Gonorrhea".to_string(), "Humans".to_string()],
        ..IstexRecord::default()
    }
}

fn sample_biblio() -> BiblioRecord {
    BiblioRecord {
        doi: "10.1136/sti.53.1.56".to_string(),
        title: "Gonococcal infection of the rectum in men: a review".to_string(),
        first_author: "Ross".to_string(),
        journal: "Sexually Transmitted Infections".to_string(),
        issn: "1368-4973".to_string(),
        volume: "53".to_string(),
        issue: "1".to_string(),
        first_page: "56".to_string(),
        year: "1977".to_string(),
    }
}

#[test]
fn every_record_type_round_trips_in_every_compression_mode() {
    let pmid = PmidRecord::new("557360", "PMC1045357", "10.1136/sti.53.1.56");
    let istex = sample_istex();
    let biblio = sample_biblio();

    for compression in ALL_COMPRESSIONS {
        let codec = Codec::new(CodecConfig { compression });
        for form in [StoredForm::Plain, StoredForm::Compressed] {
            let bytes = codec.encode_as(&pmid, form).unwrap();
            assert_eq!(codec.decode_as::<PmidRecord>(&bytes, form).unwrap(), pmid);

            let bytes = codec.encode_as(&istex, form).unwrap();
            assert_eq!(codec.decode_as::<IstexRecord>(&bytes, form).unwrap(), istex);

            let bytes = codec.encode_as(&biblio, form).unwrap();
            assert_eq!(codec.decode_as::<BiblioRecord>(&bytes, form).unwrap(), biblio, "{:?}", compression);
        }
    }
}

#[test]
fn default_record_round_trips() {
    let codec = Codec::default();
    let empty = IstexRecord::default();
    let bytes = codec.encode_compressed(&empty).unwrap();
    assert_eq!(codec.decode_compressed::<IstexRecord>(&bytes).unwrap(), empty);
}

#[test]
fn encoded_record_starts_with_format_version() {
    let codec = Codec::default();
    let bytes = codec.encode(&sample_biblio()).unwrap();
    assert_eq!(bytes[0], RECORD_FORMAT_VERSION);
}

#[test]
fn empty_input_is_corrupt() {
    let codec = Codec::default();
    let err = codec.decode::<PmidRecord>(&[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CorruptRecord);

    let err = codec.decode_compressed::<PmidRecord>(&[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CorruptRecord);
}

#[test]
fn truncated_input_is_corrupt_not_default() {
    let codec = Codec::default();
    let bytes = codec.encode(&sample_istex()).unwrap();

    for cut in [1, bytes.len() / 2, bytes.len() - 1] {
        let err = codec.decode::<IstexRecord>(&bytes[..cut]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CorruptRecord, "cut at {}", cut);
    }
}

#[test]
fn truncated_compressed_input_is_corrupt() {
    let codec = Codec::new(CodecConfig { compression: CompressionType::Snappy });
    let bytes = codec.encode_compressed(&sample_biblio()).unwrap();
    let err = codec
        .decode_compressed::<BiblioRecord>(&bytes[..bytes.len() / 2])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::CorruptRecord);
}

#[test]
fn unknown_format_version_is_corrupt() {
    let codec = Codec::default();
    let mut bytes = codec.encode(&sample_biblio()).unwrap();
    bytes[0] = RECORD_FORMAT_VERSION + 1;
    let err = codec.decode::<BiblioRecord>(&bytes).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CorruptRecord);
}

#[test]
fn oversized_lz4_size_prefix_is_corrupt() {
    let codec = Codec::new(CodecConfig { compression: CompressionType::LZ4 });
    let mut bytes = codec.encode_compressed(&sample_biblio()).unwrap();
    bytes[..4].copy_from_slice(&u32::MAX.to_le_bytes());

    let err = codec.decode_compressed::<BiblioRecord>(&bytes).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CorruptRecord);

    let declared = (MAX_DECOMPRESSED_SIZE as u32 + 1).to_le_bytes();
    let block = CompressedBlock::from_bytes([&declared[..], &[0u8; 8][..]].concat(), CompressionType::LZ4);
    assert_eq!(block.decompress().unwrap_err().kind, ErrorKind::CorruptRecord);

    let short = CompressedBlock::from_bytes(vec![1, 2], CompressionType::LZ4);
    assert_eq!(short.decompress().unwrap_err().kind, ErrorKind::CorruptRecord);

    // Snappy's varint length header, claiming u32::MAX bytes
    let snappy = CompressedBlock::from_bytes(vec![0xff, 0xff, 0xff, 0xff, 0x0f, 0], CompressionType::Snappy);
    assert_eq!(snappy.decompress().unwrap_err().kind, ErrorKind::CorruptRecord);
}

#[test]
fn large_lz4_block_within_limit_round_trips() {
    let data: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    let block = CompressedBlock::compress(&data, CompressionType::LZ4).unwrap();
    let restored = CompressedBlock::from_bytes(block.data, CompressionType::LZ4)
        .decompress()
        .unwrap();
    assert_eq!(restored, data);
}
