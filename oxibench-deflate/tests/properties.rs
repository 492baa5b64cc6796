//! Property tests for the Deflate codec and its Huffman engine.

use oxibench_core::{BitReader, BitWriter};
use oxibench_deflate::huffman::MAX_CODE_LENGTH;
use oxibench_deflate::lz77::{Lz77Config, find_tokens, replay};
use oxibench_deflate::{HuffmanCode, HuffmanDecoder, deflate, inflate};
use proptest::prelude::*;

/// Byte strings biased toward repetition, so matches actually occur.
fn compressible_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec((0u8..4, 1usize..40), 0..60).prop_map(|runs| {
        runs.into_iter()
            .flat_map(|(value, len)| std::iter::repeat_n(value * 50, len))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_roundtrip_random(data in prop::collection::vec(any::<u8>(), 0..2048), level in 0u8..=9) {
        let compressed = deflate(&data, level).unwrap();
        prop_assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn prop_roundtrip_repetitive(data in compressible_bytes(), level in 0u8..=9) {
        let compressed = deflate(&data, level).unwrap();
        prop_assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn prop_short_inputs(data in prop::collection::vec(any::<u8>(), 0..3), level in 0u8..=9) {
        let compressed = deflate(&data, level).unwrap();
        prop_assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn prop_tokens_cover_input(data in compressible_bytes(), level in 0u8..=9) {
        let config = Lz77Config::for_level(level);
        let tokens = find_tokens(&data, &config).unwrap();

        let covered: usize = tokens.iter().map(|t| t.span()).sum();
        prop_assert_eq!(covered, data.len());
        prop_assert_eq!(replay(&tokens).unwrap(), data);
    }

    #[test]
    fn prop_canonical_code_is_prefix_free(
        freqs in prop::collection::vec(0u32..1000, 2..64),
    ) {
        let code = HuffmanCode::from_frequencies(&freqs, MAX_CODE_LENGTH as u8).unwrap();

        let codes: Vec<(u32, u8)> = (0..freqs.len() as u16)
            .filter_map(|s| code.canonical_code(s).map(|c| (c, code.length(s))))
            .collect();
        for (i, &(a, la)) in codes.iter().enumerate() {
            for &(b, lb) in &codes[i + 1..] {
                let shared = la.min(lb);
                prop_assert_ne!(a >> (la - shared), b >> (lb - shared));
            }
        }
    }

    #[test]
    fn prop_huffman_symbols_decode(
        symbols in prop::collection::vec(0u16..40, 1..500),
    ) {
        let mut freqs = vec![0u32; 40];
        for &s in &symbols {
            freqs[s as usize] += 1;
        }
        let code = HuffmanCode::from_frequencies(&freqs, 12).unwrap();
        prop_assert!(code.lengths().iter().all(|&l| l <= 12));

        let mut writer = BitWriter::new();
        for &s in &symbols {
            code.encode_symbol(&mut writer, s).unwrap();
        }
        let bytes = writer.finish();

        let decoder = HuffmanDecoder::from_lengths(code.lengths()).unwrap();
        let mut reader = BitReader::new(&bytes);
        prop_assert_eq!(decoder.decode(&mut reader, symbols.len()).unwrap(), symbols);
    }
}
