/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use nanorand::{Rng, WyRand};
use psdx_decoder::zune_core::bytestream::ZCursor;
use psdx_decoder::zune_core::options::DecoderOptions;
use psdx_decoder::{PSDDecoder, PsdOptions};

use crate::common::{CollectSink, Encoding, LayerSpec, PsdBuilder};

mod common;

/// Pixels with enough repetition for RLE runs to show up
fn random_pixels(rng: &mut WyRand, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let value = rng.generate::<u8>();
        let run = rng.generate_range(1_usize..=6);
        for _ in 0..run.min(len - out.len()) {
            out.push(value);
        }
    }
    out
}

#[test]
fn test_random_layers_decode() {
    let mut rng = WyRand::new_seed(0x7073_6478);

    for _ in 0..20 {
        let rows = rng.generate_range(1_u32..=12);
        let columns = rng.generate_range(1_u32..=12);
        let mut builder = PsdBuilder::rgb(rows, columns);
        builder.merged = (0..3)
            .map(|_| random_pixels(&mut rng, (rows * columns) as usize))
            .collect();
        builder.merged_encoding = if rng.generate::<bool>() {
            Encoding::Rle
        } else {
            Encoding::Raw
        };

        let layer_count = rng.generate_range(0_usize..5);
        for l in 0..layer_count {
            let top = rng.generate_range(0_i32..4);
            let left = rng.generate_range(0_i32..4);
            let height = rng.generate_range(1_i32..10);
            let width = rng.generate_range(1_i32..10);
            let size = (height * width) as usize;

            let mut channels = vec![];
            if rng.generate::<bool>() {
                channels.push((-1, random_pixels(&mut rng, size)));
            }
            for id in 0..3 {
                channels.push((id, random_pixels(&mut rng, size)));
            }
            let encoding = if rng.generate::<bool>() {
                Encoding::Rle
            } else {
                Encoding::Raw
            };
            let layer = LayerSpec::new(
                &format!("l{l}"),
                [top, left, top + height, left + width],
                &channels
            )
            .with_encoding(encoding);
            builder = builder.layer(layer);
        }

        let data = builder.build();
        let image = PSDDecoder::new(ZCursor::new(&data)).decode().unwrap();

        assert!(image.warnings.is_empty(), "{:?}", image.warnings);
        assert_eq!(image.layers.len(), layer_count);

        for (decoded, layer) in image.layers.iter().zip(&builder.layers) {
            for (channel, expected) in decoded.channels.iter().zip(&layer.channels) {
                assert_eq!(channel.stream().unwrap().data(), expected.data.as_slice());
            }
        }
        for (channel, expected) in image.merged.iter().zip(&builder.merged) {
            assert_eq!(channel.stream().unwrap().data(), expected.as_slice());
        }
    }
}

#[test]
fn test_corrupted_files_do_not_panic() {
    let mut rng = WyRand::new_seed(0x3842_5053);

    let data = PsdBuilder::rgb(6, 6)
        .layer(
            LayerSpec::new("a", [0, 0, 6, 6], &[(-1, vec![1; 36]), (0, vec![2; 36])])
                .with_encoding(Encoding::Rle)
        )
        .layer(LayerSpec::new("b", [1, 1, 3, 3], &[(0, vec![3; 4])]))
        .build();

    let limits = DecoderOptions::default()
        .set_max_width(256)
        .set_max_height(256);
    let options = PsdOptions::new(limits);

    for _ in 0..500 {
        let mut corrupted = data.clone();
        // leave the header alone so decoding gets past it
        for _ in 0..rng.generate_range(1_usize..8) {
            let position = rng.generate_range(26..corrupted.len());
            corrupted[position] = rng.generate();
        }
        if rng.generate::<bool>() {
            let keep = rng.generate_range(26..corrupted.len());
            corrupted.truncate(keep);
        }

        let mut decoder = PSDDecoder::new_with_options(ZCursor::new(&corrupted), options);
        if let Ok(image) = decoder.decode() {
            let mut sink = CollectSink::default();
            image
                .assembler(&options)
                .write_all(&image, "merged", &mut sink)
                .unwrap();
        }
    }
}
