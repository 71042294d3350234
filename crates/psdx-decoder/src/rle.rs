/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! PackBits run length decoding
//!
//! Loop until you get the number of unpacked bytes you are expecting:
//!  - Read the next source byte into n.
//!  - If n is between 0 and 127 inclusive, copy the next n+1 bytes literally.
//!  - Else if n is between -127 and -1 inclusive, copy the next byte -n+1 times.
//!  - Else if n is -128, noop.

use core::cmp::Ordering;

/// How a single scanline decode went
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RleStatus {
    /// The output was filled completely
    Complete,
    /// The input ran out after producing this many bytes, the rest of
    /// the output was zero filled
    Underflow(usize)
}

/// Decode PackBits `source` into `output`, stopping once `output` is full.
///
/// Trailing input after the output is full is ignored. If the input runs
/// out first, the remaining output bytes are set to zero.
pub fn decode_packbits(source: &[u8], output: &mut [u8]) -> RleStatus {
    let mut src = 0;
    let mut position = 0;

    while position < output.len() {
        let Some(&control) = source.get(src) else {
            break;
        };
        src += 1;

        let left = output.len() - position;

        match control.cmp(&128) {
            Ordering::Less => {
                // copy next control+1 bytes literally
                let wanted = usize::from(control) + 1;
                let available = source.len() - src;
                let length = wanted.min(left).min(available);

                output[position..position + length].copy_from_slice(&source[src..src + length]);
                position += length;
                src += length;

                if length < wanted && length < left {
                    // literal run cut short by the end of input
                    break;
                }
            }
            Ordering::Equal => (),
            Ordering::Greater => {
                // Next -len+1 bytes in the dest are replicated from next source byte.
                // (Interpret len as a negative 8-bit int.)
                let Some(&value) = source.get(src) else {
                    break;
                };
                src += 1;

                let length = (257 - usize::from(control)).min(left);
                output[position..position + length].fill(value);
                position += length;
            }
        }
    }

    if position < output.len() {
        output[position..].fill(0);
        return RleStatus::Underflow(position);
    }
    RleStatus::Complete
}

#[cfg(test)]
pub(crate) mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use nanorand::{Rng, WyRand};

    use crate::rle::{decode_packbits, RleStatus};

    /// Reference PackBits encoder, the same scheme Photoshop writes
    pub(crate) fn encode_packbits(input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut i = 0;

        while i < input.len() {
            // measure a run of identical bytes
            let mut run = 1;
            while i + run < input.len() && run < 128 && input[i + run] == input[i] {
                run += 1;
            }
            if run >= 2 {
                out.push((257 - run) as u8);
                out.push(input[i]);
                i += run;
                continue;
            }
            // literal stretch until the next run of two or more
            let start = i;
            let mut length = 0;
            while i < input.len() && length < 128 {
                if i + 1 < input.len() && input[i] == input[i + 1] {
                    break;
                }
                i += 1;
                length += 1;
            }
            out.push((length - 1) as u8);
            out.extend_from_slice(&input[start..start + length]);
        }
        out
    }

    #[test]
    fn test_literal_and_repeat() {
        // 3 literals, then 4 repeats of 0xAA
        let source = [2, 1, 2, 3, 253, 0xAA];
        let mut out = [0; 7];
        assert_eq!(decode_packbits(&source, &mut out), RleStatus::Complete);
        assert_eq!(out, [1, 2, 3, 0xAA, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn test_noop_control() {
        let source = [128, 0, 7];
        let mut out = [0; 1];
        assert_eq!(decode_packbits(&source, &mut out), RleStatus::Complete);
        assert_eq!(out, [7]);
    }

    #[test]
    fn test_underflow_zero_fills() {
        let source = [255, 9];
        let mut out = [0xFF; 5];
        assert_eq!(decode_packbits(&source, &mut out), RleStatus::Underflow(2));
        assert_eq!(out, [9, 9, 0, 0, 0]);

        // literal run cut short
        let source = [4, 1, 2];
        let mut out = [0xFF; 5];
        assert_eq!(decode_packbits(&source, &mut out), RleStatus::Underflow(2));
        assert_eq!(out, [1, 2, 0, 0, 0]);
    }

    #[test]
    fn test_overlong_run_is_clipped() {
        // a 128 byte repeat into a 3 byte row must not write past it
        let source = [129, 5];
        let mut out = [0; 3];
        assert_eq!(decode_packbits(&source, &mut out), RleStatus::Complete);
        assert_eq!(out, [5, 5, 5]);
    }

    #[test]
    fn test_empty_output() {
        let mut out = [];
        assert_eq!(decode_packbits(&[], &mut out), RleStatus::Complete);
    }

    #[test]
    fn test_random_roundtrip() {
        let mut rng = WyRand::new_seed(0x5053_4478);

        for _ in 0..200 {
            let length = rng.generate_range(1_usize..=600);
            // small alphabet so runs show up
            let alphabet = rng.generate_range(1_u8..=6);
            let row: Vec<u8> = (0..length)
                .map(|_| rng.generate_range(0..alphabet))
                .collect();

            let encoded = encode_packbits(&row);
            assert!(encoded.len() <= 2 * length + 1);

            let mut decoded = vec![0; length];
            assert_eq!(decode_packbits(&encoded, &mut decoded), RleStatus::Complete);
            assert_eq!(decoded, row);
        }
    }
}
