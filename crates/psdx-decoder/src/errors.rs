/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Fatal errors and recoverable warnings raised while decoding
//!
//! A [`PSDDecodeErrors`] ends decoding of the current file, a
//! [`DecodeWarning`] is recorded, logged and decoding carries on
//! using a recovery heuristic.
use alloc::string::String;
use core::fmt::{Debug, Display, Formatter};

use zune_core::bytestream::ZByteIoError;

use crate::constants::{CompressionMethod, MAX_CHANNELS, MAX_DEPTH, PSD_IDENTIFIER_BE};

/// PSDDecodeErrors that can occur during PSD decoding
pub enum PSDDecodeErrors {
    /// The file does not start with `8BPS`
    WrongMagicBytes(u32),
    /// Version field was not 1
    UnsupportedFileType(u16),
    /// Channel count is zero or above 64
    UnsupportedChannelCount(u16),
    /// Bit depth above 32
    UnsupportedBitDepth(u16),
    /// Supported and found dimensions
    LargeDimensions(usize, usize),
    ZeroDimensions,
    /// A buffer of this many bytes could not be allocated
    OutOfMemory(usize),
    /// The RLE row count table of a channel group could not be read
    ///
    /// # Arguments
    /// - channel inside the group
    /// - rows read before the stream ended
    /// - rows expected
    RleCountsUnreadable(usize, usize, usize),
    /// A structural field could not be read, the stream ended at this position
    TruncatedInput(u64),
    Generic(&'static str),
    IoErrors(ZByteIoError)
}

impl Debug for PSDDecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            PSDDecodeErrors::Generic(reason) => {
                writeln!(f, "{reason}")
            }
            PSDDecodeErrors::WrongMagicBytes(bytes) => {
                writeln!(
                    f,
                    "Expected {:?} but found  {:?}, not a PSD image",
                    PSD_IDENTIFIER_BE.to_be_bytes(),
                    bytes.to_be_bytes()
                )
            }
            PSDDecodeErrors::UnsupportedFileType(version) => {
                writeln!(
                    f,
                    "Unsupported file version {version:?}, known versions are 1",
                )
            }
            PSDDecodeErrors::UnsupportedChannelCount(channels) => {
                writeln!(
                    f,
                    "Unsupported channel count {channels:?}, expected 1 to {MAX_CHANNELS}"
                )
            }
            PSDDecodeErrors::UnsupportedBitDepth(depth) => {
                writeln!(
                    f,
                    "Unsupported bit depth {depth:?}, depths up to {MAX_DEPTH} are supported",
                )
            }
            PSDDecodeErrors::LargeDimensions(supported, found) => {
                writeln!(
                    f,
                    "Too large dimensions, supported {supported} but found {found}",
                )
            }
            PSDDecodeErrors::ZeroDimensions => {
                writeln!(f, "Zero found where not expected")
            }
            PSDDecodeErrors::OutOfMemory(size) => {
                writeln!(f, "Cannot allocate {size} bytes")
            }
            PSDDecodeErrors::RleCountsUnreadable(channel, read, expected) => {
                writeln!(
                    f,
                    "Couldn't read RLE counts of channel {channel}, read {read} of {expected} rows"
                )
            }
            PSDDecodeErrors::TruncatedInput(position) => {
                writeln!(f, "Unexpected end of file at position {position}")
            }
            PSDDecodeErrors::IoErrors(e) => {
                writeln!(f, "I/O error :{:?}", e)
            }
        }
    }
}

impl Display for PSDDecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PSDDecodeErrors {}

impl From<&'static str> for PSDDecodeErrors {
    fn from(r: &'static str) -> Self {
        Self::Generic(r)
    }
}

impl From<ZByteIoError> for PSDDecodeErrors {
    fn from(r: ZByteIoError) -> Self {
        Self::IoErrors(r)
    }
}

/// A recoverable problem found in the file.
///
/// Each warning names the heuristic that was applied, decoding
/// continues after it is raised.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeWarning {
    /// Compression tag was neither raw nor RLE, `guess` is the
    /// method assumed from the declared channel length, `None` if
    /// the channel was skipped
    BadCompression {
        tag:   u16,
        guess: Option<CompressionMethod>
    },
    /// A layer channel declared less than the two bytes of its compression tag
    ChannelTooShort { length: u32 },
    /// The file ends before a channel group's data, its channels were skipped
    TruncatedChannel {
        channel:   usize,
        needed:    u64,
        available: u64
    },
    /// The declared channel length cannot hold the RLE row count table
    RleCountsTooShort { needed: u64, available: u64 },
    /// An impossible RLE row count was replaced by the previous one
    RleCountClamped {
        channel:     usize,
        row:         usize,
        count:       u16,
        replacement: usize
    },
    /// A row could not be read in full and was zero filled
    ShortRow {
        channel:  usize,
        row:      usize,
        expected: usize,
        read:     usize
    },
    /// RLE data for a row ran out before the row was complete
    RleUnderflow {
        channel:  usize,
        row:      usize,
        produced: usize,
        expected: usize
    },
    /// The cursor did not end where a section said it would and was moved there
    Resynchronized {
        section:  &'static str,
        position: u64,
        expected: u64
    },
    /// Layer record with an implausible rectangle or channel count
    SkippedLayer { layer: usize, channels: usize },
    /// Layer mask rectangle that is inverted or too large, the mask channel is left empty
    ImplausibleMask { layer: usize },
    /// Channel id outside the range a layer can have
    UnexpectedChannelId { layer: usize, id: i16 },
    /// The layer count cannot fit in the layer info section
    UnlikelyLayerCount { count: usize, section_length: u64 },
    /// Image resource block with an unknown signature
    BadResourceSignature { signature: [u8; 4] },
    /// Image resource blocks extend past the declared section length
    ResourceOverrun { bytes: u64 },
    /// Blend mode record without the `8BIM` signature
    BadBlendSignature { layer: usize, signature: [u8; 4] },
    /// A color channel an output image needs is missing and was zero filled
    MissingChannel { image: String, id: i16 },
    /// A channel could not be decoded and no image was produced for it
    NotWritten { image: String }
}

impl DecodeWarning {
    /// Whether this warning counts towards the per file warning limit.
    ///
    /// Warnings that repeat per row or per channel are counted, the
    /// structural ones are always reported.
    pub const fn is_counted(&self) -> bool {
        matches!(
            self,
            DecodeWarning::RleCountClamped { .. }
                | DecodeWarning::ShortRow { .. }
                | DecodeWarning::RleUnderflow { .. }
                | DecodeWarning::UnexpectedChannelId { .. }
                | DecodeWarning::BadResourceSignature { .. }
                | DecodeWarning::ResourceOverrun { .. }
                | DecodeWarning::MissingChannel { .. }
        )
    }
}

fn signature_str(signature: &[u8; 4]) -> String {
    signature
        .iter()
        .map(|c| if c.is_ascii_graphic() { char::from(*c) } else { '?' })
        .collect()
}

impl Display for DecodeWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeWarning::BadCompression { tag, guess } => match guess {
                Some(method) => write!(
                    f,
                    "bad compression type {tag}, guessing: {}",
                    method.name()
                ),
                None => write!(f, "bad compression type {tag}, skipping channel")
            },
            DecodeWarning::ChannelTooShort { length } => {
                write!(f, "channel too short ({length} bytes)")
            }
            DecodeWarning::TruncatedChannel {
                channel,
                needed,
                available
            } => write!(
                f,
                "channel {channel} truncated, {available} of {needed} bytes present, skipping"
            ),
            DecodeWarning::RleCountsTooShort { needed, available } => write!(
                f,
                "channel too short for RLE row counts (need {needed} bytes, have {available} bytes)"
            ),
            DecodeWarning::RleCountClamped {
                channel,
                row,
                count,
                replacement
            } => write!(
                f,
                "bad RLE count {count} @ row {row} of channel {channel}, using {replacement}"
            ),
            DecodeWarning::ShortRow {
                channel,
                row,
                expected,
                read
            } => write!(
                f,
                "couldn't read row {row} of channel {channel}, got {read} of {expected} bytes"
            ),
            DecodeWarning::RleUnderflow {
                channel,
                row,
                produced,
                expected
            } => write!(
                f,
                "RLE data for row {row} of channel {channel} ended after {produced} of {expected} bytes"
            ),
            DecodeWarning::Resynchronized {
                section,
                position,
                expected
            } => write!(
                f,
                "{section}: currentpos = {position}, should be {expected}, repositioned"
            ),
            DecodeWarning::SkippedLayer { layer, channels } => write!(
                f,
                "layer {layer} ({channels} channels) has implausible geometry, skipped"
            ),
            DecodeWarning::ImplausibleMask { layer } => {
                write!(f, "layer {layer} has an implausible mask rectangle, mask ignored")
            }
            DecodeWarning::UnexpectedChannelId { layer, id } => {
                write!(f, "unexpected channel id {id} in layer {layer}")
            }
            DecodeWarning::UnlikelyLayerCount {
                count,
                section_length
            } => write!(
                f,
                "unlikely number of layers ({count} in {section_length} bytes), giving up"
            ),
            DecodeWarning::BadResourceSignature { signature } => write!(
                f,
                "image resource with unexpected signature '{}'",
                signature_str(signature)
            ),
            DecodeWarning::ResourceOverrun { bytes } => write!(
                f,
                "image resources overran expected size by {bytes} bytes"
            ),
            DecodeWarning::BadBlendSignature { layer, signature } => write!(
                f,
                "layer {layer} blend mode has signature '{}'",
                signature_str(signature)
            ),
            DecodeWarning::MissingChannel { image, id } => {
                write!(f, "\"{image}\" has no channel {id}, filled with zeros")
            }
            DecodeWarning::NotWritten { image } => {
                write!(f, "not writing \"{image}\", bad channel compression type")
            }
        }
    }
}
