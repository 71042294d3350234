/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Channel pixel data decoding
//!
//! A channel group starts with a 2-byte compression tag. Raw groups
//! follow it with the scanlines, RLE groups with a table of 2-byte
//! scanline lengths for every row of every channel and then the packed
//! scanlines.
//!
//! Layer channels are stored one per group with a length declared in the
//! layer record, the merged image stores all of its channels in a single
//! group at the end of the file.
use alloc::vec;
use alloc::vec::Vec;

use log::trace;
use zune_core::bytestream::ZByteReaderTrait;

use crate::constants::{CompressionMethod, MAX_RLE_EXPANSION};
use crate::context::ParseContext;
use crate::cursor::{ByteCursor, Section};
use crate::errors::{DecodeWarning, PSDDecodeErrors};
use crate::rle::{decode_packbits, RleStatus};

/// Allocate a zero filled buffer, reporting failure instead of aborting
pub(crate) fn try_zeroed(size: usize) -> Result<Vec<u8>, PSDDecodeErrors> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| PSDDecodeErrors::OutOfMemory(size))?;
    buffer.resize(size, 0);
    Ok(buffer)
}

/// Rows and columns of a single channel
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ChannelGeometry {
    pub rows:    usize,
    pub columns: usize
}

impl ChannelGeometry {
    pub const fn new(rows: usize, columns: usize) -> ChannelGeometry {
        ChannelGeometry { rows, columns }
    }

    /// Bytes in one scanline at `depth` bits per sample
    pub fn row_bytes(&self, depth: u16) -> Result<usize, PSDDecodeErrors> {
        self.columns
            .checked_mul(usize::from(depth))
            .map(|bits| bits.div_ceil(8))
            .ok_or(PSDDecodeErrors::OutOfMemory(usize::MAX))
    }

    /// Bytes in the whole decoded channel at `depth` bits per sample
    pub fn channel_bytes(&self, depth: u16) -> Result<usize, PSDDecodeErrors> {
        self.row_bytes(depth)?
            .checked_mul(self.rows)
            .ok_or(PSDDecodeErrors::OutOfMemory(usize::MAX))
    }
}

/// Absolute file offset of every scanline of a channel group.
///
/// Each channel has `rows + 1` entries, the last one is where the
/// channel's data ends. Channels follow each other in file order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowPositionTable {
    rows:      usize,
    positions: Vec<u64>
}

impl RowPositionTable {
    fn with_capacity(channels: usize, rows: usize) -> Result<RowPositionTable, PSDDecodeErrors> {
        let entries = rows
            .checked_add(1)
            .and_then(|x| x.checked_mul(channels))
            .ok_or(PSDDecodeErrors::OutOfMemory(usize::MAX))?;

        let mut positions = Vec::new();
        positions
            .try_reserve_exact(entries)
            .map_err(|_| PSDDecodeErrors::OutOfMemory(entries.saturating_mul(8)))?;

        Ok(RowPositionTable { rows, positions })
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub fn channels(&self) -> usize {
        self.positions.len() / (self.rows + 1)
    }

    /// Row offsets of `channel` including the end sentinel
    pub fn channel(&self, channel: usize) -> &[u64] {
        let stride = self.rows + 1;
        &self.positions[channel * stride..(channel + 1) * stride]
    }

    /// Start offset and stored length of one scanline
    pub fn row_span(&self, channel: usize, row: usize) -> (u64, u64) {
        let positions = self.channel(channel);
        let start = positions[row];
        (start, positions[row + 1].saturating_sub(start))
    }

    /// Offset just past the last scanline of the group
    pub fn end(&self) -> Option<u64> {
        self.positions.last().copied()
    }
}

/// Decompressed scanlines of one channel
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedChannelStream {
    pub geometry:    ChannelGeometry,
    pub depth:       u16,
    pub compression: CompressionMethod,
    data:            Vec<u8>
}

impl DecodedChannelStream {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decode result of a single channel
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChannelData {
    Decoded(DecodedChannelStream),
    /// The channel could not be decoded, no pixels exist for it
    Skipped
}

impl ChannelData {
    pub const fn stream(&self) -> Option<&DecodedChannelStream> {
        match self {
            ChannelData::Decoded(stream) => Some(stream),
            ChannelData::Skipped => None
        }
    }

    pub const fn is_skipped(&self) -> bool {
        matches!(self, ChannelData::Skipped)
    }
}

/// Every channel of a group together with where its rows were found
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedChannelGroup {
    pub channels:      Vec<ChannelData>,
    pub row_positions: Option<RowPositionTable>
}

impl DecodedChannelGroup {
    fn skipped(channels: usize) -> DecodedChannelGroup {
        DecodedChannelGroup {
            channels:      vec![ChannelData::Skipped; channels],
            row_positions: None
        }
    }
}

/// Decodes one channel group from the current cursor position
#[derive(Copy, Clone, Debug)]
pub struct ChannelDecoder {
    channels:        usize,
    geometry:        ChannelGeometry,
    depth:           u16,
    declared_length: Option<u64>,
    // used to number channels in warnings
    first_channel:   usize
}

impl ChannelDecoder {
    /// The merged image, all channels share one compression tag
    pub const fn merged(channels: usize, geometry: ChannelGeometry, depth: u16) -> ChannelDecoder {
        ChannelDecoder {
            channels,
            geometry,
            depth,
            declared_length: None,
            first_channel: 0
        }
    }

    /// A single layer channel whose record declared `length` bytes
    pub const fn layer_channel(
        index: usize, geometry: ChannelGeometry, depth: u16, length: u32
    ) -> ChannelDecoder {
        ChannelDecoder {
            channels: 1,
            geometry,
            depth,
            declared_length: Some(length as u64),
            first_channel: index
        }
    }

    /// Pick a method for an unknown compression tag.
    ///
    /// A declared length that exactly fits the raw scanlines means raw,
    /// anything else is assumed to be RLE.
    fn guess_compression(&self, row_bytes: usize) -> Option<CompressionMethod> {
        let length = self.declared_length?;
        let raw_size = (self.geometry.rows as u64).checked_mul(row_bytes as u64);

        if raw_size == Some(length - 2) {
            Some(CompressionMethod::NoCompression)
        } else {
            Some(CompressionMethod::RLE)
        }
    }

    pub fn decode<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext
    ) -> Result<DecodedChannelGroup, PSDDecodeErrors> {
        let start = cursor.position()?;

        if let Some(length) = self.declared_length {
            if length < 2 {
                ctx.warn(DecodeWarning::ChannelTooShort {
                    length: length as u32
                });
                cursor.seek_forward(length)?;
                return Ok(DecodedChannelGroup::skipped(self.channels));
            }
        }

        let row_bytes = self.geometry.row_bytes(self.depth)?;

        let tag = match cursor.read_u16_be() {
            Ok(tag) => tag,
            Err(PSDDecodeErrors::TruncatedInput(_)) => {
                let available = cursor.remaining()?;
                return self.skip_truncated(cursor, ctx, start, 2, available);
            }
            Err(e) => return Err(e)
        };

        let compression = match CompressionMethod::from_int(tag) {
            Some(method) => method,
            None => {
                let guess = self.guess_compression(row_bytes);
                ctx.warn(DecodeWarning::BadCompression { tag, guess });
                match guess {
                    Some(method) => method,
                    None => return Ok(DecodedChannelGroup::skipped(self.channels))
                }
            }
        };

        trace!(
            "{} channel(s) {}x{} {}, {} bytes per row",
            self.channels,
            self.geometry.columns,
            self.geometry.rows,
            compression.name(),
            row_bytes
        );

        let positions = match compression {
            CompressionMethod::NoCompression => self.raw_positions(cursor, row_bytes)?,
            CompressionMethod::RLE => self.rle_positions(cursor, ctx, row_bytes)?
        };

        if let Some((needed, available)) = self.unrecoverable_truncation(cursor, start, &positions)? {
            return self.skip_truncated(cursor, ctx, start, needed, available);
        }

        let mut channels = Vec::with_capacity(self.channels);

        for channel in 0..self.channels {
            let data = self.read_channel(cursor, ctx, &positions, channel, row_bytes, compression)?;

            channels.push(ChannelData::Decoded(DecodedChannelStream {
                geometry: self.geometry,
                depth: self.depth,
                compression,
                data
            }));
        }

        match self.declared_length {
            Some(length) => Section::new("layer channel", start, length).resync(cursor, ctx)?,
            None => {
                if let Some(end) = positions.end() {
                    cursor.seek_absolute(end)?;
                }
            }
        }

        Ok(DecodedChannelGroup {
            channels,
            row_positions: Some(positions)
        })
    }

    fn skip_truncated<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext, start: u64, needed: u64,
        available: u64
    ) -> Result<DecodedChannelGroup, PSDDecodeErrors> {
        ctx.warn(DecodeWarning::TruncatedChannel {
            channel: self.first_channel,
            needed,
            available
        });
        if let Some(length) = self.declared_length {
            cursor.seek_absolute(start + length)?;
        }
        Ok(DecodedChannelGroup::skipped(self.channels))
    }

    /// Stored and present byte counts of a group whose scanlines run past
    /// the data available to it.
    ///
    /// Missing rows are zero filled, but only while the decoded size stays
    /// within what the bytes present could expand to.
    fn unrecoverable_truncation<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, start: u64, positions: &RowPositionTable
    ) -> Result<Option<(u64, u64)>, PSDDecodeErrors> {
        let (Some(&first), Some(end)) = (positions.positions.first(), positions.end()) else {
            return Ok(None);
        };
        let mut data_end = cursor.source_len()?;

        if let Some(length) = self.declared_length {
            data_end = data_end.min(start + length);
        }
        if end <= data_end {
            return Ok(None);
        }
        let available = data_end.saturating_sub(first);
        let decoded = (self.geometry.channel_bytes(self.depth)? as u64)
            .saturating_mul(self.channels as u64);

        if decoded > available.saturating_mul(MAX_RLE_EXPANSION) {
            return Ok(Some((end - first, available)));
        }
        Ok(None)
    }

    fn raw_positions<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, row_bytes: usize
    ) -> Result<RowPositionTable, PSDDecodeErrors> {
        let rows = self.geometry.rows;
        let mut table = RowPositionTable::with_capacity(self.channels, rows)?;
        let mut position = cursor.position()?;

        for _ in 0..self.channels {
            for _ in 0..=rows {
                table.positions.push(position);
                position += row_bytes as u64;
            }
            // the sentinel is also where the next channel starts
            position -= row_bytes as u64;
        }
        Ok(table)
    }

    fn rle_positions<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext, row_bytes: usize
    ) -> Result<RowPositionTable, PSDDecodeErrors> {
        let rows = self.geometry.rows;
        let needed = 2 * (rows as u64) * (self.channels as u64);

        if let Some(length) = self.declared_length {
            if needed > length - 2 {
                ctx.warn(DecodeWarning::RleCountsTooShort {
                    needed,
                    available: length - 2
                });
            }
        }

        let mut table = RowPositionTable::with_capacity(self.channels, rows)?;
        let mut position = cursor.position()? + needed;
        let mut last = row_bytes;

        for channel in 0..self.channels {
            for row in 0..rows {
                let count = match cursor.read_u16_be() {
                    Ok(count) => count,
                    Err(PSDDecodeErrors::TruncatedInput(_)) => {
                        return Err(PSDDecodeErrors::RleCountsUnreadable(
                            self.first_channel + channel,
                            row,
                            rows
                        ));
                    }
                    Err(e) => return Err(e)
                };

                let mut span = usize::from(count);

                if span > 2 * row_bytes {
                    ctx.warn(DecodeWarning::RleCountClamped {
                        channel: self.first_channel + channel,
                        row,
                        count,
                        replacement: last
                    });
                    span = last;
                } else {
                    last = span;
                }
                table.positions.push(position);
                position += span as u64;
            }
            table.positions.push(position);
        }
        Ok(table)
    }

    fn read_channel<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext, table: &RowPositionTable,
        channel: usize, row_bytes: usize, compression: CompressionMethod
    ) -> Result<Vec<u8>, PSDDecodeErrors> {
        let mut data = try_zeroed(self.geometry.channel_bytes(self.depth)?)?;

        if row_bytes == 0 {
            return Ok(data);
        }
        // clamped counts never exceed twice the row size
        let mut packed = match compression {
            CompressionMethod::RLE => try_zeroed(2 * row_bytes)?,
            CompressionMethod::NoCompression => Vec::new()
        };
        let number = self.first_channel + channel;

        for (row, output) in data.chunks_exact_mut(row_bytes).enumerate() {
            let (start, span) = table.row_span(channel, row);
            cursor.seek_absolute(start)?;

            match compression {
                CompressionMethod::NoCompression => {
                    let read = cursor.read_available(output)?;
                    if read < row_bytes {
                        ctx.warn(DecodeWarning::ShortRow {
                            channel: number,
                            row,
                            expected: row_bytes,
                            read
                        });
                        output.fill(0);
                    }
                }
                CompressionMethod::RLE => {
                    let span = span as usize;
                    let read = cursor.read_available(&mut packed[..span])?;

                    if read < span {
                        ctx.warn(DecodeWarning::ShortRow {
                            channel: number,
                            row,
                            expected: span,
                            read
                        });
                        output.fill(0);
                        continue;
                    }
                    if let RleStatus::Underflow(produced) =
                        decode_packbits(&packed[..span], output)
                    {
                        ctx.warn(DecodeWarning::RleUnderflow {
                            channel: number,
                            row,
                            produced,
                            expected: row_bytes
                        });
                    }
                }
            }
        }
        Ok(data)
    }
}
