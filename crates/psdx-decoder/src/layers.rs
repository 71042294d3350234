/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Layer and mask information section
//!
//! Layout of the section
//! - 4 byte section length
//!   - 4 byte layer info length
//!     - 2 byte signed layer count, negative means the first extra
//!       channel of the merged image is its transparency
//!     - one layer record per layer
//!     - channel pixel data of every layer, in record order
//!   - global layer mask info block
//!   - additional data we don't read
//!
//! Records are read first, then each layer's pixel data is decoded from
//! its own window, see [`crate::tasks`].
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use log::{debug, info, trace};
use zune_core::bytestream::ZByteReaderTrait;

use crate::channel::{ChannelData, ChannelDecoder, ChannelGeometry};
use crate::constants::{ColorModes, MAX_CHANNELS, RESOURCE_SIGNATURE};
use crate::context::ParseContext;
use crate::cursor::{pad_to, skip_block, ByteCursor, Section};
use crate::errors::{DecodeWarning, PSDDecodeErrors};
use crate::tasks::LayerTask;

/// Identity of a channel inside a layer
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChannelId {
    /// Color or spot channel, numbered from zero
    Color(u16),
    /// Stored as id `-1`
    TransparencyMask,
    /// Stored as id `-2`, has its own geometry
    LayerMask
}

impl ChannelId {
    /// Interpret a stored channel id, ids below `-2` have no meaning
    pub const fn from_raw(id: i16) -> Option<ChannelId> {
        match id {
            -2 => Some(ChannelId::LayerMask),
            -1 => Some(ChannelId::TransparencyMask),
            0.. => Some(ChannelId::Color(id as u16)),
            _ => None
        }
    }

    pub const fn raw(self) -> i16 {
        match self {
            ChannelId::Color(n) => n as i16,
            ChannelId::TransparencyMask => -1,
            ChannelId::LayerMask => -2
        }
    }
}

/// Where each known channel id sits in a layer's channel list
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChannelIndexMap {
    transparency: Option<usize>,
    layer_mask:   Option<usize>,
    color:        Vec<Option<usize>>
}

impl ChannelIndexMap {
    fn with_channels(channels: usize) -> ChannelIndexMap {
        ChannelIndexMap {
            transparency: None,
            layer_mask:   None,
            color:        vec![None; channels]
        }
    }

    fn insert(&mut self, id: ChannelId, position: usize) {
        match id {
            ChannelId::TransparencyMask => self.transparency = Some(position),
            ChannelId::LayerMask => self.layer_mask = Some(position),
            ChannelId::Color(n) => {
                if let Some(slot) = self.color.get_mut(usize::from(n)) {
                    *slot = Some(position);
                }
            }
        }
    }

    /// Position of `id` in the channel list, `None` if the layer lacks it
    pub fn get(&self, id: ChannelId) -> Option<usize> {
        match id {
            ChannelId::TransparencyMask => self.transparency,
            ChannelId::LayerMask => self.layer_mask,
            ChannelId::Color(n) => self.color.get(usize::from(n)).copied().flatten()
        }
    }
}

/// A channel entry of a layer record
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelDescriptor {
    /// Id as stored in the file
    pub raw_id: i16,
    /// Bytes of pixel data, compression tag included
    pub length: u32
}

impl ChannelDescriptor {
    pub const fn id(&self) -> Option<ChannelId> {
        ChannelId::from_raw(self.raw_id)
    }
}

/// Layer bounds, bottom and right are exclusive
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LayerRect {
    pub top:    i32,
    pub left:   i32,
    pub bottom: i32,
    pub right:  i32
}

impl LayerRect {
    fn read<T: ZByteReaderTrait>(cursor: &mut ByteCursor<T>) -> Result<LayerRect, PSDDecodeErrors> {
        Ok(LayerRect {
            top:    cursor.read_i32_be()?,
            left:   cursor.read_i32_be()?,
            bottom: cursor.read_i32_be()?,
            right:  cursor.read_i32_be()?
        })
    }

    pub const fn is_inverted(&self) -> bool {
        self.bottom < self.top || self.right < self.left
    }

    pub fn height(&self) -> usize {
        usize::try_from(i64::from(self.bottom) - i64::from(self.top)).unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        usize::try_from(i64::from(self.right) - i64::from(self.left)).unwrap_or(0)
    }

    pub fn geometry(&self) -> ChannelGeometry {
        ChannelGeometry::new(self.height(), self.width())
    }
}

/// Blend mode record of a layer
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlendMode {
    pub signature: [u8; 4],
    pub key:       [u8; 4],
    pub opacity:   u8,
    pub clipping:  u8,
    pub flags:     u8
}

impl BlendMode {
    fn read<T: ZByteReaderTrait>(cursor: &mut ByteCursor<T>) -> Result<BlendMode, PSDDecodeErrors> {
        let signature = cursor.read_fixed::<4>()?;
        let key = cursor.read_fixed::<4>()?;
        let [opacity, clipping, flags, _filler] = cursor.read_fixed::<4>()?;

        Ok(BlendMode {
            signature,
            key,
            opacity,
            clipping,
            flags
        })
    }

    /// Opacity rounded to a percentage
    pub const fn opacity_percent(&self) -> u8 {
        ((self.opacity as u16 * 100 + 127) / 255) as u8
    }

    pub const fn transparency_protected(&self) -> bool {
        self.flags & 1 != 0
    }

    pub const fn hidden(&self) -> bool {
        self.flags & 2 != 0
    }
}

/// Layer mask record
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LayerMask {
    pub rect:          LayerRect,
    pub default_color: u8,
    pub flags:         u8
}

/// Structure of a single layer, without its pixels
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LayerRecord {
    /// Position in the file, starting at zero
    pub index:         usize,
    pub rect:          LayerRect,
    pub channels:      Vec<ChannelDescriptor>,
    pub index_map:     ChannelIndexMap,
    /// `None` for skipped layers
    pub blend:         Option<BlendMode>,
    pub mask:          Option<LayerMask>,
    /// Stored name, or `layerN` when it was empty
    pub name:          String,
    /// `layerN`, counting from one
    pub numbered_name: String,
    /// The record was implausible, the layer has no pixels
    pub skipped:       bool
}

impl LayerRecord {
    /// Bytes of pixel data of every channel together
    pub fn pixel_data_length(&self) -> u64 {
        self.channels.iter().map(|c| u64::from(c.length)).sum()
    }

    pub fn has_transparency(&self) -> bool {
        self.index_map.get(ChannelId::TransparencyMask).is_some()
    }

    /// Rows and columns of a channel, the layer mask has its own
    pub fn channel_geometry(&self, descriptor: &ChannelDescriptor) -> ChannelGeometry {
        match descriptor.id() {
            Some(ChannelId::LayerMask) => self
                .mask
                .map(|mask| mask.rect.geometry())
                .unwrap_or_default(),
            _ => self.rect.geometry()
        }
    }

    /// Decode every channel, the cursor must be at the start of this layer's pixel data
    pub fn decode_channels<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext, depth: u16
    ) -> Result<Vec<ChannelData>, PSDDecodeErrors> {
        if self.skipped {
            cursor.seek_forward(self.pixel_data_length())?;
            return Ok(Vec::new());
        }
        debug!("layer {} (\"{}\"):", self.index, self.name);

        let mut decoded = Vec::with_capacity(self.channels.len());

        for (position, descriptor) in self.channels.iter().enumerate() {
            let geometry = self.channel_geometry(descriptor);

            let mut group = ChannelDecoder::layer_channel(position, geometry, depth, descriptor.length)
                .decode(cursor, ctx)?;

            decoded.push(group.channels.pop().unwrap_or(ChannelData::Skipped));
        }
        Ok(decoded)
    }
}

/// Records of the layer section and where their pixel data lives
#[derive(Clone, Debug, Default)]
pub struct LayerInfo {
    pub records:          Vec<LayerRecord>,
    /// Offset of the first layer's pixel data
    pub pixel_data_start: u64,
    misc:                 Option<Section>,
    layer_info:           Option<Section>
}

impl LayerInfo {
    /// One decode task per layer, each knowing where its pixel data starts
    pub fn tasks(&self) -> Vec<LayerTask<'_>> {
        let mut start = self.pixel_data_start;

        self.records
            .iter()
            .map(|record| {
                let task = LayerTask {
                    index: record.index,
                    start,
                    record
                };
                start += record.pixel_data_length();
                task
            })
            .collect()
    }

    pub fn into_records(self) -> Vec<LayerRecord> {
        self.records
    }

    /// Offset just past the last layer's pixel data
    pub fn pixel_data_end(&self) -> u64 {
        self.pixel_data_start
            + self
                .records
                .iter()
                .map(LayerRecord::pixel_data_length)
                .sum::<u64>()
    }

    /// Step over what follows the layer pixel data, leaving the cursor
    /// at the end of the layer and mask section.
    pub fn finish<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext
    ) -> Result<(), PSDDecodeErrors> {
        let Some(misc) = self.misc else {
            return Ok(());
        };

        if let Some(layer_info) = self.layer_info {
            let end = self.pixel_data_end();
            cursor.seek_absolute(end)?;
            // the section length is rounded up to an even size
            if end > layer_info.start
                && pad_to(end - layer_info.start, 2) == layer_info.length
            {
                layer_info.skip(cursor)?;
            }
            layer_info.resync(cursor, ctx)?;
        }

        // a file cut inside the layer pixels has no mask block left
        if cursor.position()? < misc.end() && cursor.remaining()? >= 4 {
            skip_block(cursor, "global layer mask info")?;
        }
        misc.resync(cursor, ctx)
    }
}

/// Reads the records of the layer and mask information section
pub struct LayerRecordParser {
    header_channels: usize,
    mode:            Option<ColorModes>,
    max_width:       usize,
    max_height:      usize
}

impl LayerRecordParser {
    pub const fn new(
        header_channels: usize, mode: Option<ColorModes>, max_width: usize, max_height: usize
    ) -> LayerRecordParser {
        LayerRecordParser {
            header_channels,
            mode,
            max_width,
            max_height
        }
    }

    /// Read every layer record, the cursor must be at the section length.
    ///
    /// On return the cursor is at the first layer's pixel data, or at the
    /// end of the section if there is nothing more to read.
    pub fn read_records<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext
    ) -> Result<LayerInfo, PSDDecodeErrors> {
        let misc = Section::read(cursor, "layer & mask info")?;

        if misc.is_empty() {
            debug!("  (misc info section is empty)");
            return Ok(LayerInfo {
                pixel_data_start: cursor.position()?,
                ..LayerInfo::default()
            });
        }

        let layer_info = Section::read(cursor, "layer info")?;

        if layer_info.is_empty() {
            debug!("  (layer info section is empty)");
            return Ok(LayerInfo {
                records:          Vec::new(),
                pixel_data_start: cursor.position()?,
                misc:             Some(misc),
                layer_info:       None
            });
        }

        let stored_count = cursor.read_i16_be()?;

        if stored_count < 0 {
            debug!("  (first alpha is transparency for merged image)");
            ctx.set_merged_alpha(true);
        }
        let count = usize::from(stored_count.unsigned_abs());

        info!("{count} layers");

        let minimum_size = (count as u64) * (18 + 6 * self.header_channels as u64);

        if minimum_size > layer_info.length {
            ctx.warn(DecodeWarning::UnlikelyLayerCount {
                count,
                section_length: layer_info.length
            });
            misc.skip(cursor)?;

            return Ok(LayerInfo {
                records:          Vec::new(),
                pixel_data_start: misc.end(),
                misc:             None,
                layer_info:       None
            });
        }

        let mut records = Vec::with_capacity(count);

        for index in 0..count {
            records.push(self.read_record(cursor, ctx, index)?);
        }

        Ok(LayerInfo {
            records,
            pixel_data_start: cursor.position()?,
            misc: Some(misc),
            layer_info: Some(layer_info)
        })
    }

    fn exceeds_limits(&self, rect: &LayerRect) -> bool {
        rect.width() > self.max_width || rect.height() > self.max_height
    }

    fn read_record<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext, index: usize
    ) -> Result<LayerRecord, PSDDecodeErrors> {
        let rect = LayerRect::read(cursor)?;
        let channel_count = usize::from(cursor.read_u16_be()?);
        let numbered_name = format!("layer{}", index + 1);

        info!(
            "  layer {index}: ({:4},{:4},{:4},{:4}), {channel_count} channels ({} rows x {} cols)",
            rect.top,
            rect.left,
            rect.bottom,
            rect.right,
            i64::from(rect.bottom) - i64::from(rect.top),
            i64::from(rect.right) - i64::from(rect.left)
        );

        if rect.is_inverted() || channel_count > MAX_CHANNELS || self.exceeds_limits(&rect) {
            ctx.warn(DecodeWarning::SkippedLayer {
                layer:    index,
                channels: channel_count
            });

            let mut channels = Vec::new();

            if channel_count <= MAX_CHANNELS {
                // keep the lengths so later layers find their pixel data
                for _ in 0..channel_count {
                    channels.push(ChannelDescriptor {
                        raw_id: cursor.read_i16_be()?,
                        length: cursor.read_u32_be()?
                    });
                }
                cursor.seek_forward(12)?;
            } else {
                cursor.seek_forward(6 * channel_count as u64 + 12)?;
            }
            skip_block(cursor, "layer info: extra data")?;

            return Ok(LayerRecord {
                index,
                rect,
                channels,
                index_map: ChannelIndexMap::default(),
                blend: None,
                mask: None,
                name: numbered_name.clone(),
                numbered_name,
                skipped: true
            });
        }

        let mut channels = Vec::with_capacity(channel_count);
        let mut index_map = ChannelIndexMap::with_channels(channel_count);

        for position in 0..channel_count {
            let descriptor = ChannelDescriptor {
                raw_id: cursor.read_i16_be()?,
                length: cursor.read_u32_be()?
            };

            match descriptor.id() {
                Some(ChannelId::Color(n)) if usize::from(n) >= channel_count => {
                    ctx.warn(DecodeWarning::UnexpectedChannelId {
                        layer: index,
                        id:    descriptor.raw_id
                    });
                }
                Some(id) => index_map.insert(id, position),
                None => ctx.warn(DecodeWarning::UnexpectedChannelId {
                    layer: index,
                    id:    descriptor.raw_id
                })
            }
            trace!(
                "    channel {position:2}: {:7} bytes, id={:2} {}",
                descriptor.length,
                descriptor.raw_id,
                self.describe_channel(descriptor.raw_id)
            );
            channels.push(descriptor);
        }

        let blend = BlendMode::read(cursor)?;

        if blend.signature != RESOURCE_SIGNATURE {
            ctx.warn(DecodeWarning::BadBlendSignature {
                layer:     index,
                signature: blend.signature
            });
        }
        trace!(
            "  blending mode: key='{}' opacity={}({}%) clipping={} flags={:#x}",
            String::from_utf8_lossy(&blend.key),
            blend.opacity,
            blend.opacity_percent(),
            blend.clipping,
            blend.flags
        );

        let extra = Section::read(cursor, "layer info: extra data")?;

        let mut mask = read_layer_mask(cursor)?;

        if let Some(found) = mask {
            if found.rect.is_inverted() || self.exceeds_limits(&found.rect) {
                ctx.warn(DecodeWarning::ImplausibleMask { layer: index });
                mask = None;
            }
        }
        skip_block(cursor, "layer blending ranges")?;

        let stored_name = cursor.read_pascal_string(4)?;

        let name = if stored_name.is_empty() {
            numbered_name.clone()
        } else {
            info!("    name: \"{stored_name}\"");
            match stored_name.strip_prefix('.') {
                Some(rest) => format!("_{rest}"),
                None => stored_name
            }
        };

        extra.skip(cursor)?;

        Ok(LayerRecord {
            index,
            rect,
            channels,
            index_map,
            blend: Some(blend),
            mask,
            name,
            numbered_name,
            skipped: false
        })
    }

    fn describe_channel(&self, id: i16) -> String {
        let letters = self.mode.map(ColorModes::channel_suffixes).unwrap_or("");

        match id {
            -2 => String::from("(layer mask)"),
            -1 => String::from("(transparency mask)"),
            0.. => letters
                .chars()
                .nth(id as usize)
                .map(|c| format!("({c})"))
                .unwrap_or_default(),
            _ => String::new()
        }
    }
}

fn read_layer_mask<T: ZByteReaderTrait>(
    cursor: &mut ByteCursor<T>
) -> Result<Option<LayerMask>, PSDDecodeErrors> {
    let size = u64::from(cursor.read_u32_be()?);

    if size == 0 {
        return Ok(None);
    }
    let rect = LayerRect::read(cursor)?;
    let default_color = cursor.read_u8()?;
    let flags = cursor.read_u8()?;
    // skip remainder
    cursor.seek_forward(size.saturating_sub(18))?;

    trace!(
        "  layer mask ({},{},{},{}) ({} rows x {} cols)",
        rect.top,
        rect.left,
        rect.bottom,
        rect.right,
        rect.height(),
        rect.width()
    );

    Ok(Some(LayerMask {
        rect,
        default_color,
        flags
    }))
}
