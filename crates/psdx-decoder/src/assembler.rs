/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Turning decoded channels into images
//!
//! For the color modes an ordinary image format can hold (bitmap,
//! grayscale, duotone, indexed and RGB) the leading color channels and
//! an optional transparency are packed into one image. Every other
//! channel (layer masks, spot colors, extra alphas) is emitted as a
//! grayscale image of its own.
//!
//! The merged image stores
//! - the merged color channels (1 or 3)
//! - its transparency, if the layer count was negative
//! - any remaining alpha or spot channels
use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::debug;
use zune_core::colorspace::ColorSpace;

use crate::channel::{try_zeroed, ChannelData, ChannelGeometry};
use crate::constants::ColorModes;
use crate::context::ParseContext;
use crate::decoder::{ColorModeData, PsdHeader, PsdImage, PsdOptions};
use crate::errors::{DecodeWarning, PSDDecodeErrors};
use crate::layers::{ChannelId, LayerRecord};

/// Pixel layout of an output image
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColorModel {
    Gray,
    GrayAlpha,
    /// Palette indices, see [`OutputImage::palette`]
    Indexed,
    Rgb,
    Rgba
}

impl ColorModel {
    pub const fn components(self) -> usize {
        match self {
            ColorModel::Gray | ColorModel::Indexed => 1,
            ColorModel::GrayAlpha => 2,
            ColorModel::Rgb => 3,
            ColorModel::Rgba => 4
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(self, ColorModel::GrayAlpha | ColorModel::Rgba)
    }

    /// Matching zune colorspace, indexed images have none until expanded
    pub const fn colorspace(self) -> Option<ColorSpace> {
        match self {
            ColorModel::Gray => Some(ColorSpace::Luma),
            ColorModel::GrayAlpha => Some(ColorSpace::LumaA),
            ColorModel::Rgb => Some(ColorSpace::RGB),
            ColorModel::Rgba => Some(ColorSpace::RGBA),
            ColorModel::Indexed => None
        }
    }
}

/// What an image is assembled from
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ImageKind {
    Layer { has_transparency: bool },
    Merged { channels: usize, merged_alpha: bool }
}

/// Color model of the packed image for `mode`, `None` if the mode has
/// no packed form and every channel is emitted on its own.
pub fn plan_image(mode: Option<ColorModes>, kind: ImageKind) -> Option<ColorModel> {
    let alpha = |base: usize| match kind {
        ImageKind::Layer { has_transparency } => has_transparency,
        ImageKind::Merged {
            channels,
            merged_alpha
        } => channels > base && merged_alpha
    };

    match mode? {
        ColorModes::Bitmap
        | ColorModes::Grayscale
        | ColorModes::Gray16
        | ColorModes::DuoTone
        | ColorModes::DuoTone16 => {
            if alpha(1) {
                Some(ColorModel::GrayAlpha)
            } else {
                Some(ColorModel::Gray)
            }
        }
        ColorModes::IndexedColor => Some(ColorModel::Indexed),
        ColorModes::RGB | ColorModes::RGB48 => {
            if alpha(3) {
                Some(ColorModel::Rgba)
            } else {
                Some(ColorModel::Rgb)
            }
        }
        _ => None
    }
}

/// A finished image, ready to be encoded
#[derive(Clone, Debug)]
pub struct OutputImage<'a> {
    /// Suggested file name without extension
    pub name:        String,
    pub rows:        usize,
    pub columns:     usize,
    /// Bits per sample
    pub depth:       u16,
    pub color_model: ColorModel,
    /// One decoded stream per component, in color model order
    pub channels:    Vec<Cow<'a, [u8]>>,
    /// Planar palette of indexed images, 256 reds then greens then blues
    pub palette:     Option<&'a [u8]>
}

impl<'a> OutputImage<'a> {
    /// Bytes per sample, at least one
    pub const fn sample_bytes(&self) -> usize {
        if self.depth <= 8 {
            1
        } else {
            (self.depth as usize).div_ceil(8)
        }
    }

    /// Pixel interleaved bytes, samples keep their stored byte order
    pub fn interleave(&self) -> Vec<u8> {
        if let [single] = self.channels.as_slice() {
            return single.to_vec();
        }
        let sample = self.sample_bytes();
        let length = self.channels.iter().map(|c| c.len()).min().unwrap_or(0);
        let mut out = Vec::with_capacity(length * self.channels.len());

        for offset in (0..length).step_by(sample) {
            for channel in &self.channels {
                out.extend_from_slice(&channel[offset..(offset + sample).min(length)]);
            }
        }
        out
    }

    /// Expand palette indices to RGB triplets, `None` if the image has no palette
    pub fn expand_palette(&self) -> Option<Vec<u8>> {
        let palette = self.palette?;
        let indices = self.channels.first()?;

        if palette.len() < 768 {
            return None;
        }
        let (reds, rest) = palette.split_at(256);
        let (greens, blues) = rest.split_at(256);

        let mut out = Vec::with_capacity(indices.len() * 3);
        for &index in indices.iter() {
            let i = usize::from(index);
            out.extend_from_slice(&[reds[i], greens[i], blues[i]]);
        }
        Some(out)
    }
}

/// Destination of assembled images, e.g. a PNG writer
pub trait ImageSink {
    type Error;

    fn write_image(&mut self, image: &OutputImage<'_>) -> Result<(), Self::Error>;

    /// Whether images should be assembled at all, a sink returning
    /// false only sees the file decoded
    fn wants_images(&self) -> bool {
        true
    }
}

/// File name suffix of a channel emitted on its own
pub fn channel_suffix(mode: Option<ColorModes>, id: i16, in_layer: bool) -> String {
    let letters = mode.map(ColorModes::channel_suffixes).unwrap_or("");

    match id {
        -2 => String::from(".lmask"),
        -1 if in_layer => String::from(".trans"),
        -1 => String::from(".alpha"),
        0.. if (id as usize) < letters.len() => {
            format!(".{}", &letters[id as usize..=id as usize])
        }
        _ => format!(".{id}")
    }
}

/// Builds the images of a file from its decoded channels.
///
/// Only the header and palette are borrowed, channels are passed per
/// call so layers can be assembled while the rest of the file is still
/// being decoded.
pub struct ImageAssembler<'a> {
    header:   PsdHeader,
    palette:  Option<&'a [u8]>,
    split:    bool,
    numbered: bool,
    ctx:      ParseContext
}

impl<'a> ImageAssembler<'a> {
    pub fn new(
        header: PsdHeader, color_mode_data: &'a ColorModeData, options: &PsdOptions
    ) -> ImageAssembler<'a> {
        ImageAssembler {
            header,
            palette: color_mode_data.palette(),
            split: options.split_channels(),
            numbered: options.numbered_names(),
            ctx: ParseContext::new(options.warning_limit())
        }
    }

    /// Warnings raised while assembling, missing and unwritable channels
    pub fn warnings(&self) -> &[DecodeWarning] {
        self.ctx.warnings()
    }

    /// Counted assembly warnings past the warning limit
    pub const fn suppressed_warnings(&self) -> usize {
        self.ctx.suppressed_warnings()
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<DecodeWarning> {
        self.ctx.take_warnings()
    }

    fn mode(&self) -> Option<ColorModes> {
        self.header.color_mode()
    }

    fn palette(&self, model: ColorModel) -> Option<&'a [u8]> {
        match model {
            ColorModel::Indexed => self.palette,
            _ => None
        }
    }

    fn single<'b>(
        &mut self, name: String, geometry: ChannelGeometry, data: &'b ChannelData
    ) -> Option<OutputImage<'b>> {
        match data {
            ChannelData::Decoded(stream) => Some(OutputImage {
                name,
                rows: geometry.rows,
                columns: geometry.columns,
                depth: self.header.depth,
                color_model: ColorModel::Gray,
                channels: alloc::vec![Cow::Borrowed(stream.data())],
                palette: None
            }),
            ChannelData::Skipped => {
                self.ctx.warn(DecodeWarning::NotWritten { image: name });
                None
            }
        }
    }

    /// Gather the packed components, `None` if one of them was not decoded
    fn packed<'b>(
        &mut self, name: &str, geometry: ChannelGeometry, model: ColorModel,
        sources: &[(i16, Option<&'b ChannelData>)]
    ) -> Result<Option<OutputImage<'b>>, PSDDecodeErrors>
    where
        'a: 'b
    {
        let size = geometry.channel_bytes(self.header.depth)?;
        let mut channels = Vec::with_capacity(sources.len());

        for &(id, source) in sources {
            match source {
                Some(ChannelData::Decoded(stream)) => channels.push(Cow::Borrowed(stream.data())),
                Some(ChannelData::Skipped) => {
                    self.ctx.warn(DecodeWarning::NotWritten {
                        image: String::from(name)
                    });
                    return Ok(None);
                }
                None => {
                    self.ctx.warn(DecodeWarning::MissingChannel {
                        image: String::from(name),
                        id
                    });
                    channels.push(Cow::Owned(try_zeroed(size)?));
                }
            }
        }

        Ok(Some(OutputImage {
            name: String::from(name),
            rows: geometry.rows,
            columns: geometry.columns,
            depth: self.header.depth,
            color_model: model,
            channels,
            palette: self.palette(model)
        }))
    }

    /// Images of the merged composite, named after `name`
    pub fn merged_images<'b>(
        &mut self, name: &str, merged: &'b [ChannelData], merged_alpha: bool
    ) -> Result<Vec<OutputImage<'b>>, PSDDecodeErrors>
    where
        'a: 'b
    {
        let geometry = self.header.geometry();
        let kind = ImageKind::Merged {
            channels: merged.len(),
            merged_alpha
        };
        let plan = plan_image(self.mode(), kind);
        let mut images = Vec::new();
        let mut first_extra = 0;

        if let Some(model) = plan {
            if !self.split {
                let sources: Vec<_> = (0..model.components())
                    .map(|c| (c as i16, merged.get(c)))
                    .collect();

                if let Some(image) = self.packed(name, geometry, model, &sources)? {
                    images.push(image);
                }
                first_extra = model.components();
            }
        } else {
            debug!("writing {} image as split channels", self.header.mode_name());
        }

        // the first channel after the colors is the transparency
        let alpha_position = match plan {
            Some(model) if merged_alpha => Some(model.components() - usize::from(model.has_alpha())),
            _ => None
        };

        for (position, data) in merged.iter().enumerate().skip(first_extra) {
            let id = if alpha_position == Some(position) {
                -1
            } else {
                position as i16
            };
            let name = format!("{name}{}", channel_suffix(self.mode(), id, false));

            if let Some(image) = self.single(name, geometry, data) {
                images.push(image);
            }
        }
        Ok(images)
    }

    /// Images of one layer, named after the layer or its number.
    ///
    /// `channels` holds one entry per record channel, as decoded.
    pub fn layer_images<'b>(
        &mut self, record: &'b LayerRecord, channels: &'b [ChannelData]
    ) -> Result<Vec<OutputImage<'b>>, PSDDecodeErrors>
    where
        'a: 'b
    {
        let mut images = Vec::new();

        if record.skipped {
            return Ok(images);
        }
        let name = if self.numbered {
            record.numbered_name.as_str()
        } else {
            record.name.as_str()
        };
        let geometry = record.rect.geometry();

        let kind = ImageKind::Layer {
            has_transparency: record.has_transparency()
        };
        let plan = plan_image(self.mode(), kind).filter(|_| !self.split);

        // positions in the channel list taken by the packed image
        let mut packed_positions = Vec::new();

        if let Some(model) = plan {
            let base = model.components() - usize::from(model.has_alpha());

            let mut ids: Vec<ChannelId> = (0..base as u16).map(ChannelId::Color).collect();
            if model.has_alpha() {
                ids.push(ChannelId::TransparencyMask);
            }

            let sources: Vec<_> = ids
                .iter()
                .map(|&id| {
                    let position = record.index_map.get(id);
                    packed_positions.extend(position);
                    (id.raw(), position.and_then(|p| channels.get(p)))
                })
                .collect();

            if geometry.rows > 0 && geometry.columns > 0 {
                if let Some(image) = self.packed(name, geometry, model, &sources)? {
                    images.push(image);
                }
            }
        } else {
            debug!("writing layer \"{name}\" as split channels");
        }

        for (position, (descriptor, data)) in record.channels.iter().zip(channels).enumerate() {
            if packed_positions.contains(&position) {
                continue;
            }
            let geometry = record.channel_geometry(descriptor);

            if geometry.rows == 0 || geometry.columns == 0 {
                continue;
            }
            let name = format!(
                "{name}{}",
                channel_suffix(self.mode(), descriptor.raw_id, true)
            );
            if let Some(image) = self.single(name, geometry, data) {
                images.push(image);
            }
        }
        Ok(images)
    }

    /// Hand the images of one layer to `sink`, returns how many were written
    pub fn write_layer<S>(
        &mut self, record: &LayerRecord, channels: &[ChannelData], sink: &mut S
    ) -> Result<usize, S::Error>
    where
        S: ImageSink,
        S::Error: From<PSDDecodeErrors>
    {
        if !sink.wants_images() {
            return Ok(0);
        }
        let images = self.layer_images(record, channels)?;

        for image in &images {
            sink.write_image(image)?;
        }
        Ok(images.len())
    }

    /// Hand the images of the merged composite to `sink`, returns how
    /// many were written
    pub fn write_merged<S>(
        &mut self, name: &str, merged: &[ChannelData], merged_alpha: bool, sink: &mut S
    ) -> Result<usize, S::Error>
    where
        S: ImageSink,
        S::Error: From<PSDDecodeErrors>
    {
        if !sink.wants_images() {
            return Ok(0);
        }
        let images = self.merged_images(name, merged, merged_alpha)?;

        for image in &images {
            sink.write_image(image)?;
        }
        Ok(images.len())
    }

    /// Hand every image of a decoded file to `sink`, layers first.
    ///
    /// Returns the number of images written.
    pub fn write_all<S>(
        &mut self, image: &PsdImage, merged_name: &str, sink: &mut S
    ) -> Result<usize, S::Error>
    where
        S: ImageSink,
        S::Error: From<PSDDecodeErrors>
    {
        let mut written = 0;

        for layer in &image.layers {
            written += self.write_layer(&layer.record, &layer.channels, sink)?;
        }
        written += self.write_merged(merged_name, &image.merged, image.merged_alpha, sink)?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use alloc::borrow::Cow;
    use alloc::string::String;
    use alloc::vec;

    use crate::assembler::{channel_suffix, plan_image, ColorModel, ImageKind, OutputImage};
    use crate::constants::ColorModes;

    #[test]
    fn test_plan_image() {
        let layer = |t| ImageKind::Layer {
            has_transparency: t
        };
        let merged = |channels, merged_alpha| ImageKind::Merged {
            channels,
            merged_alpha
        };

        assert_eq!(plan_image(Some(ColorModes::RGB), layer(false)), Some(ColorModel::Rgb));
        assert_eq!(plan_image(Some(ColorModes::RGB48), layer(true)), Some(ColorModel::Rgba));
        assert_eq!(plan_image(Some(ColorModes::RGB), merged(4, false)), Some(ColorModel::Rgb));
        assert_eq!(plan_image(Some(ColorModes::RGB), merged(4, true)), Some(ColorModel::Rgba));
        assert_eq!(plan_image(Some(ColorModes::RGB), merged(3, true)), Some(ColorModel::Rgb));
        assert_eq!(
            plan_image(Some(ColorModes::DuoTone), merged(2, true)),
            Some(ColorModel::GrayAlpha)
        );
        assert_eq!(
            plan_image(Some(ColorModes::IndexedColor), layer(true)),
            Some(ColorModel::Indexed)
        );
        assert_eq!(plan_image(Some(ColorModes::CYMK), layer(true)), None);
        assert_eq!(plan_image(None, layer(false)), None);
    }

    #[test]
    fn test_channel_suffixes() {
        assert_eq!(channel_suffix(Some(ColorModes::RGB), -2, true), ".lmask");
        assert_eq!(channel_suffix(Some(ColorModes::RGB), -1, true), ".trans");
        assert_eq!(channel_suffix(Some(ColorModes::RGB), -1, false), ".alpha");
        assert_eq!(channel_suffix(Some(ColorModes::RGB), 1, true), ".G");
        assert_eq!(channel_suffix(Some(ColorModes::CMYK64), 3, false), ".K");
        assert_eq!(channel_suffix(Some(ColorModes::RGB), 3, false), ".3");
        assert_eq!(channel_suffix(Some(ColorModes::Grayscale), 0, false), ".0");
        assert_eq!(channel_suffix(Some(ColorModes::RGB), -5, true), ".-5");
    }

    fn image<'a>(depth: u16, model: ColorModel, channels: &[&'a [u8]]) -> OutputImage<'a> {
        OutputImage {
            name: String::from("test"),
            rows: 1,
            columns: 2,
            depth,
            color_model: model,
            channels: channels.iter().map(|c| Cow::Borrowed(*c)).collect(),
            palette: None
        }
    }

    #[test]
    fn test_interleave() {
        let rgb = image(8, ColorModel::Rgb, &[&[1, 2], &[3, 4], &[5, 6]]);
        assert_eq!(rgb.interleave(), vec![1, 3, 5, 2, 4, 6]);

        let gray_alpha = image(16, ColorModel::GrayAlpha, &[&[0, 1, 0, 2], &[0xFF, 0xFE, 0, 0]]);
        assert_eq!(gray_alpha.interleave(), vec![0, 1, 0xFF, 0xFE, 0, 2, 0, 0]);
    }

    #[test]
    fn test_expand_palette() {
        let mut palette = vec![0_u8; 768];
        palette[1] = 10;
        palette[256 + 1] = 20;
        palette[512 + 1] = 30;

        let mut indexed = image(8, ColorModel::Indexed, &[&[1, 0]]);
        indexed.palette = Some(&palette);
        assert_eq!(indexed.expand_palette().unwrap(), vec![10, 20, 30, 0, 0, 0]);

        let gray = image(8, ColorModel::Gray, &[&[1, 0]]);
        assert!(gray.expand_palette().is_none());
    }
}
