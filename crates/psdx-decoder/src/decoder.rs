/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The file level decoder
//!
//! A PSD file is read front to back
//! - header
//! - color mode data, the palette of indexed images
//! - image resources
//! - layer and mask information, holding the layer records and their pixels
//! - the merged image
//!
//! Every section after the header is prefixed with its length, which
//! lets the decoder step over anything it cannot make sense of.
use alloc::vec::Vec;

use log::{debug, info};
use zune_core::bit_depth::BitDepth;
use zune_core::bytestream::ZByteReaderTrait;
use zune_core::options::DecoderOptions;

use crate::assembler::{ImageAssembler, ImageSink};
use crate::channel::{ChannelData, ChannelDecoder, ChannelGeometry};
use crate::constants::{
    ColorModes, DEFAULT_WARNING_LIMIT, MAX_CHANNELS, MAX_DEPTH, PALETTE_LENGTH, PSD_IDENTIFIER_BE,
    PSD_MAX_DIMENSION
};
use crate::context::ParseContext;
use crate::cursor::{ByteCursor, Section};
use crate::errors::{DecodeWarning, PSDDecodeErrors};
use crate::layers::{LayerInfo, LayerRecord, LayerRecordParser};
use crate::resources::{scan_image_resources, ImageResourceBlock};
use crate::tasks::Scheduling;

/// Options that influence decoding and image assembly
#[derive(Debug, Copy, Clone)]
pub struct PsdOptions {
    decoder:        DecoderOptions,
    split_channels: bool,
    numbered_names: bool,
    warning_limit:  usize
}

impl Default for PsdOptions {
    /// Default options with the size limits raised to the PSD maximum
    fn default() -> Self {
        let limits = DecoderOptions::default()
            .set_max_width(PSD_MAX_DIMENSION)
            .set_max_height(PSD_MAX_DIMENSION);
        PsdOptions::new(limits)
    }
}

impl From<DecoderOptions> for PsdOptions {
    fn from(options: DecoderOptions) -> Self {
        PsdOptions::new(options)
    }
}

impl PsdOptions {
    pub const fn new(decoder: DecoderOptions) -> PsdOptions {
        PsdOptions {
            decoder,
            split_channels: false,
            numbered_names: false,
            warning_limit: DEFAULT_WARNING_LIMIT
        }
    }

    /// Width and height limits
    pub const fn decoder_options(&self) -> &DecoderOptions {
        &self.decoder
    }

    pub const fn split_channels(&self) -> bool {
        self.split_channels
    }

    /// Emit every channel as its own grayscale image
    pub const fn set_split_channels(mut self, yes: bool) -> Self {
        self.split_channels = yes;
        self
    }

    pub const fn numbered_names(&self) -> bool {
        self.numbered_names
    }

    /// Name layer images `layerN` instead of using the stored layer name
    pub const fn set_numbered_names(mut self, yes: bool) -> Self {
        self.numbered_names = yes;
        self
    }

    pub const fn warning_limit(&self) -> usize {
        self.warning_limit
    }

    /// Counted warnings logged per file before the rest are suppressed
    pub const fn set_warning_limit(mut self, limit: usize) -> Self {
        self.warning_limit = limit;
        self
    }
}

/// The fixed 26 byte file header
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PsdHeader {
    pub channels: u16,
    pub rows:     usize,
    pub columns:  usize,
    /// Bits per channel sample, usually 1, 8, 16 or 32
    pub depth:    u16,
    /// Color mode as stored
    pub mode:     u16
}

impl PsdHeader {
    pub fn color_mode(&self) -> Option<ColorModes> {
        ColorModes::from_int(self.mode)
    }

    pub fn mode_name(&self) -> &'static str {
        self.color_mode().map_or("???", ColorModes::name)
    }

    pub const fn geometry(&self) -> ChannelGeometry {
        ChannelGeometry::new(self.rows, self.columns)
    }

    /// Depth as a zune bit depth, `None` for depths it cannot represent
    pub const fn bit_depth(&self) -> Option<BitDepth> {
        match self.depth {
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            32 => Some(BitDepth::Float32),
            _ => None
        }
    }
}

/// The color mode data section
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColorModeData {
    pub length: u32,
    palette:    Option<Vec<u8>>
}

impl ColorModeData {
    /// Planar palette of indexed images, 256 reds then greens then blues
    pub fn palette(&self) -> Option<&[u8]> {
        self.palette.as_deref()
    }
}

/// A layer record together with its decoded channels
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedLayer {
    pub record:   LayerRecord,
    /// One entry per record channel, empty for skipped layers
    pub channels: Vec<ChannelData>
}

/// Everything decoded from a file
#[derive(Clone, Debug)]
pub struct PsdImage {
    pub header:          PsdHeader,
    pub color_mode_data: ColorModeData,
    pub resources:       Vec<ImageResourceBlock>,
    pub layers:          Vec<DecodedLayer>,
    /// Channels of the merged composite, in file order
    pub merged:          Vec<ChannelData>,
    /// The first extra merged channel is the composite's transparency
    pub merged_alpha:    bool,
    /// Recoverable problems found in file order, counted ones up to
    /// the warning limit
    pub warnings:            Vec<DecodeWarning>,
    /// Counted warnings raised past the limit and not recorded
    pub suppressed_warnings: usize
}

impl PsdImage {
    /// An assembler producing the output images of this file
    pub fn assembler(&self, options: &PsdOptions) -> ImageAssembler<'_> {
        ImageAssembler::new(self.header, &self.color_mode_data, options)
    }
}

/// What is left of a file after its images were handed to a sink,
/// everything [`PsdImage`] holds except pixel data
#[derive(Clone, Debug)]
pub struct PsdSummary {
    pub header:              PsdHeader,
    pub color_mode_data:     ColorModeData,
    pub resources:           Vec<ImageResourceBlock>,
    pub layers:              Vec<LayerRecord>,
    pub merged_alpha:        bool,
    pub warnings:            Vec<DecodeWarning>,
    /// Counted warnings past the limit while decoding or assembling
    pub suppressed_warnings: usize,
    /// Missing and unwritable channels found while assembling
    pub assembly_warnings:   Vec<DecodeWarning>,
    pub images_written:      usize
}

/// The sections in front of the layer pixel data
struct Prelude {
    header:          PsdHeader,
    color_mode_data: ColorModeData,
    resources:       Vec<ImageResourceBlock>,
    layer_info:      LayerInfo
}

/// A Photoshop PSD reader.
///
/// Walks every section of the file, decoding layer and merged
/// channels into planar byte streams.
///
/// # Example
/// ```no_run
/// use psdx_decoder::PSDDecoder;
/// use psdx_decoder::zune_core::bytestream::ZCursor;
///
/// let mut decoder = PSDDecoder::new(ZCursor::new(&[]));
/// let image = decoder.decode().unwrap();
///
/// for layer in &image.layers {
///     println!("{} channels: {}", layer.record.name, layer.channels.len());
/// }
/// ```
pub struct PSDDecoder<T>
where
    T: ZByteReaderTrait
{
    stream:  ByteCursor<T>,
    options: PsdOptions,
    header:  Option<PsdHeader>,
    ctx:     ParseContext
}

impl<T> PSDDecoder<T>
where
    T: ZByteReaderTrait
{
    /// Create a new decoder that reads a photoshop encoded file
    /// from `T`
    ///
    /// # Arguments
    /// - data: Data source, it has to implement the `ZByteReaderTrait`
    pub fn new(data: T) -> PSDDecoder<T> {
        Self::new_with_options(data, PsdOptions::default())
    }

    /// Creates a new decoder with options that influence decoding routines
    ///
    /// # Arguments
    /// - data: Data source
    /// - options: Custom options for the decoder
    pub fn new_with_options(data: T, options: PsdOptions) -> PSDDecoder<T> {
        PSDDecoder {
            stream: ByteCursor::new(data),
            options,
            header: None,
            ctx: ParseContext::new(options.warning_limit())
        }
    }

    /// Decode headers from the encoded image
    ///
    /// This confirms whether the image is a photoshop image and extracts
    /// relevant information from the image including width,height and extra information.
    pub fn decode_headers(&mut self) -> Result<(), PSDDecodeErrors> {
        if self.header.is_some() {
            return Ok(());
        }
        // Check identifier
        let magic = self.stream.read_u32_be()?;

        if magic != PSD_IDENTIFIER_BE {
            return Err(PSDDecodeErrors::WrongMagicBytes(magic));
        }

        //  file version
        let version = self.stream.read_u16_be()?;

        if version != 1 {
            return Err(PSDDecodeErrors::UnsupportedFileType(version));
        }
        // Skip 6 reserved bytes
        self.stream.seek_forward(6)?;

        // Read the number of channels (R, G, B, A, etc).
        let channels = self.stream.read_u16_be()?;
        let rows = self.stream.read_u32_be()? as usize;
        let columns = self.stream.read_u32_be()? as usize;
        let depth = self.stream.read_u16_be()?;
        let mode = self.stream.read_u16_be()?;

        if channels == 0 || usize::from(channels) > MAX_CHANNELS {
            return Err(PSDDecodeErrors::UnsupportedChannelCount(channels));
        }
        if rows == 0 || columns == 0 {
            return Err(PSDDecodeErrors::ZeroDimensions);
        }

        let limits = self.options.decoder_options();

        if columns > limits.max_width() {
            return Err(PSDDecodeErrors::LargeDimensions(limits.max_width(), columns));
        }
        if rows > limits.max_height() {
            return Err(PSDDecodeErrors::LargeDimensions(limits.max_height(), rows));
        }
        if depth > MAX_DEPTH {
            return Err(PSDDecodeErrors::UnsupportedBitDepth(depth));
        }

        let header = PsdHeader {
            channels,
            rows,
            columns,
            depth,
            mode
        };

        info!(
            "channels = {channels}, rows = {rows}, cols = {columns}, depth = {depth}, mode = {mode} ({})",
            header.mode_name()
        );

        self.header = Some(header);

        Ok(())
    }

    /// The file header, or `None` if it hasn't been decoded
    pub const fn header(&self) -> Option<&PsdHeader> {
        self.header.as_ref()
    }

    /// Get image width and height respectively or None if the
    /// headers haven't been decoded
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.header.map(|h| (h.columns, h.rows))
    }

    /// Get image bit depth or None if the headers haven't been decoded
    /// or the depth is not one zune can represent
    pub fn bit_depth(&self) -> Option<BitDepth> {
        self.header.and_then(|h| h.bit_depth())
    }

    /// Warnings raised so far
    pub fn warnings(&self) -> &[DecodeWarning] {
        self.ctx.warnings()
    }

    fn decode_color_mode_data(
        &mut self, header: &PsdHeader
    ) -> Result<ColorModeData, PSDDecodeErrors> {
        let section = Section::read(&mut self.stream, "color mode data")?;
        let mut data = ColorModeData {
            length:  section.length as u32,
            palette: None
        };

        if header.color_mode() == Some(ColorModes::IndexedColor)
            && section.length == PALETTE_LENGTH as u64
        {
            let mut palette = alloc::vec![0; PALETTE_LENGTH];
            self.stream.read_exact(&mut palette)?;
            data.palette = Some(palette);
        } else if !section.is_empty() {
            debug!("  ...skipped color mode data ({} bytes)", section.length);
        }
        section.skip(&mut self.stream)?;

        Ok(data)
    }

    /// Decode the whole file, layers and merged image.
    ///
    /// Recoverable problems don't stop decoding, they are returned in
    /// [`PsdImage::warnings`].
    ///
    /// Every layer's pixels are kept, use [`decode_into`](Self::decode_into)
    /// to write images without holding the whole file decoded.
    pub fn decode(&mut self) -> Result<PsdImage, PSDDecodeErrors> {
        self.decode_scheduled(Scheduling::Sequential)
    }

    /// Decode the file, handing every image to `sink` as soon as its
    /// channels are decoded.
    ///
    /// A layer's pixels are dropped once its images are written, the
    /// merged image is written last.
    pub fn decode_into<S>(&mut self, merged_name: &str, sink: &mut S) -> Result<PsdSummary, S::Error>
    where
        S: ImageSink,
        S::Error: From<PSDDecodeErrors>
    {
        self.decode_into_scheduled(Scheduling::Sequential, merged_name, sink)
    }

    fn decode_prelude(&mut self) -> Result<Prelude, PSDDecodeErrors> {
        self.decode_headers()?;

        let header = self.header.ok_or(PSDDecodeErrors::Generic("Header not decoded"))?;

        let color_mode_data = self.decode_color_mode_data(&header)?;
        let resources = scan_image_resources(&mut self.stream, &mut self.ctx)?;

        let limits = self.options.decoder_options();
        let parser = LayerRecordParser::new(
            usize::from(header.channels),
            header.color_mode(),
            limits.max_width(),
            limits.max_height()
        );
        let layer_info = parser.read_records(&mut self.stream, &mut self.ctx)?;

        Ok(Prelude {
            header,
            color_mode_data,
            resources,
            layer_info
        })
    }

    fn decode_merged(&mut self, header: &PsdHeader) -> Result<Vec<ChannelData>, PSDDecodeErrors> {
        debug!("merged channels:");

        let merged = ChannelDecoder::merged(
            usize::from(header.channels),
            header.geometry(),
            header.depth
        )
        .decode(&mut self.stream, &mut self.ctx)?;

        Ok(merged.channels)
    }

    pub(crate) fn decode_scheduled(
        &mut self, scheduling: Scheduling<'_>
    ) -> Result<PsdImage, PSDDecodeErrors> {
        let Prelude {
            header,
            color_mode_data,
            resources,
            layer_info
        } = self.decode_prelude()?;

        let mut decoded = Vec::with_capacity(layer_info.records.len());
        {
            let tasks = layer_info.tasks();
            scheduling.run(
                &tasks,
                &mut self.stream,
                &mut self.ctx,
                header.depth,
                |_, channels| {
                    decoded.push(channels);
                    Ok::<(), PSDDecodeErrors>(())
                }
            )?;
        }
        layer_info.finish(&mut self.stream, &mut self.ctx)?;

        let layers = layer_info
            .into_records()
            .into_iter()
            .zip(decoded)
            .map(|(record, channels)| DecodedLayer { record, channels })
            .collect();

        let merged = self.decode_merged(&header)?;

        Ok(PsdImage {
            header,
            color_mode_data,
            resources,
            layers,
            merged,
            merged_alpha: self.ctx.merged_alpha(),
            warnings: self.ctx.take_warnings(),
            suppressed_warnings: self.ctx.suppressed_warnings()
        })
    }

    pub(crate) fn decode_into_scheduled<S>(
        &mut self, scheduling: Scheduling<'_>, merged_name: &str, sink: &mut S
    ) -> Result<PsdSummary, S::Error>
    where
        S: ImageSink,
        S::Error: From<PSDDecodeErrors>
    {
        let Prelude {
            header,
            color_mode_data,
            resources,
            layer_info
        } = self.decode_prelude()?;

        let mut assembler = ImageAssembler::new(header, &color_mode_data, &self.options);
        let mut written = 0;
        {
            let tasks = layer_info.tasks();
            scheduling.run(
                &tasks,
                &mut self.stream,
                &mut self.ctx,
                header.depth,
                |task, channels| {
                    written += assembler.write_layer(task.record, &channels, sink)?;
                    Ok::<(), S::Error>(())
                }
            )?;
        }
        layer_info.finish(&mut self.stream, &mut self.ctx)?;

        let merged = self.decode_merged(&header)?;
        let merged_alpha = self.ctx.merged_alpha();

        written += assembler.write_merged(merged_name, &merged, merged_alpha, sink)?;
        let assembly_warnings = assembler.take_warnings();
        let suppressed_warnings =
            self.ctx.suppressed_warnings() + assembler.suppressed_warnings();

        Ok(PsdSummary {
            header,
            color_mode_data,
            resources,
            layers: layer_info.into_records(),
            merged_alpha,
            warnings: self.ctx.take_warnings(),
            suppressed_warnings,
            assembly_warnings,
            images_written: written
        })
    }
}

/// Decode a file held in memory, decoding layers on scoped threads
///
/// The result is the same as [`PSDDecoder::decode`], warnings included.
#[cfg(feature = "threads")]
pub fn decode_threaded(data: &[u8], options: PsdOptions) -> Result<PsdImage, PSDDecodeErrors> {
    use zune_core::bytestream::ZCursor;

    let mut decoder = PSDDecoder::new_with_options(ZCursor::new(data), options);
    decoder.decode_scheduled(Scheduling::Threaded(data))
}

/// Decode a file held in memory into `sink`, decoding layers on scoped
/// threads.
///
/// Images reach the sink in the same order as [`PSDDecoder::decode_into`],
/// only a few decoded layers per thread are held at once.
#[cfg(feature = "threads")]
pub fn decode_threaded_into<S>(
    data: &[u8], options: PsdOptions, merged_name: &str, sink: &mut S
) -> Result<PsdSummary, S::Error>
where
    S: ImageSink,
    S::Error: From<PSDDecodeErrors>
{
    use zune_core::bytestream::ZCursor;

    let mut decoder = PSDDecoder::new_with_options(ZCursor::new(data), options);
    decoder.decode_into_scheduled(Scheduling::Threaded(data), merged_name, sink)
}
