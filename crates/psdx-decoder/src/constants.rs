/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

#![allow(clippy::upper_case_acronyms)]

/// `8BPS`
pub const PSD_IDENTIFIER_BE: u32 = 0x3842_5053;

/// `8BIM`, signature of image resources and blend mode records
pub const RESOURCE_SIGNATURE: [u8; 4] = *b"8BIM";

/// `MeSa`, written by ImageReady for its own resources
pub const IMAGEREADY_SIGNATURE: [u8; 4] = *b"MeSa";

/// Highest channel count accepted in the header and in a layer record
pub const MAX_CHANNELS: usize = 64;

/// Highest bit depth accepted in the header
pub const MAX_DEPTH: u16 = 32;

/// Size of a palette stored in the color mode section of indexed images
pub const PALETTE_LENGTH: usize = 768;

/// Counted warnings logged per file before further ones are suppressed
pub const DEFAULT_WARNING_LIMIT: usize = 10;

/// Largest width and height Photoshop writes to a PSD file
pub const PSD_MAX_DIMENSION: usize = 30000;

/// Output bytes a single stored byte can turn into, a two byte
/// PackBits run expands to 128
pub const MAX_RLE_EXPANSION: u64 = 64;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ColorModes {
    Bitmap = 0,
    Grayscale = 1,
    IndexedColor = 2,
    RGB = 3,
    CYMK = 4,
    MultiChannel = 7,
    DuoTone = 8,
    LabColor = 9,
    Gray16 = 10,
    RGB48 = 11,
    Lab48 = 12,
    CMYK64 = 13,
    DeepMultichannel = 14,
    DuoTone16 = 15
}

impl ColorModes {
    pub fn from_int(int: u16) -> Option<ColorModes> {
        use crate::constants::ColorModes::{
            Bitmap, CMYK64, DeepMultichannel, DuoTone, DuoTone16, Gray16, Grayscale,
            IndexedColor, Lab48, LabColor, MultiChannel, CYMK, RGB, RGB48
        };

        match int {
            0 => Some(Bitmap),
            1 => Some(Grayscale),
            2 => Some(IndexedColor),
            3 => Some(RGB),
            4 => Some(CYMK),
            7 => Some(MultiChannel),
            8 => Some(DuoTone),
            9 => Some(LabColor),
            10 => Some(Gray16),
            11 => Some(RGB48),
            12 => Some(Lab48),
            13 => Some(CMYK64),
            14 => Some(DeepMultichannel),
            15 => Some(DuoTone16),
            _ => None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ColorModes::Bitmap => "Bitmap",
            ColorModes::Grayscale => "GrayScale",
            ColorModes::IndexedColor => "IndexedColor",
            ColorModes::RGB => "RGBColor",
            ColorModes::CYMK => "CMYKColor",
            ColorModes::MultiChannel => "Multichannel",
            ColorModes::DuoTone => "Duotone",
            ColorModes::LabColor => "LabColor",
            ColorModes::Gray16 => "Gray16",
            ColorModes::RGB48 => "RGB48",
            ColorModes::Lab48 => "Lab48",
            ColorModes::CMYK64 => "CMYK64",
            ColorModes::DeepMultichannel => "DeepMultichannel",
            ColorModes::DuoTone16 => "Duotone16"
        }
    }

    /// Single letter names of the leading color channels, used to
    /// suffix files holding a single channel.
    ///
    /// Modes without named channels return an empty string.
    pub const fn channel_suffixes(self) -> &'static str {
        match self {
            ColorModes::RGB | ColorModes::RGB48 => "RGB",
            ColorModes::CYMK | ColorModes::CMYK64 => "CMYK",
            ColorModes::LabColor | ColorModes::Lab48 => "Lab",
            _ => ""
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompressionMethod {
    NoCompression = 0,
    RLE = 1
}

impl CompressionMethod {
    pub fn from_int(int: u16) -> Option<CompressionMethod> {
        match int {
            0 => Some(Self::NoCompression),
            1 => Some(Self::RLE),
            _ => None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::NoCompression => "raw",
            Self::RLE => "RLE"
        }
    }
}

/// Known image resource ids and what they hold.
static RESOURCE_DESCRIPTIONS: &[(u16, &str)] = &[
    (1000, "PS2.0 mode data"),
    (1001, "Macintosh print record"),
    (1003, "PS2.0 indexed color table"),
    (1005, "ResolutionInfo"),
    (1006, "Names of the alpha channels"),
    (1007, "DisplayInfo"),
    (1008, "Caption"),
    (1009, "Border information"),
    (1010, "Background color"),
    (1011, "Print flags"),
    (1012, "Grayscale/multichannel halftoning info"),
    (1013, "Color halftoning info"),
    (1014, "Duotone halftoning info"),
    (1015, "Grayscale/multichannel transfer function"),
    (1016, "Color transfer functions"),
    (1017, "Duotone transfer functions"),
    (1018, "Duotone image info"),
    (1019, "B&W values for the dot range"),
    (1021, "EPS options"),
    (1022, "Quick Mask info"),
    (1024, "Layer state info"),
    (1025, "Working path"),
    (1026, "Layers group info"),
    (1028, "IPTC-NAA record"),
    (1029, "Image mode for raw format files"),
    (1030, "JPEG quality"),
    (1032, "Grid and guides info"),
    (1033, "Thumbnail resource (PS 4.0)"),
    (1034, "Copyright flag"),
    (1035, "URL"),
    (1036, "Thumbnail resource"),
    (1037, "Global Angle"),
    (1038, "Color samplers resource"),
    (1039, "ICC Profile"),
    (1040, "Watermark"),
    (1041, "ICC Untagged"),
    (1042, "Effects visible"),
    (1043, "Spot Halftone"),
    (1044, "Document specific IDs"),
    (1045, "Unicode Alpha Names"),
    (1046, "Indexed Color Table Count"),
    (1047, "Transparent Index"),
    (1049, "Global Altitude"),
    (1050, "Slices"),
    (1051, "Workflow URL"),
    (1052, "Jump To XPEP"),
    (1053, "Alpha Identifiers"),
    (1054, "URL List"),
    (1057, "Version Info"),
    (1058, "EXIF data 1"),
    (1059, "EXIF data 3"),
    (1060, "XMP metadata"),
    (1061, "Caption digest"),
    (1062, "Print scale"),
    (1064, "Pixel Aspect Ratio"),
    (1065, "Layer Comps"),
    (1066, "Alternate Duotone Colors"),
    (1067, "Alternate Spot Colors"),
    (1069, "Layer Selection IDs"),
    (1070, "HDR Toning information"),
    (1071, "Print info"),
    (1072, "Layer Group(s) Enabled ID"),
    (1073, "Color samplers resource (CS3)"),
    (1074, "Measurement Scale"),
    (1075, "Timeline Information"),
    (1076, "Sheet Disclosure"),
    (1077, "DisplayInfo (CS3)"),
    (1078, "Onion Skins"),
    (1080, "Count Information"),
    (1082, "Print Information"),
    (1083, "Print Style"),
    (1084, "Macintosh NSPrintInfo"),
    (1085, "Windows DEVMODE"),
    (1086, "Auto Save File Path"),
    (1087, "Auto Save Format"),
    (1088, "Path Selection State"),
    (2999, "Name of clipping path"),
    (3000, "Origin Path Info"),
    (7000, "Image Ready variables"),
    (7001, "Image Ready data sets"),
    (8000, "Lightroom workflow"),
    (10000, "Print flags info")
];

/// Return a description of an image resource id, if it is a known one.
///
/// Ids reserved for saved paths resolve to `"path"` without looking
/// at their contents.
pub fn describe_resource(id: u16) -> Option<&'static str> {
    if (2000..2999).contains(&id) {
        return Some("path");
    }
    RESOURCE_DESCRIPTIONS
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, desc)| *desc)
}

#[cfg(test)]
mod tests {
    use crate::constants::{describe_resource, ColorModes, CompressionMethod};

    #[test]
    fn test_color_mode_roundtrip() {
        for mode in 0..16_u16 {
            if let Some(color) = ColorModes::from_int(mode) {
                assert_eq!(color as u16, mode);
            }
        }
        assert!(ColorModes::from_int(5).is_none());
        assert!(ColorModes::from_int(6).is_none());
        assert!(ColorModes::from_int(16).is_none());
    }

    #[test]
    fn test_channel_suffixes() {
        assert_eq!(ColorModes::RGB.channel_suffixes(), "RGB");
        assert_eq!(ColorModes::CMYK64.channel_suffixes(), "CMYK");
        assert_eq!(ColorModes::Grayscale.channel_suffixes(), "");
    }

    #[test]
    fn test_resource_descriptions() {
        assert_eq!(describe_resource(1005), Some("ResolutionInfo"));
        assert_eq!(describe_resource(2000), Some("path"));
        assert_eq!(describe_resource(2998), Some("path"));
        assert_eq!(describe_resource(2999), Some("Name of clipping path"));
        assert_eq!(describe_resource(4), None);
    }

    #[test]
    fn test_compression_tags() {
        assert_eq!(CompressionMethod::from_int(0), Some(CompressionMethod::NoCompression));
        assert_eq!(CompressionMethod::from_int(1), Some(CompressionMethod::RLE));
        assert_eq!(CompressionMethod::from_int(2), None);
    }
}
