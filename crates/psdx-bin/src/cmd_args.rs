/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use clap::{value_parser, Arg, ArgAction, Command};

#[rustfmt::skip]
pub fn create_cmd_args() -> Command {
    Command::new("psdx")
        .about("Walk Photoshop PSD files and extract their layers")
        .arg(Arg::new("in")
            .help("PSD files to read")
            .value_name("FILE")
            .action(ArgAction::Append)
            .value_parser(value_parser!(std::path::PathBuf))
            .required(true))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display debug information and higher"))
        .arg(Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Only display errors"))
        .arg(Arg::new("trace")
            .long("trace")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display very verbose information, every channel and row table"))
        .arg(Arg::new("writepng")
            .short('w')
            .long("writepng")
            .action(ArgAction::SetTrue)
            .help_heading("OUTPUT")
            .help("Write layers and the merged image as PNG files")
            .long_help("Write every layer and the merged image as PNG files.\nFiles go into a directory named after the input, <stem>_png, unless --pngdir is given"))
        .arg(Arg::new("pngdir")
            .short('d')
            .long("pngdir")
            .value_name("DIR")
            .value_parser(value_parser!(std::path::PathBuf))
            .help_heading("OUTPUT")
            .help("Directory to write PNG files to, implies --writepng"))
        .arg(Arg::new("makedirs")
            .short('m')
            .long("makedirs")
            .action(ArgAction::SetTrue)
            .help_heading("OUTPUT")
            .help("Create subdirectories for layer names containing '/'")
            .long_help("Create subdirectories for layer names containing '/'.\nWithout this flag '/' is replaced by '_'"))
        .arg(Arg::new("list")
            .short('l')
            .long("list")
            .action(ArgAction::SetTrue)
            .help_heading("OUTPUT")
            .help("Write an asset list, list.txt, to the output directory"))
        .arg(Arg::new("numbered")
            .short('n')
            .long("numbered")
            .action(ArgAction::SetTrue)
            .help_heading("OUTPUT")
            .help("Name layer files layerN instead of using the layer name"))
        .arg(Arg::new("split")
            .short('s')
            .long("split")
            .action(ArgAction::SetTrue)
            .help_heading("OUTPUT")
            .help("Write every channel as its own grayscale file"))
        .arg(Arg::new("max-width")
            .long("max-width")
            .help_heading("ADVANCED")
            .help("Maximum width of the document and its layers")
            .long_help("Maximum width of the document and its layers.\nThe default is the largest width Photoshop saves in a PSD file")
            .value_parser(value_parser!(usize))
            .default_value("30000"))
        .arg(Arg::new("max-height")
            .long("max-height")
            .help_heading("ADVANCED")
            .help("Maximum height of the document and its layers")
            .value_parser(value_parser!(usize))
            .default_value("30000"))
}
