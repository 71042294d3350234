/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::path::PathBuf;

use clap::ArgMatches;
use log::{info, Level};
use psdx_decoder::zune_core::options::DecoderOptions;
use psdx_decoder::PsdOptions;

#[derive(Debug, Clone)]
pub struct CmdOptions {
    pub write_png:  bool,
    pub png_dir:    Option<PathBuf>,
    pub make_dirs:  bool,
    pub write_list: bool,
    pub numbered:   bool,
    pub split:      bool,
    pub max_width:  usize,
    pub max_height: usize
}

impl CmdOptions {
    pub fn new() -> CmdOptions {
        CmdOptions {
            write_png:  false,
            png_dir:    None,
            make_dirs:  false,
            write_list: false,
            numbered:   false,
            split:      false,
            max_width:  0,
            max_height: 0
        }
    }

    /// Decoder options for every file
    pub fn psd_options(&self) -> PsdOptions {
        let limits = DecoderOptions::new_cmd()
            .set_max_width(self.max_width)
            .set_max_height(self.max_height);

        PsdOptions::new(limits)
            .set_split_channels(self.split)
            .set_numbered_names(self.numbered)
    }

    /// Whether anything is written to an output directory
    pub fn writes_files(&self) -> bool {
        self.write_png || self.write_list
    }
}

pub fn parse_options(options: &ArgMatches) -> CmdOptions {
    let mut cmd_options = CmdOptions::new();

    cmd_options.png_dir = options.get_one::<PathBuf>("pngdir").cloned();
    cmd_options.write_png = options.get_flag("writepng") || cmd_options.png_dir.is_some();
    cmd_options.make_dirs = options.get_flag("makedirs");
    cmd_options.write_list = options.get_flag("list");
    cmd_options.numbered = options.get_flag("numbered");
    cmd_options.split = options.get_flag("split");

    if let Some(width) = options.get_one::<usize>("max-width") {
        cmd_options.max_width = *width;
    }
    if let Some(height) = options.get_one::<usize>("max-height") {
        cmd_options.max_height = *height;
    }

    if cmd_options.write_png {
        info!("Writing PNG files");
    }
    if cmd_options.split {
        info!("Splitting channels into separate files");
    }
    cmd_options
}

/// Pick the log level from the command line flags
pub fn log_level(options: &ArgMatches) -> Level {
    if options.get_flag("quiet") {
        Level::Error
    } else if options.get_flag("trace") {
        Level::Trace
    } else if options.get_flag("verbose") {
        Level::Debug
    } else {
        Level::Info
    }
}

/// Set up logging options
pub fn setup_logger(options: &ArgMatches) {
    let log_level = log_level(options);

    if let Err(e) = simple_logger::init_with_level(log_level) {
        eprintln!("Could not initialize logger: {e}");
    }

    info!("Initialized logger");
    info!("Log level :{}", log_level);
}
