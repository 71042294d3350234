/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::path::{Path, PathBuf};

use clap::ArgMatches;
use log::{debug, error, info, trace};
use psdx_decoder::assembler::{ImageSink, OutputImage};
use psdx_decoder::{decode_threaded_into, PsdSummary};

use crate::cmd_parsers::global_options::CmdOptions;
use crate::errors::CliErrors;
use crate::file_io::{default_output_dir, merged_name, read_input, write_list_file};
use crate::png_sink::PngSink;

/// Process every input file, returns the number of files that failed
pub(crate) fn run_workflow_from_cmd(args: &ArgMatches, cmd_opts: &CmdOptions) -> usize {
    info!("Creating workflows from input");

    let mut failed = 0;

    for in_file in args.get_many::<PathBuf>("in").into_iter().flatten() {
        if let Err(e) = process_file(in_file, cmd_opts) {
            error!("Could not process {:?}, reason {:?}", in_file, e);
            failed += 1;
        }
    }
    failed
}

/// Sink for runs that only report on the file
struct NoImages;

impl ImageSink for NoImages {
    type Error = CliErrors;

    fn write_image(&mut self, _: &OutputImage<'_>) -> Result<(), CliErrors> {
        Ok(())
    }

    fn wants_images(&self) -> bool {
        false
    }
}

fn process_file(in_file: &Path, cmd_opts: &CmdOptions) -> Result<(), CliErrors> {
    info!("Reading {:?}", in_file);

    let data = read_input(in_file)?;
    let psd_options = cmd_opts.psd_options();

    let out_dir = match &cmd_opts.png_dir {
        Some(dir) => dir.clone(),
        None => default_output_dir(in_file)
    };
    if cmd_opts.writes_files() && !out_dir.exists() {
        debug!("Creating output directory {:?}", out_dir);
        std::fs::create_dir_all(&out_dir).map_err(|e| CliErrors::OutputPath(out_dir.clone(), e))?;
    }

    // images are written while later layers are still decoding
    let summary = if cmd_opts.write_png {
        let mut sink = PngSink::new(&out_dir, cmd_opts.make_dirs);
        let summary = decode_threaded_into(&data, psd_options, &merged_name(in_file), &mut sink)?;

        info!("Wrote {} images to {:?}", summary.images_written, out_dir);
        summary
    } else {
        decode_threaded_into(&data, psd_options, &merged_name(in_file), &mut NoImages)?
    };

    log_summary(&summary);

    if cmd_opts.write_list {
        let path = write_list_file(&out_dir, in_file, &summary.layers)?;
        info!("Wrote asset list {:?}", path);
    }
    Ok(())
}

fn log_summary(summary: &PsdSummary) {
    let header = &summary.header;

    info!(
        "{} mode, {} channels, {}x{}, depth {}",
        header.mode_name(),
        header.channels,
        header.columns,
        header.rows,
        header.depth
    );
    debug!(
        "{} image resources, {} bytes of color mode data",
        summary.resources.len(),
        summary.color_mode_data.length
    );
    for resource in &summary.resources {
        trace!("Resource {} ({} bytes)", resource.id, resource.length);
    }
    info!("{} layers", summary.layers.len());

    for record in &summary.layers {
        debug!(
            "Layer {} {:?}: {},{} {}x{}, {} channels{}",
            record.index,
            record.name,
            record.rect.left,
            record.rect.top,
            record.rect.width(),
            record.rect.height(),
            record.channels.len(),
            if record.skipped { ", skipped" } else { "" }
        );
    }
    // each warning was logged by the decoder as it was raised
    let warnings = summary.warnings.len() + summary.assembly_warnings.len();

    if warnings > 0 || summary.suppressed_warnings > 0 {
        info!(
            "{warnings} warnings, {} more suppressed",
            summary.suppressed_warnings
        );
    }
}
