/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Per layer pixel decoding
//!
//! Once the layer records are known every layer's pixel data has a
//! fixed window in the file, so layers can be decoded in any order
//! and, with the `threads` feature, at the same time.
use alloc::vec::Vec;

use zune_core::bytestream::ZByteReaderTrait;

use crate::channel::ChannelData;
use crate::context::ParseContext;
use crate::cursor::ByteCursor;
use crate::errors::PSDDecodeErrors;
use crate::layers::LayerRecord;

/// Decoding of one layer's pixel data
#[derive(Copy, Clone, Debug)]
pub struct LayerTask<'a> {
    pub index:  usize,
    /// Offset of the layer's first channel
    pub start:  u64,
    pub record: &'a LayerRecord
}

impl<'a> LayerTask<'a> {
    pub fn run<T: ZByteReaderTrait>(
        &self, cursor: &mut ByteCursor<T>, ctx: &mut ParseContext, depth: u16
    ) -> Result<Vec<ChannelData>, PSDDecodeErrors> {
        cursor.seek_absolute(self.start)?;
        self.record.decode_channels(cursor, ctx, depth)
    }
}

/// How layer tasks are executed
#[derive(Copy, Clone, Debug)]
pub(crate) enum Scheduling<'a> {
    /// One after another on the decoder's own cursor
    Sequential,
    /// On scoped worker threads, each reading its own cursor over the bytes
    #[cfg_attr(not(feature = "threads"), allow(dead_code))]
    Threaded(&'a [u8])
}

impl<'a> Scheduling<'a> {
    /// Run every task, handing each layer's channels to `deliver` in
    /// task order
    pub(crate) fn run<'r, T, E, F>(
        self, tasks: &[LayerTask<'r>], cursor: &mut ByteCursor<T>, ctx: &mut ParseContext,
        depth: u16, deliver: F
    ) -> Result<(), E>
    where
        T: ZByteReaderTrait,
        E: From<PSDDecodeErrors>,
        F: FnMut(&LayerTask<'r>, Vec<ChannelData>) -> Result<(), E>
    {
        match self {
            #[cfg(feature = "threads")]
            Scheduling::Threaded(data) if tasks.len() > 1 => {
                run_threaded(tasks, data, ctx, depth, deliver)
            }
            _ => run_sequential(tasks, cursor, ctx, depth, deliver)
        }
    }
}

/// Run every task on `cursor`, passing each result to `deliver` before
/// the next task starts
pub fn run_sequential<'r, T, E, F>(
    tasks: &[LayerTask<'r>], cursor: &mut ByteCursor<T>, ctx: &mut ParseContext, depth: u16,
    mut deliver: F
) -> Result<(), E>
where
    T: ZByteReaderTrait,
    E: From<PSDDecodeErrors>,
    F: FnMut(&LayerTask<'r>, Vec<ChannelData>) -> Result<(), E>
{
    for task in tasks {
        let channels = task.run(cursor, ctx, depth)?;
        deliver(task, channels)?;
    }
    Ok(())
}

#[cfg(feature = "threads")]
type LayerOutcome = (ParseContext, Result<Vec<ChannelData>, PSDDecodeErrors>);

/// Run the tasks on scoped threads, each reading `data` through its own cursor.
///
/// Worker `w` of `n` decodes tasks `w`, `w + n`, ... and hands each
/// result over a channel holding at most one layer, so no more than
/// two layers per worker are alive at once. Results are received and
/// delivered in task order, worker warnings are absorbed into `ctx`
/// in that order too, giving the same output as [`run_sequential`].
///
/// The first error in task order stops delivery, workers notice the
/// closed channel and stop after their current layer.
#[cfg(feature = "threads")]
pub fn run_threaded<'r, E, F>(
    tasks: &[LayerTask<'r>], data: &[u8], ctx: &mut ParseContext, depth: u16, mut deliver: F
) -> Result<(), E>
where
    E: From<PSDDecodeErrors>,
    F: FnMut(&LayerTask<'r>, Vec<ChannelData>) -> Result<(), E>
{
    use std::sync::mpsc::{sync_channel, Receiver};

    use log::trace;
    use zune_core::bytestream::ZCursor;

    let workers = std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1)
        .min(tasks.len())
        .max(1);

    trace!("Decoding {} layers on {} threads", tasks.len(), workers);

    std::thread::scope(|s| {
        let mut handles = Vec::with_capacity(workers);
        let mut receivers: Vec<Receiver<LayerOutcome>> = Vec::with_capacity(workers);

        for worker in 0..workers {
            let (sender, receiver) = sync_channel(1);
            let template = ctx.worker();

            handles.push(s.spawn(move || {
                let mut cursor = ByteCursor::new(ZCursor::new(data));

                for task in tasks.iter().skip(worker).step_by(workers) {
                    let mut local = template.clone();
                    let result = task.run(&mut cursor, &mut local, depth);
                    let failed = result.is_err();

                    if sender.send((local, result)).is_err() || failed {
                        break;
                    }
                }
            }));
            receivers.push(receiver);
        }

        let outcome = deliver_in_order(tasks, &receivers, ctx, &mut deliver);
        // unblocks workers still waiting to send
        drop(receivers);

        let mut panicked = false;
        for handle in handles {
            panicked |= handle.join().is_err();
        }
        match outcome {
            Ok(()) if panicked => {
                Err(PSDDecodeErrors::Generic("layer decoding thread panicked").into())
            }
            outcome => outcome
        }
    })
}

#[cfg(feature = "threads")]
fn deliver_in_order<'r, E, F>(
    tasks: &[LayerTask<'r>], receivers: &[std::sync::mpsc::Receiver<LayerOutcome>],
    ctx: &mut ParseContext, deliver: &mut F
) -> Result<(), E>
where
    E: From<PSDDecodeErrors>,
    F: FnMut(&LayerTask<'r>, Vec<ChannelData>) -> Result<(), E>
{
    for (position, task) in tasks.iter().enumerate() {
        let (worker, result) = receivers[position % receivers.len()]
            .recv()
            .map_err(|_| PSDDecodeErrors::Generic("layer decoding thread panicked"))?;

        ctx.absorb(worker);
        deliver(task, result?)?;
    }
    Ok(())
}
