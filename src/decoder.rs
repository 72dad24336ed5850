//! The single decoder thread (spec §4.F, §5). One instance is spawned per
//! [`Playlist`](crate::playlist::Playlist) and runs until the playlist is
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use crate::buffer::{buffer_ref, Buffer, QueueItem};
use crate::codec::DecodedFrame;
use crate::file::File;
use crate::filter_graph::{FilterGraph, GroupTarget};
use crate::format::AudioFormat;
use crate::playlist::{ItemId, PlaylistShared};

enum DecodeStep {
    Frame(DecodedFrame, bool),
    Residual(Vec<DecodedFrame>),
    Eof,
    Aborted,
}

/// One attempt to make progress on `file`: apply any pending seek, read
/// (or flush-residual) one frame. Never blocks longer than the underlying
/// codec read itself.
fn decode_step(file: &File) -> DecodeStep {
    if file.is_aborted() {
        return DecodeStep::Aborted;
    }

    let mut flushed_for_seek = false;
    if let Some(req) = file.take_pending_seek() {
        match file.apply_seek(req) {
            Ok(()) => flushed_for_seek = req.flush,
            Err(err) => {
                tracing::warn!(error = %err, "seek failed, abandoning item");
                return DecodeStep::Eof;
            }
        }
    }

    if file.is_eof() {
        let residual = file.flush_residual();
        return if residual.is_empty() {
            DecodeStep::Eof
        } else {
            DecodeStep::Residual(residual)
        };
    }

    match file.next_frame() {
        Ok(Some(frame)) => DecodeStep::Frame(frame, flushed_for_seek),
        Ok(None) => {
            file.set_eof(true);
            let residual = file.flush_residual();
            if residual.is_empty() {
                DecodeStep::Eof
            } else {
                DecodeStep::Residual(residual)
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "decode error, abandoning item");
            DecodeStep::Eof
        }
    }
}

/// Advances `file.decode_clock` after one produced frame (spec §4.F "pts
/// gap"): snaps to the packet pts when present, otherwise advances by the
/// produced buffer's duration.
fn advance_decode_clock(file: &File, frame: &DecodedFrame, output_frames: usize, output_rate: u32) {
    match frame.pts {
        Some(pts) if frame.sample_rate > 0 => {
            file.set_decode_clock(pts as f64 / frame.sample_rate as f64);
        }
        _ => {
            let produced_seconds = output_frames as f64 / output_rate.max(1) as f64;
            file.set_decode_clock(file.decode_clock() + produced_seconds);
        }
    }
}

/// Runs one decoded frame through the filter graph and delivers the
/// per-group output to every sink in that group (spec §4.F "for each
/// group: drain buffersink -> wrap as Buffer -> enqueue to each sink").
fn deliver_frame(
    shared: &PlaylistShared,
    graph: &mut FilterGraph,
    decode_head: ItemId,
    file: &File,
    frame: &DecodedFrame,
    combined_gain: f64,
) {
    let input_format = AudioFormat::new(
        frame.sample_rate,
        frame.channel_layout.clone(),
        crate::format::SampleFormat::F64,
        true,
    );

    let mut state = shared.state.lock().unwrap();
    let targets: Vec<GroupTarget> = state
        .sink_map
        .groups()
        .iter()
        .map(|g| GroupTarget {
            gain: g.example.gain(),
            format: g.output_format(&input_format),
        })
        .collect();

    let outputs = graph.process(frame, combined_gain, &targets);

    for (group, output) in state.sink_map.groups().iter().zip(outputs.iter()) {
        let buf = Buffer::new_frame(
            Arc::from(output.bytes.clone()),
            output.format.clone(),
            output.frame_count,
            frame.pts.unwrap_or(0),
            file.decode_clock(),
            Some(decode_head),
        );
        for sink in group.all() {
            sink.enqueue(QueueItem::Buffer(buffer_ref(&buf)));
        }
    }
    drop(state);

    // Advanced once per input frame, independent of how many (differently
    // resampled) group outputs it produced.
    advance_decode_clock(file, frame, frame.frame_count(), frame.sample_rate);
}

fn full_sinks_block_progress(state: &crate::playlist::PlaylistState) -> bool {
    if state.sink_map.is_empty() {
        return false;
    }
    let sinks = state.sink_map.all_sinks();
    match state.fill_mode {
        crate::playlist::FillMode::AnySinkFull => sinks.iter().any(|s| s.is_full()),
        crate::playlist::FillMode::EverySinkFull => sinks.iter().all(|s| s.is_full()),
    }
}

/// The decoder thread body (spec §4.F pseudocode, §5 "Threads").
pub(crate) fn run(shared: Arc<PlaylistShared>) {
    let mut graph = FilterGraph::new();

    loop {
        let mut state = shared.state.lock().unwrap();
        if state.quit {
            return;
        }

        let decode_head = match state.decode_head {
            Some(id) => id,
            None => {
                if !state.sent_end_of_q {
                    for sink in state.sink_map.all_sinks() {
                        sink.enqueue(QueueItem::EndOfPlaylist);
                    }
                    state.sent_end_of_q = true;
                    tracing::debug!("end of playlist sentinel emitted");
                }
                let _ = shared.decode_head_cond.wait(state).unwrap();
                continue;
            }
        };
        state.sent_end_of_q = false;

        if state.rebuild_graph {
            state.rebuild_graph = false;
            graph.force_rebuild();
        }

        let file_has_flush_seek = state
            .items
            .get(&decode_head)
            .map(|n| n.file.has_pending_flush_seek())
            .unwrap_or(false);

        if state.paused || (full_sinks_block_progress(&state) && !file_has_flush_seek) {
            drop(state);
            let (lock, cvar) = &*shared.drain;
            let drain_guard = lock.lock().unwrap();
            // The 50ms timeout is a safety net for `Playlist::drop`'s `quit`
            // flag and for state changes that don't route through a sink's
            // drain signal (e.g. `pause`); a draining sink now wakes this
            // wait directly via `Sink::set_drain_target`.
            let _ = cvar.wait_timeout(drain_guard, Duration::from_millis(50)).unwrap();
            continue;
        }

        let node = &state.items[&decode_head];
        let combined_gain = state.playlist_gain * node.gain * node.peak.min(1.0);
        let file = node.file.clone();
        drop(state);

        match decode_step(&file) {
            DecodeStep::Frame(frame, flushed_for_seek) => {
                if flushed_for_seek {
                    let state = shared.state.lock().unwrap();
                    for sink in state.sink_map.all_sinks() {
                        sink.flush();
                    }
                }
                deliver_frame(&shared, &mut graph, decode_head, &file, &frame, combined_gain);
            }
            DecodeStep::Residual(frames) => {
                for frame in &frames {
                    deliver_frame(&shared, &mut graph, decode_head, &file, frame, combined_gain);
                }
            }
            DecodeStep::Eof | DecodeStep::Aborted => {
                let mut state = shared.state.lock().unwrap();
                let next = state.items.get(&decode_head).and_then(|n| n.next);
                state.decode_head = next;
                if let Some(next_id) = next {
                    state.items[&next_id].file.request_seek(0.0, false);
                }
                tracing::debug!(item = decode_head.0, next = ?next.map(|n| n.0), "item finished");
            }
        }
    }
}
