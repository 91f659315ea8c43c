//! Background driver: the tuner runs on its own thread and reports through a
//! channel, so a UI or the CLI only consumes events.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use super::{Autotuner, CellResult, ProgressSink, TuneReport};
use crate::ConvError;

/// Messages emitted by a running tuner.
#[derive(Debug, Clone, PartialEq)]
pub enum TunerEvent {
    Progress(f32),
    Log(String),
    Cell(CellResult),
}

struct ChannelSink {
    sender: Sender<TunerEvent>,
}

impl ProgressSink for ChannelSink {
    // a receiver that went away only loses the events
    fn on_progress(&mut self, percent: f32) {
        let _ = self.sender.send(TunerEvent::Progress(percent));
    }

    fn on_log(&mut self, message: &str) {
        let _ = self.sender.send(TunerEvent::Log(message.to_string()));
    }

    fn on_cell(&mut self, cell: &CellResult) {
        let _ = self.sender.send(TunerEvent::Cell(cell.clone()));
    }
}

/// Handle to a tuner running on a background thread.
///
/// The thread waits for [`TunerHandle::start`]. The event channel closes once
/// the run ends, so iterating [`TunerHandle::events`] terminates.
#[derive(Debug)]
pub struct TunerHandle {
    start: Option<Sender<()>>,
    events: Receiver<TunerEvent>,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Result<TuneReport, ConvError>>,
}

/// Moves `tuner` onto a named thread, gated on [`TunerHandle::start`].
pub fn spawn(mut tuner: Autotuner) -> Result<TunerHandle, ConvError> {
    let (start_tx, start_rx) = bounded::<()>(1);
    let (event_tx, event_rx) = unbounded();
    let stop = tuner.stop_flag();

    let thread = thread::Builder::new()
        .name("conv-autotuner".to_string())
        .spawn(move || {
            if start_rx.recv().is_err() {
                tracing::debug!("autotuner handle dropped before start");
                return Err(ConvError::InvalidState(
                    "tuner was never started".to_string(),
                ));
            }

            let mut sink = ChannelSink { sender: event_tx };
            tuner.run(&mut sink)
        })?;

    Ok(TunerHandle {
        start: Some(start_tx),
        events: event_rx,
        stop,
        thread,
    })
}

impl TunerHandle {
    /// Opens the start gate. Fails if already started.
    pub fn start(&mut self) -> Result<(), ConvError> {
        let start = self
            .start
            .take()
            .ok_or_else(|| ConvError::InvalidState("tuner already started".to_string()))?;

        start
            .send(())
            .map_err(|_| ConvError::InvalidState("tuner thread is gone".to_string()))
    }

    /// Requests a stop before the next grid cell.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn events(&self) -> &Receiver<TunerEvent> {
        &self.events
    }

    /// Waits for the run to finish. Joining a tuner that was never started
    /// returns [`ConvError::InvalidState`].
    pub fn join(self) -> Result<TuneReport, ConvError> {
        let TunerHandle { start, thread, .. } = self;
        drop(start);

        thread
            .join()
            .map_err(|_| ConvError::InvalidState("autotuner thread panicked".to_string()))?
    }
}
