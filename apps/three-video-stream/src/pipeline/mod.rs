use futures::StreamExt;
use gst::prelude::*;
use gst::MessageView;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::service::signals::SignalType;
use crate::{Error, Result};

/// Pipeline-wide lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Null,
    /// Prerolling
    Paused,
    Playing,
    Terminated,
}

/// Bus messages the controller reacts to, detached from the message itself
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Error {
        source: String,
        message: String,
        debug: Option<String>,
    },
    Warning {
        source: String,
        message: String,
        debug: Option<String>,
    },
    StateChanged {
        /// Reported by the pipeline itself rather than one of its elements
        pipeline_level: bool,
        old: gst::State,
        new: gst::State,
        pending: gst::State,
    },
    Eos,
    Other,
}

impl BusEvent {
    pub fn from_message(msg: &gst::Message, pipeline: &gst::Pipeline) -> Self {
        let source = || {
            msg.src()
                .map(|s| s.path_string().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };

        match msg.view() {
            MessageView::Error(err) => BusEvent::Error {
                source: source(),
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            },
            MessageView::Warning(warning) => BusEvent::Warning {
                source: source(),
                message: warning.error().to_string(),
                debug: warning.debug().map(|d| d.to_string()),
            },
            MessageView::StateChanged(sc) => BusEvent::StateChanged {
                pipeline_level: msg.src() == Some(pipeline.upcast_ref::<gst::Object>()),
                old: sc.old(),
                new: sc.current(),
                pending: sc.pending(),
            },
            MessageView::Eos(..) => BusEvent::Eos,
            _ => BusEvent::Other,
        }
    }
}

/// Injects end-of-stream into the pipeline, false when the event was refused.
pub type EosSender = Box<dyn Fn(&gst::Pipeline) -> bool + Send>;

fn send_eos(pipeline: &gst::Pipeline) -> bool {
    pipeline.send_event(gst::event::Eos::new())
}

/// Drives the pipeline from construction to termination.
///
/// Null -> Paused is requested by [`start`](Self::start); Paused -> Playing
/// only once the pipeline itself reports that preroll finished. An error
/// message stops everything, a warning is only logged, end-of-stream stops
/// the loop and brings the pipeline back to Null.
pub struct LifecycleController {
    pipeline: Option<gst::Pipeline>,
    state: LifecycleState,
    eos_requested: bool,
    eos_sender: EosSender,
}

impl LifecycleController {
    pub fn new(pipeline: gst::Pipeline) -> Self {
        Self {
            pipeline: Some(pipeline),
            state: LifecycleState::Null,
            eos_requested: false,
            eos_sender: Box::new(send_eos),
        }
    }

    /// Replace how end-of-stream is injected, for instance to target only
    /// the sources of a larger pipeline.
    pub fn with_eos_sender(
        mut self,
        sender: impl Fn(&gst::Pipeline) -> bool + Send + 'static,
    ) -> Self {
        self.eos_sender = Box::new(sender);
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn pipeline(&self) -> Option<&gst::Pipeline> {
        self.pipeline.as_ref()
    }

    fn set_pipeline_state(&self, state: gst::State) -> Result<()> {
        let Some(pipeline) = &self.pipeline else {
            return Err(Error::StateTransition { state });
        };

        pipeline.set_state(state).map_err(|err| {
            error!("Unable to set the pipeline to {:?}: {:?}", state, err);
            Error::StateTransition { state }
        })?;
        Ok(())
    }

    /// Kick off preroll.
    pub fn start(&mut self) -> Result<()> {
        if self.state != LifecycleState::Null {
            return Ok(());
        }

        info!("Prerolling pipeline");
        self.set_pipeline_state(gst::State::Paused)?;
        self.state = LifecycleState::Paused;
        Ok(())
    }

    pub fn handle_message(&mut self, msg: &gst::Message) -> Result<ControlFlow<()>> {
        let Some(pipeline) = &self.pipeline else {
            return Ok(ControlFlow::Break(()));
        };
        let event = BusEvent::from_message(msg, pipeline);
        self.handle_event(event)
    }

    /// Classify one bus event. `Break` ends the loop cleanly, an error ends it
    /// as a failure.
    pub fn handle_event(&mut self, event: BusEvent) -> Result<ControlFlow<()>> {
        if self.state == LifecycleState::Terminated {
            return Ok(ControlFlow::Break(()));
        }

        match event {
            BusEvent::Error {
                source,
                message,
                debug,
            } => {
                error!("ERROR: from element {}: {}", source, message);
                if let Some(debug_info) = &debug {
                    error!("Additional debug info:\n{}", debug_info);
                }
                self.terminate();
                Err(Error::Engine {
                    source_path: source,
                    message,
                    debug,
                })
            }
            BusEvent::Warning {
                source,
                message,
                debug,
            } => {
                warn!("WARNING: from element {}: {}", source, message);
                if let Some(debug_info) = debug {
                    warn!("Additional debug info:\n{}", debug_info);
                }
                Ok(ControlFlow::Continue(()))
            }
            BusEvent::StateChanged {
                pipeline_level: true,
                old,
                new,
                pending,
            } => {
                debug!("Pipeline state {:?} -> {:?} (pending {:?})", old, new, pending);
                if new == gst::State::Paused && self.state == LifecycleState::Paused {
                    info!("Pipeline prerolled, starting playback");
                    if let Err(err) = self.set_pipeline_state(gst::State::Playing) {
                        self.terminate();
                        return Err(err);
                    }
                    self.state = LifecycleState::Playing;
                }
                Ok(ControlFlow::Continue(()))
            }
            BusEvent::StateChanged { .. } | BusEvent::Other => Ok(ControlFlow::Continue(())),
            BusEvent::Eos => {
                info!("Got EOS");
                self.terminate();
                Ok(ControlFlow::Break(()))
            }
        }
    }

    /// Ask for a clean stop: push EOS through the pipeline so the muxer and
    /// network sink can finish. A rejected event tears the pipeline down
    /// immediately.
    pub fn request_eos(&mut self) -> Result<()> {
        if self.eos_requested {
            return Ok(());
        }

        let Some(pipeline) = &self.pipeline else {
            return Ok(());
        };

        info!("Sending EOS to stop gracefully");
        if !(self.eos_sender)(pipeline) {
            error!("Could not send an EOS event");
            self.terminate();
            return Err(Error::EosRejected);
        }

        self.eos_requested = true;
        Ok(())
    }

    /// Bring the pipeline back to Null and release it. No further events are
    /// processed afterwards.
    pub fn terminate(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            info!("Stopping pipeline {}", pipeline.name());
            if let Err(err) = pipeline.set_state(gst::State::Null) {
                warn!("Error stopping pipeline: {:?}", err);
            }
        }
        self.state = LifecycleState::Terminated;
    }

    /// Run the event loop until end-of-stream or a fatal error. The first
    /// shutdown request is turned into end-of-stream, a second one stops
    /// without waiting for the drain.
    pub async fn run(mut self, mut shutdown: mpsc::UnboundedReceiver<SignalType>) -> Result<()> {
        let bus = self
            .pipeline
            .as_ref()
            .and_then(|p| p.bus())
            .ok_or_else(|| Error::Engine {
                source_path: "pipeline".to_string(),
                message: "pipeline has no bus".to_string(),
                debug: None,
            })?;
        let mut messages = bus.stream();

        if let Err(err) = self.start() {
            self.terminate();
            return Err(err);
        }

        info!("Starting the event loop");
        let mut shutdown_open = true;
        let result = loop {
            tokio::select! {
                msg = messages.next() => {
                    let Some(msg) = msg else {
                        debug!("Bus stream closed");
                        break Ok(());
                    };
                    match self.handle_message(&msg) {
                        Ok(ControlFlow::Continue(())) => {}
                        Ok(ControlFlow::Break(())) => break Ok(()),
                        Err(err) => break Err(err),
                    }
                }
                request = shutdown.recv(), if shutdown_open => {
                    match request {
                        Some(signal) if self.eos_requested => {
                            warn!("Received {:?} while draining, stopping now", signal);
                            break Ok(());
                        }
                        Some(signal) => {
                            info!("Received {:?}", signal);
                            if let Err(err) = self.request_eos() {
                                break Err(err);
                            }
                        }
                        None => shutdown_open = false,
                    }
                }
            }
        };

        self.terminate();
        result
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if self.pipeline.is_some() {
            debug!("Dropping controller with a live pipeline");
            self.terminate();
        }
    }
}
