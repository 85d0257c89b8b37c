use tokio::sync::mpsc;
use tracing::debug;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    Terminate,
    Interrupt,
}

/// Turns process signals into shutdown requests for the lifecycle controller.
pub struct SignalHandler {
    signal_tx: mpsc::UnboundedSender<SignalType>,
    signal_rx: mpsc::UnboundedReceiver<SignalType>,
}

impl SignalHandler {
    /// Install the listeners. Must be called from within the runtime.
    pub fn new() -> Result<Self> {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let handler = Self {
            signal_tx,
            signal_rx,
        };
        handler.spawn_signal_listeners()?;

        Ok(handler)
    }

    #[cfg(unix)]
    fn spawn_signal_listeners(&self) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, signal_type) in [
            (SignalKind::interrupt(), SignalType::Interrupt),
            (SignalKind::terminate(), SignalType::Terminate),
        ] {
            let mut stream = signal(kind)?;
            let tx = self.signal_tx.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    debug!("Received {:?}", signal_type);
                    if tx.send(signal_type).is_err() {
                        break;
                    }
                }
            });
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn spawn_signal_listeners(&self) -> Result<()> {
        let tx = self.signal_tx.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("Received Ctrl+C");
                if tx.send(SignalType::Interrupt).is_err() {
                    break;
                }
            }
        });

        Ok(())
    }

    /// Handle for requesting a shutdown without a signal.
    pub fn sender(&self) -> mpsc::UnboundedSender<SignalType> {
        self.signal_tx.clone()
    }

    pub fn into_receiver(self) -> mpsc::UnboundedReceiver<SignalType> {
        self.signal_rx
    }
}
