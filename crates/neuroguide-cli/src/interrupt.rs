//! Ctrl-C routing: stop the streaming exchange, or quit when idle

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a Ctrl-C did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// An exchange was streaming and has been cancelled
    Cancelled,
    /// Nothing was streaming
    Idle,
}

/// Holds the cancellation token of the exchange currently streaming, if any
#[derive(Clone, Default)]
pub struct Interrupts {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an exchange and return the token Ctrl-C will cancel
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock() = Some(token.clone());
        token
    }

    /// The exchange settled; Ctrl-C goes back to quitting
    pub fn end(&self) {
        self.current.lock().take();
    }

    pub fn interrupt(&self) -> Interrupt {
        match self.current.lock().take() {
            Some(token) => {
                token.cancel();
                Interrupt::Cancelled
            }
            None => Interrupt::Idle,
        }
    }

    /// Install the process-wide Ctrl-C handler.
    ///
    /// tokio keeps its SIGINT handler for the life of the process once
    /// installed, so a single task owns it and exits when idle.
    pub fn listen(&self) {
        let interrupts = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if interrupts.interrupt() == Interrupt::Idle {
                    eprintln!();
                    std::process::exit(130);
                }
                tracing::debug!("Interrupted streaming exchange");
            }
        });
    }
}
