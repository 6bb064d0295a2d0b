//! One-shot hand-off of the chosen location back to the report form.

use std::sync::{Mutex, PoisonError};

use locator_geocoder_models::ConfirmedLocation;
use tokio::sync::oneshot;

use crate::LocateError;

/// What the location-edit screen produced.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationOutcome {
    /// The user confirmed a location.
    Confirmed(ConfirmedLocation),
    /// The user left without confirming.
    Cancelled,
}

/// Sending half of the hand-off. Settles exactly once.
#[derive(Debug)]
pub struct Handoff {
    sender: Mutex<Option<oneshot::Sender<LocationOutcome>>>,
}

impl Handoff {
    /// Creates a hand-off and the receiver the form awaits.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<LocationOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Sends the confirmed location.
    ///
    /// # Errors
    ///
    /// * [`LocateError::HandoffSettled`] if an outcome was already sent
    pub fn confirm(&self, location: ConfirmedLocation) -> Result<(), LocateError> {
        self.settle(LocationOutcome::Confirmed(location))
    }

    /// Sends [`LocationOutcome::Cancelled`]. Returns `false` if an outcome
    /// was already sent.
    pub fn cancel(&self) -> bool {
        self.settle(LocationOutcome::Cancelled).is_ok()
    }

    /// Returns `true` once an outcome has been sent.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn settle(&self, outcome: LocationOutcome) -> Result<(), LocateError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(LocateError::HandoffSettled)?;

        if sender.send(outcome).is_err() {
            log::debug!("Location hand-off receiver dropped");
        }
        Ok(())
    }
}
