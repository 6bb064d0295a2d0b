//! One visit to the location-edit screen.
//!
//! [`LocationSession`] wires the search box and the map to the engine:
//! keystrokes are debounced into forward searches, map pans into reverse
//! lookups, and the final choice is handed back to the report form through
//! a one-shot channel. Everything outstanding is cancelled when the
//! session closes or is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt as _;
use locator_geocoder_models::{Candidate, ConfirmedLocation, Coordinates, GeocodeResult};
use locator_normalizer::sanitize_short;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::LocateError;
use crate::config::EngineConfig;
use crate::debounce::{DebounceState, Debouncer, Settled};
use crate::handoff::{Handoff, LocationOutcome};
use crate::location::{LocationService, MapView, Permission};
use crate::reverse::ReverseResolver;
use crate::search::AddressSearch;

/// Receivers the screen listens on.
pub struct SessionEvents {
    /// Suggestion lists for the search box, newest query only.
    pub suggestions: mpsc::UnboundedReceiver<Settled<String, Vec<Candidate>>>,
    /// Address labels for the map center, newest position only.
    pub addresses: mpsc::UnboundedReceiver<Settled<Coordinates, String>>,
    /// The visit's outcome, for the report form.
    pub outcome: oneshot::Receiver<LocationOutcome>,
}

#[derive(Debug, Default)]
struct ViewState {
    enabled: bool,
    reference: Option<Coordinates>,
    current: Option<Coordinates>,
    /// Target of a programmatic map move whose settle is not a user pan.
    expected_settle: Option<Coordinates>,
}

/// How far (degrees, per axis) a settle may land from the animation target
/// and still count as that animation's settle.
const SETTLE_TOLERANCE_DEGREES: f64 = 1e-5;

fn same_spot(a: Coordinates, b: Coordinates) -> bool {
    (a.latitude - b.latitude).abs() <= SETTLE_TOLERANCE_DEGREES
        && (a.longitude - b.longitude).abs() <= SETTLE_TOLERANCE_DEGREES
}

fn lock_view(view: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Controller for the location-edit screen.
pub struct LocationSession {
    search: Arc<AddressSearch>,
    reverse: Arc<ReverseResolver>,
    location: Arc<dyn LocationService>,
    map: Arc<dyn MapView>,
    map_zoom: f64,
    suggestions: Debouncer<String, Vec<Candidate>>,
    addresses: Debouncer<Coordinates, String>,
    view: Arc<Mutex<ViewState>>,
    selection: Mutex<Option<CancellationToken>>,
    lifetime: CancellationToken,
    handoff: Handoff,
}

impl LocationSession {
    /// Opens a session. Search and reverse lookups stay disabled until
    /// [`Self::start`] obtains location permission.
    #[must_use]
    pub fn open(
        search: Arc<AddressSearch>,
        reverse: Arc<ReverseResolver>,
        location: Arc<dyn LocationService>,
        map: Arc<dyn MapView>,
        config: &EngineConfig,
    ) -> (Self, SessionEvents) {
        let view = Arc::new(Mutex::new(ViewState::default()));

        let (suggestions, suggestions_rx) = Debouncer::new("search", config.quiet_period, {
            let search = Arc::clone(&search);
            let view = Arc::clone(&view);
            move |text: String, cancel: CancellationToken| {
                let search = Arc::clone(&search);
                let reference = lock_view(&view).reference;
                async move { search.search(&text, reference, &cancel).await }.boxed()
            }
        });

        let (addresses, addresses_rx) = Debouncer::new("reverse", config.quiet_period, {
            let reverse = Arc::clone(&reverse);
            move |coordinates: Coordinates, cancel: CancellationToken| {
                let reverse = Arc::clone(&reverse);
                async move { reverse.resolve(coordinates, &cancel).await }.boxed()
            }
        });

        let (handoff, outcome) = Handoff::channel();

        let session = Self {
            search,
            reverse,
            location,
            map,
            map_zoom: config.map_zoom,
            suggestions,
            addresses,
            view,
            selection: Mutex::new(None),
            lifetime: CancellationToken::new(),
            handoff,
        };
        let events = SessionEvents {
            suggestions: suggestions_rx,
            addresses: addresses_rx,
            outcome,
        };
        (session, events)
    }

    /// Requests permission, centers the map on the device, and resolves
    /// the initial address.
    ///
    /// # Errors
    ///
    /// * [`LocateError::PermissionDenied`] if the user refuses; search stays
    ///   disabled until [`Self::retry_permission`] succeeds
    /// * [`LocateError::PositionUnavailable`] if no fix can be obtained
    /// * [`LocateError::Closed`] if the session is closed
    pub async fn start(&self) -> Result<Coordinates, LocateError> {
        self.ensure_open()?;

        if self.location.request_permission().await == Permission::Denied {
            lock_view(&self.view).enabled = false;
            log::warn!("Location permission denied; search disabled");
            return Err(LocateError::PermissionDenied);
        }
        lock_view(&self.view).enabled = true;

        let position = self.location.current_position().await?;
        {
            let mut view = lock_view(&self.view);
            view.reference = Some(position);
            view.current = Some(position);
        }

        log::info!("Location session started at {position}");
        self.map.animate_to(position, self.map_zoom);
        self.addresses.input(position);
        Ok(position)
    }

    /// Asks for permission again after a denial.
    ///
    /// # Errors
    ///
    /// Same as [`Self::start`].
    pub async fn retry_permission(&self) -> Result<Coordinates, LocateError> {
        self.start().await
    }

    /// Returns `true` while the session is open and location permission is
    /// granted.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.lifetime.is_cancelled() && lock_view(&self.view).enabled
    }

    /// The coordinate a confirm would hand off.
    #[must_use]
    pub fn current_position(&self) -> Option<Coordinates> {
        lock_view(&self.view).current
    }

    /// Where the search box's debouncer is: idle, waiting out the quiet
    /// period, or querying.
    #[must_use]
    pub fn search_state(&self) -> DebounceState {
        self.suggestions.state()
    }

    /// Feeds the search box's text. Suggestions arrive on
    /// [`SessionEvents::suggestions`] after the quiet period.
    pub fn on_text_changed(&self, text: &str) {
        if !self.is_enabled() {
            log::debug!("Ignoring search input while disabled");
            return;
        }

        let normalized = sanitize_short(text);
        if normalized.is_empty() {
            self.suggestions.cancel();
            return;
        }
        self.suggestions.input(normalized);
    }

    /// Explicit search, bypassing the quiet period. A superseded submit
    /// returns an empty list.
    ///
    /// # Errors
    ///
    /// * [`LocateError::GeocodeNotFound`] if no provider has a candidate
    /// * [`LocateError::PermissionDenied`] if search is disabled
    /// * [`LocateError::Closed`] if the session is closed
    pub async fn submit(&self, text: &str) -> Result<Vec<Candidate>, LocateError> {
        self.ensure_enabled()?;

        let not_found = || LocateError::GeocodeNotFound {
            query: text.trim().to_string(),
        };

        let normalized = sanitize_short(text);
        if normalized.is_empty() {
            return Err(not_found());
        }

        match self.suggestions.fire_now(normalized).await {
            None => Ok(Vec::new()),
            Some(settled) if settled.output.is_empty() => Err(not_found()),
            Some(settled) => Ok(settled.output),
        }
    }

    /// Picks a suggestion: resolves its coordinates and moves the map
    /// there. The settle event that move produces is ignored so the
    /// reverse lookup does not replace the chosen label.
    ///
    /// Returns `Ok(None)` if a newer selection superseded this one.
    ///
    /// # Errors
    ///
    /// * [`LocateError::GeocodeNotFound`] if the details lookup fails
    /// * [`LocateError::PermissionDenied`] if search is disabled
    /// * [`LocateError::Closed`] if the session is closed
    pub async fn select(&self, candidate: &Candidate) -> Result<Option<GeocodeResult>, LocateError> {
        self.ensure_enabled()?;
        self.suggestions.cancel();

        let cancel = self.lifetime.child_token();
        if let Some(previous) = self
            .selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(cancel.clone())
        {
            previous.cancel();
        }

        let result = self.search.details(candidate, &cancel).await;
        if cancel.is_cancelled() {
            log::debug!("Selection of '{}' superseded", candidate.label);
            return Ok(None);
        }
        let result = result.ok_or_else(|| LocateError::GeocodeNotFound {
            query: candidate.label.clone(),
        })?;

        {
            let mut view = lock_view(&self.view);
            view.reference = Some(result.coordinates);
            view.current = Some(result.coordinates);
            view.expected_settle = Some(result.coordinates);
        }
        self.addresses.cancel();
        self.map.animate_to(result.coordinates, self.map_zoom);

        log::debug!("Selected '{}' at {}", result.formatted, result.coordinates);
        Ok(Some(result))
    }

    /// The map stopped moving at `center`. Resolves its address unless the
    /// move came from a selection or the user is typing.
    ///
    /// Only a settle at the selected point counts as the selection's own
    /// settle; any other position is a user pan, even if the map never
    /// reported the programmatic move.
    pub fn on_region_settled(&self, center: Coordinates) {
        if !self.is_enabled() {
            return;
        }

        let suppressed = {
            let mut view = lock_view(&self.view);
            view.reference = Some(center);
            view.current = Some(center);
            let suppressed = view
                .expected_settle
                .is_some_and(|target| same_spot(target, center));
            if suppressed {
                view.expected_settle = None;
            }
            suppressed
        };
        if suppressed {
            log::debug!("Ignoring settle at {center} after programmatic move");
            return;
        }

        if self.search_state() != DebounceState::Idle {
            log::debug!("Search in progress; not resolving {center}");
            return;
        }

        self.addresses.input(center);
    }

    /// Re-resolves the current coordinate immediately and hands the result
    /// to the report form. Closes the session.
    ///
    /// # Errors
    ///
    /// * [`LocateError::HandoffSettled`] if the visit already ended
    /// * [`LocateError::PositionUnavailable`] if no position is known
    /// * [`LocateError::PermissionDenied`] if location is disabled
    /// * [`LocateError::Closed`] if the session closed during the lookup
    pub async fn confirm(&self) -> Result<ConfirmedLocation, LocateError> {
        if self.handoff.is_settled() {
            return Err(LocateError::HandoffSettled);
        }
        self.ensure_enabled()?;

        let coordinates = self
            .current_position()
            .ok_or_else(|| LocateError::PositionUnavailable {
                message: "no location selected".to_string(),
            })?;

        let label = match self.addresses.fire_now(coordinates).await {
            Some(settled) => settled.output,
            None if self.lifetime.is_cancelled() => return Err(LocateError::Closed),
            None => self.reverse.sentinel_label().to_string(),
        };

        let location = ConfirmedLocation { label, coordinates };
        self.handoff.confirm(location.clone())?;
        log::info!("Confirmed '{}' at {coordinates}", location.label);

        self.close();
        Ok(location)
    }

    /// Leaves without choosing. The form receives
    /// [`LocationOutcome::Cancelled`].
    pub fn cancel(&self) {
        log::info!("Location edit cancelled");
        self.close();
    }

    /// Cancels every outstanding lookup. Sends
    /// [`LocationOutcome::Cancelled`] unless the visit already ended.
    pub fn close(&self) {
        self.lifetime.cancel();
        self.suggestions.close();
        self.addresses.close();
        self.handoff.cancel();
    }

    fn ensure_open(&self) -> Result<(), LocateError> {
        if self.lifetime.is_cancelled() {
            return Err(LocateError::Closed);
        }
        Ok(())
    }

    fn ensure_enabled(&self) -> Result<(), LocateError> {
        self.ensure_open()?;
        if !lock_view(&self.view).enabled {
            return Err(LocateError::PermissionDenied);
        }
        Ok(())
    }
}

impl Drop for LocationSession {
    fn drop(&mut self) {
        self.close();
    }
}
