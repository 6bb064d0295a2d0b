//! In-memory fakes for the provider and platform seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use locator_geocoder::{CandidateProvider, ProviderResponse, ReverseGeocoder};
use locator_geocoder_models::{CandidateSource, Coordinates, GeocodeResult, Placemark};
use tokio_util::sync::CancellationToken;

use crate::LocateError;
use crate::location::{LocationService, MapView, Permission};

type Respond = dyn Fn(&str) -> ProviderResponse + Send + Sync;

pub struct FakeProvider {
    source: CandidateSource,
    respond: Box<Respond>,
    delay: Duration,
    details: Option<GeocodeResult>,
    calls: Mutex<Vec<String>>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl FakeProvider {
    pub fn new(
        source: CandidateSource,
        respond: impl Fn(&str) -> ProviderResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            respond: Box::new(respond),
            delay: Duration::ZERO,
            details: None,
            calls: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn empty(source: CandidateSource) -> Self {
        Self::new(source, |_| ProviderResponse::answered(Vec::new()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_details(mut self, details: GeocodeResult) -> Self {
        self.details = Some(details);
        self
    }

    /// Queries passed to `search`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Spelling lists passed to `search_any`, one per call.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    /// Sleeps for the configured delay. Returns `false` if cancelled first.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        if self.delay.is_zero() {
            return true;
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(self.delay) => true,
        }
    }
}

#[async_trait]
impl CandidateProvider for FakeProvider {
    fn source(&self) -> CandidateSource {
        self.source
    }

    async fn search(&self, query: &str, cancel: &CancellationToken) -> ProviderResponse {
        self.calls.lock().unwrap().push(query.to_string());
        if !self.pause(cancel).await {
            return ProviderResponse::unavailable();
        }
        (self.respond)(query)
    }

    async fn search_any(
        &self,
        queries: &[String],
        cancel: &CancellationToken,
    ) -> ProviderResponse {
        self.batches.lock().unwrap().push(queries.to_vec());
        if !self.pause(cancel).await {
            return ProviderResponse::unavailable();
        }
        let responses: Vec<ProviderResponse> =
            queries.iter().map(|query| (self.respond)(query)).collect();
        responses
            .iter()
            .find(|response| !response.is_empty())
            .or_else(|| responses.first())
            .cloned()
            .unwrap_or_else(|| ProviderResponse::answered(Vec::new()))
    }

    async fn details(
        &self,
        _external_id: &str,
        _cancel: &CancellationToken,
    ) -> Option<GeocodeResult> {
        self.details.clone()
    }
}

pub struct FakeReverse {
    placemark: Option<Placemark>,
    pub calls: AtomicUsize,
}

impl FakeReverse {
    pub const fn new(placemark: Option<Placemark>) -> Self {
        Self {
            placemark,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn street(street: &str, number: &str) -> Self {
        Self::new(Some(Placemark {
            street: Some(street.to_string()),
            street_number: Some(number.to_string()),
            ..Placemark::default()
        }))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for FakeReverse {
    async fn reverse(
        &self,
        _coordinates: Coordinates,
        _cancel: &CancellationToken,
    ) -> Option<Placemark> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.placemark.clone()
    }
}

pub struct FakeLocation {
    pub permission: Mutex<Permission>,
    pub position: Coordinates,
}

impl FakeLocation {
    pub const fn new(permission: Permission, position: Coordinates) -> Self {
        Self {
            permission: Mutex::new(permission),
            position,
        }
    }
}

#[async_trait]
impl LocationService for FakeLocation {
    async fn request_permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    async fn current_position(&self) -> Result<Coordinates, LocateError> {
        Ok(self.position)
    }
}

#[derive(Default)]
pub struct RecordingMap {
    pub moves: Mutex<Vec<(Coordinates, f64)>>,
}

impl RecordingMap {
    pub fn moves(&self) -> Vec<(Coordinates, f64)> {
        self.moves.lock().unwrap().clone()
    }
}

impl MapView for RecordingMap {
    fn animate_to(&self, target: Coordinates, zoom: f64) {
        self.moves.lock().unwrap().push((target, zoom));
    }
}
