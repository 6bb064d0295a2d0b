//! Coordinates to a short human-readable label.

use std::sync::Arc;

use locator_geocoder::ReverseGeocoder;
use locator_geocoder_models::Coordinates;
use locator_normalizer::format_reverse_address_with;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;

/// Resolves map positions to address labels. Never fails: when no address
/// can be found the sentinel label is returned.
pub struct ReverseResolver {
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    default_locality: String,
    sentinel_label: String,
}

impl ReverseResolver {
    /// Creates a resolver. Without a geocoder every lookup yields the
    /// sentinel label.
    #[must_use]
    pub fn new(geocoder: Option<Arc<dyn ReverseGeocoder>>, config: &EngineConfig) -> Self {
        if geocoder.is_none() {
            log::warn!("No reverse geocoder configured; map positions will not be labeled");
        }
        Self {
            geocoder,
            default_locality: config.default_locality.clone(),
            sentinel_label: config.sentinel_label.clone(),
        }
    }

    /// The label used when reverse geocoding fails.
    #[must_use]
    pub fn sentinel_label(&self) -> &str {
        &self.sentinel_label
    }

    /// Looks up and formats the address at `coordinates`.
    pub async fn resolve(&self, coordinates: Coordinates, cancel: &CancellationToken) -> String {
        let Some(geocoder) = &self.geocoder else {
            return self.sentinel_label.clone();
        };

        match geocoder.reverse(coordinates, cancel).await {
            Some(placemark) => {
                let label = format_reverse_address_with(&placemark, &self.default_locality);
                if label.trim().is_empty() {
                    self.sentinel_label.clone()
                } else {
                    label
                }
            }
            None => {
                log::debug!("No address at {coordinates}; using sentinel label");
                self.sentinel_label.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use locator_geocoder_models::Placemark;

    use super::*;
    use crate::testing::FakeReverse;

    const POINT: Coordinates = Coordinates::new(-33.4263, -70.6175);

    #[tokio::test]
    async fn formats_placemark() {
        let geocoder = FakeReverse::new(Some(Placemark {
            street: Some("Américo Vespucio".to_string()),
            name: Some("1200".to_string()),
            region: Some("Región Metropolitana".to_string()),
            postal_code: Some("7500000".to_string()),
            ..Placemark::default()
        }));
        let resolver = ReverseResolver::new(Some(Arc::new(geocoder)), &EngineConfig::default());

        let label = resolver.resolve(POINT, &CancellationToken::new()).await;
        assert_eq!(label, "Américo Vespucio 1200, Santiago");
    }

    #[tokio::test]
    async fn falls_back_to_sentinel() {
        let resolver = ReverseResolver::new(
            Some(Arc::new(FakeReverse::new(None))),
            &EngineConfig::default(),
        );
        assert_eq!(
            resolver.resolve(POINT, &CancellationToken::new()).await,
            "Ubicación seleccionada"
        );

        let resolver = ReverseResolver::new(None, &EngineConfig::default());
        assert_eq!(
            resolver.resolve(POINT, &CancellationToken::new()).await,
            "Ubicación seleccionada"
        );
    }
}
