//! Single-shot location providers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{EvidenceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// `"<lat>, <lon>"` with six decimals (about 0.1 m)
impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// High-accuracy, single-shot position query
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn locate(&self) -> Result<Coordinates>;
}

/// A configured, fixed position (a stationary install)
#[derive(Debug, Clone)]
pub struct FixedLocation {
    coordinates: Coordinates,
}

impl FixedLocation {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn locate(&self) -> Result<Coordinates> {
        Ok(self.coordinates)
    }
}

/// Host without any positioning source
#[derive(Debug, Clone, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn locate(&self) -> Result<Coordinates> {
        debug!("No location source configured");
        Err(EvidenceError::unavailable("no location source configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_six_decimals() {
        let c = Coordinates::new(40.7127753, -74.0059728);
        assert_eq!(c.to_string(), "40.712775, -74.005973");
    }

    #[tokio::test]
    async fn test_providers() {
        let fixed = FixedLocation::new(Coordinates::new(1.0, 2.0));
        assert_eq!(fixed.locate().await.unwrap(), Coordinates::new(1.0, 2.0));
        assert!(matches!(NoLocation.locate().await, Err(EvidenceError::Unavailable(_))));
    }
}
