use crate::geodesy::{self, LatLon};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a receiver station, the hostname in practice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiverId(pub String);

impl ReceiverId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Surveyed position of a receiver. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverProfile {
    pub id: ReceiverId,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<f64>,
}

impl ReceiverProfile {
    pub fn new(id: impl Into<String>, latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            id: ReceiverId::new(id),
            latitude_deg,
            longitude_deg,
            elevation_m: None,
        }
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude_deg, self.longitude_deg)
    }
}

/// Read-only registry of receiver profiles, loaded once at server startup.
#[derive(Debug, Clone, Default)]
pub struct ReceiverTable {
    entries: HashMap<ReceiverId, ReceiverProfile>,
}

impl ReceiverTable {
    pub fn from_profiles(profiles: impl IntoIterator<Item = ReceiverProfile>) -> Self {
        let entries = profiles
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: &ReceiverId) -> Option<&ReceiverProfile> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReceiverProfile> {
        self.entries.values()
    }

    /// Mean receiver position; the deterministic initial guess for the
    /// least-squares solver and the anchor for bounding-region checks.
    pub fn centroid(&self) -> Option<LatLon> {
        if self.entries.is_empty() {
            return None;
        }
        let n = self.entries.len() as f64;
        let (lat_sum, lon_sum) = self.entries.values().fold((0.0, 0.0), |(lat, lon), p| {
            (lat + p.latitude_deg, lon + p.longitude_deg)
        });
        Some(LatLon::new(lat_sum / n, lon_sum / n))
    }

    /// Largest pairwise receiver separation in metres.
    pub fn max_baseline_m(&self) -> f64 {
        let profiles: Vec<&ReceiverProfile> = self.entries.values().collect();
        let mut max = 0.0f64;
        for (i, a) in profiles.iter().enumerate() {
            for b in profiles.iter().skip(i + 1) {
                max = max.max(geodesy::baseline_distance(a.position(), b.position()));
            }
        }
        max
    }
}
