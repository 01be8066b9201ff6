//! Coordinate helpers for receiver baselines and locus rendering.
//!
//! Short baselines use a local tangent plane built from series-expansion
//! metres-per-degree scale factors; once receivers are separated by more
//! than [`PLANAR_LIMIT_M`] the spherical great-circle distance is used
//! instead.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const DTOR: f64 = PI / 180.0;

/// Average Earth radius for the spherical approximation, in metres.
const SPHERICAL_R: f64 = 6371e3;

/// Baseline length beyond which the flat-plane distance is replaced by the
/// great-circle distance.
pub const PLANAR_LIMIT_M: f64 = 5_000.0;

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl LatLon {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }
}

/// Local tangent plane anchored at a reference point.
///
/// x grows eastward and y northward, both in metres. The per-degree scale
/// factors come from the standard series expansion of the WGS84 meridian
/// and parallel arc lengths evaluated at the anchor latitude.
#[derive(Debug, Clone, Copy)]
pub struct LocalPlane {
    origin: LatLon,
    m_per_deg_lat: f64,
    m_per_deg_lon: f64,
}

impl LocalPlane {
    pub fn new(origin: LatLon) -> Self {
        let phi = origin.lat_deg * DTOR;
        let m_per_deg_lat = 111_132.92 - 559.82 * (2.0 * phi).cos()
            + 1.175 * (4.0 * phi).cos()
            - 0.0023 * (6.0 * phi).cos();
        let m_per_deg_lon =
            111_412.84 * phi.cos() - 93.5 * (3.0 * phi).cos() + 0.118 * (5.0 * phi).cos();
        Self {
            origin,
            m_per_deg_lat,
            m_per_deg_lon,
        }
    }

    pub fn origin(&self) -> LatLon {
        self.origin
    }

    /// Projects a geographic position to plane coordinates in metres.
    pub fn project(&self, point: LatLon) -> (f64, f64) {
        let x = (point.lon_deg - self.origin.lon_deg) * self.m_per_deg_lon;
        let y = (point.lat_deg - self.origin.lat_deg) * self.m_per_deg_lat;
        (x, y)
    }

    /// Inverse of [`project`](Self::project).
    pub fn unproject(&self, x: f64, y: f64) -> LatLon {
        LatLon {
            lat_deg: self.origin.lat_deg + y / self.m_per_deg_lat,
            lon_deg: self.origin.lon_deg + x / self.m_per_deg_lon,
        }
    }

    pub fn distance(&self, a: LatLon, b: LatLon) -> f64 {
        let (xa, ya) = self.project(a);
        let (xb, yb) = self.project(b);
        (xb - xa).hypot(yb - ya)
    }
}

/// Great-circle distance in metres between two points on a spherical Earth.
///
/// Altitude is ignored; accuracy is around 1% which is ample for validity
/// bounds at network scale.
pub fn greatcircle(a: LatLon, b: LatLon) -> f64 {
    let lat0 = a.lat_deg * DTOR;
    let lon0 = a.lon_deg * DTOR;
    let lat1 = b.lat_deg * DTOR;
    let lon1 = b.lon_deg * DTOR;

    let cos_angle = lat0.sin() * lat1.sin() + lat0.cos() * lat1.cos() * (lon0 - lon1).abs().cos();
    SPHERICAL_R * cos_angle.clamp(-1.0, 1.0).acos()
}

/// Distance between two receivers, switching from the tangent-plane to the
/// great-circle form once Earth curvature starts to matter.
pub fn baseline_distance(a: LatLon, b: LatLon) -> f64 {
    let planar = LocalPlane::new(a).distance(a, b);
    if planar > PLANAR_LIMIT_M {
        greatcircle(a, b)
    } else {
        planar
    }
}
