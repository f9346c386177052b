//! Public-safe community alert view.
//!
//! A [`CommunityAlert`] is never stored. It is derived from the report on
//! every read, so it cannot drift from the report it describes.

use chrono::{DateTime, Duration, Utc};
use flare_common::AlertPolicyConfig;
use flare_db::entities::missing_report::{self, ReportStatus};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Round to two decimals (roughly 1 km).
    #[must_use]
    pub fn coarsened(self) -> Self {
        Self {
            lat: (self.lat * 100.0).round() / 100.0,
            lng: (self.lng * 100.0).round() / 100.0,
        }
    }
}

/// Redacted public view of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityAlert {
    pub id: String,
    pub report_id: String,
    pub first_name: String,
    pub age: Option<u8>,
    /// Viewer-relative distance. Absent when no viewer location was given.
    pub distance_km: Option<f64>,
    /// Coarse locality, never the street address.
    pub location: String,
    pub last_seen_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub radius_km: f64,
    pub notified_count: i64,
    pub blurred_photo_url: Option<String>,
}

/// Visibility rules for the public feed.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionPolicy {
    pub show_pending: bool,
    pub retention: Duration,
}

impl From<&AlertPolicyConfig> for ProjectionPolicy {
    fn from(config: &AlertPolicyConfig) -> Self {
        Self {
            show_pending: config.show_pending_alerts,
            retention: config.alert_retention(),
        }
    }
}

impl Default for ProjectionPolicy {
    fn default() -> Self {
        Self::from(&AlertPolicyConfig::default())
    }
}

/// Whether a report currently appears on the public feed.
#[must_use]
pub fn is_visible(report: &missing_report::Model, now: DateTime<Utc>, policy: &ProjectionPolicy) -> bool {
    match report.status {
        ReportStatus::Pending => policy.show_pending,
        ReportStatus::Active => true,
        ReportStatus::Retracted => false,
        ReportStatus::Found | ReportStatus::Closed => report.closed_at.is_some_and(|closed_at| {
            closed_at
                .checked_add_signed(policy.retention)
                .is_none_or(|hidden_at| now < hidden_at)
        }),
    }
}

/// Derive the community alert for `report`, or `None` when it is hidden.
#[must_use]
pub fn project(
    report: &missing_report::Model,
    viewer: Option<GeoPoint>,
    now: DateTime<Utc>,
    policy: &ProjectionPolicy,
) -> Option<CommunityAlert> {
    if !is_visible(report, now, policy) {
        return None;
    }

    let last_seen = report
        .last_seen_location
        .coordinates()
        .map(|(lat, lng)| GeoPoint::new(lat, lng).coarsened());
    let distance_km = viewer
        .zip(last_seen)
        .map(|(v, p)| round_tenth(haversine_km(v.coarsened(), p)));

    Some(CommunityAlert {
        id: format!("ca-{}", report.id),
        report_id: report.id.clone(),
        first_name: report.subject.first_name.clone(),
        age: report.subject.age,
        distance_km,
        location: coarse_locality(&report.last_seen_location.address),
        last_seen_at: report.last_seen_at,
        status: report.status,
        radius_km: round_tenth(report.current_radius_km),
        notified_count: report.notified_count,
        blurred_photo_url: report.subject.blurred_photo_url.clone(),
    })
}

/// Reduce a street address to the locality it sits in.
///
/// `"12 Harbour Road, Westfield, Springdale"` becomes `"Westfield, Springdale"`;
/// a single-segment address keeps its street name without the house number.
#[must_use]
pub fn coarse_locality(address: &str) -> String {
    let parts: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let locality = match parts.as_slice() {
        [] => String::new(),
        [single] => {
            let mut words = single.split_whitespace().peekable();
            if words
                .peek()
                .is_some_and(|w| w.chars().any(|c| c.is_ascii_digit()))
            {
                words.next();
            }
            words.collect::<Vec<_>>().join(" ")
        }
        [_street, rest @ ..] => rest.join(", "),
    };

    if locality.is_empty() {
        "Undisclosed area".to_string()
    } else {
        locality
    }
}

/// Great-circle distance between two points.
#[must_use]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
