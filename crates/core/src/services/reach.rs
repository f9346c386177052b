//! Deterministic reach estimate for the broadcast.

use std::f64::consts::PI;

use flare_common::PartnerChannel;
use flare_db::entities::missing_report::PartnerFlags;

/// Share of the population reached by the public feed alone.
const PUBLIC_FEED_REACH: f64 = 0.05;

/// Additional share reached through a partner channel.
const fn channel_reach(channel: PartnerChannel) -> f64 {
    match channel {
        PartnerChannel::Police => 0.01,
        PartnerChannel::Hospital => 0.005,
        PartnerChannel::School => 0.015,
        PartnerChannel::Media => 0.04,
        PartnerChannel::Community => 0.02,
    }
}

/// Estimates how many people an alert reaches:
/// population density × broadcast area × channel reach.
#[derive(Debug, Clone, Copy)]
pub struct ReachEstimator {
    density_per_km2: f64,
}

impl ReachEstimator {
    #[must_use]
    pub const fn new(density_per_km2: f64) -> Self {
        Self { density_per_km2 }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn estimate(&self, radius_km: f64, partners: &PartnerFlags) -> i64 {
        let area = PI * radius_km.max(0.0).powi(2);
        let reach = PUBLIC_FEED_REACH
            + partners
                .notified_channels()
                .into_iter()
                .map(channel_reach)
                .sum::<f64>();

        (self.density_per_km2.max(0.0) * area * reach).round() as i64
    }
}
