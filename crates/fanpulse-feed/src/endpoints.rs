//! Sports-data API endpoint catalog.
//!
//! Each endpoint carries the cache TTL natural to its volatility: live data
//! turns over in seconds, reference data in hours.

use std::time::Duration;

/// Endpoints of the third-party sports-data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEndpoint {
    /// In-play scores; effectively live data.
    LiveScores,
    /// Upcoming and recent fixtures.
    Fixtures,
    /// League standings.
    Standings,
    /// Club news articles.
    News,
    /// Team reference data (squads, venues); nearly static.
    Teams,
    /// Bookmaker-style outcome predictions.
    Predictions,
}

impl FeedEndpoint {
    /// URL path relative to the API base.
    pub fn path(&self) -> &'static str {
        match self {
            FeedEndpoint::LiveScores => "livescores",
            FeedEndpoint::Fixtures => "fixtures",
            FeedEndpoint::Standings => "standings",
            FeedEndpoint::News => "news",
            FeedEndpoint::Teams => "teams",
            FeedEndpoint::Predictions => "predictions",
        }
    }

    /// Cache TTL appropriate to this endpoint's data volatility.
    pub fn cache_ttl(&self) -> Duration {
        match self {
            FeedEndpoint::LiveScores => Duration::from_secs(30),
            FeedEndpoint::Fixtures => Duration::from_secs(10 * 60),
            FeedEndpoint::Standings => Duration::from_secs(60 * 60),
            FeedEndpoint::News => Duration::from_secs(15 * 60),
            FeedEndpoint::Teams => Duration::from_secs(24 * 60 * 60),
            FeedEndpoint::Predictions => Duration::from_secs(60 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_data_has_shortest_ttl() {
        let live = FeedEndpoint::LiveScores.cache_ttl();
        for ep in [
            FeedEndpoint::Fixtures,
            FeedEndpoint::Standings,
            FeedEndpoint::News,
            FeedEndpoint::Teams,
            FeedEndpoint::Predictions,
        ] {
            assert!(live < ep.cache_ttl(), "{ep:?} should outlive live scores");
        }
    }

    #[test]
    fn test_reference_data_has_longest_ttl() {
        let teams = FeedEndpoint::Teams.cache_ttl();
        assert_eq!(teams, Duration::from_secs(86400));
    }

    #[test]
    fn test_paths_are_distinct() {
        let paths = [
            FeedEndpoint::LiveScores.path(),
            FeedEndpoint::Fixtures.path(),
            FeedEndpoint::Standings.path(),
            FeedEndpoint::News.path(),
            FeedEndpoint::Teams.path(),
            FeedEndpoint::Predictions.path(),
        ];
        let mut unique = paths.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), paths.len());
    }
}
