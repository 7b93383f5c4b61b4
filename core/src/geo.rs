//! Static district geography. Straight-line (haversine) distances
//! between district centroids, precomputed once; no mutable state.

use crate::rng::SubsystemRng;
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum District {
    Dongcheng,
    Xicheng,
    Chaoyang,
    Haidian,
    Fengtai,
    Shijingshan,
    Tongzhou,
    Shunyi,
    Changping,
    Daxing,
    Fangshan,
    Mentougou,
    Huairou,
    Pinggu,
    Miyun,
    Yanqing,
}

impl District {
    pub const ALL: [District; 16] = [
        District::Dongcheng, District::Xicheng, District::Chaoyang, District::Haidian,
        District::Fengtai, District::Shijingshan, District::Tongzhou, District::Shunyi,
        District::Changping, District::Daxing, District::Fangshan, District::Mentougou,
        District::Huairou, District::Pinggu, District::Miyun, District::Yanqing,
    ];

    pub const URBAN: [District; 6] = [
        District::Dongcheng, District::Xicheng, District::Chaoyang,
        District::Haidian, District::Fengtai, District::Shijingshan,
    ];

    pub const SUBURBAN: [District; 10] = [
        District::Tongzhou, District::Shunyi, District::Changping, District::Daxing,
        District::Fangshan, District::Mentougou, District::Huairou, District::Pinggu,
        District::Miyun, District::Yanqing,
    ];

    /// Centroid as (latitude, longitude) in degrees.
    pub fn centroid(&self) -> (f64, f64) {
        match self {
            Self::Dongcheng   => (39.9289, 116.4160),
            Self::Xicheng     => (39.9123, 116.3660),
            Self::Chaoyang    => (39.9219, 116.4431),
            Self::Haidian     => (39.9593, 116.2981),
            Self::Fengtai     => (39.8585, 116.2868),
            Self::Shijingshan => (39.9056, 116.2229),
            Self::Tongzhou    => (39.9096, 116.6566),
            Self::Shunyi      => (40.1301, 116.6545),
            Self::Changping   => (40.2207, 116.2312),
            Self::Daxing      => (39.7269, 116.3414),
            Self::Fangshan    => (39.7355, 116.1392),
            Self::Mentougou   => (39.9405, 116.1021),
            Self::Huairou     => (40.3161, 116.6319),
            Self::Pinggu      => (40.1406, 117.1213),
            Self::Miyun       => (40.3766, 116.8431),
            Self::Yanqing     => (40.4565, 115.9748),
        }
    }

    pub fn is_urban(&self) -> bool {
        Self::URBAN.contains(self)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Great-circle distance in kilometres between two (lat, lon) points.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Travel time in minutes at a constant average speed.
pub fn commute_minutes(distance_km: f64, speed_kmh: f64) -> f64 {
    distance_km / speed_kmh * 60.0
}

/// Urban district with probability `urban_share`, otherwise suburban;
/// uniform within the chosen group.
pub fn pick_district(rng: &mut SubsystemRng, urban_share: f64) -> District {
    let group: &[District] = if rng.chance(urban_share) { &District::URBAN } else { &District::SUBURBAN };
    group[rng.next_u64_below(group.len() as u64) as usize]
}

/// Pairwise district distances.
#[derive(Debug, Clone)]
pub struct GeoIndex {
    distances: [[f64; 16]; 16],
}

impl GeoIndex {
    pub fn new() -> Self {
        let mut distances = [[0.0; 16]; 16];
        for a in District::ALL {
            for b in District::ALL {
                distances[a.index()][b.index()] = haversine_km(a.centroid(), b.centroid());
            }
        }
        Self { distances }
    }

    pub fn distance_km(&self, from: District, to: District) -> f64 {
        self.distances[from.index()][to.index()]
    }
}

impl Default for GeoIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_district_is_zero_and_distances_are_symmetric() {
        let geo = GeoIndex::new();
        for a in District::ALL {
            assert_eq!(geo.distance_km(a, a), 0.0);
            for b in District::ALL {
                assert!((geo.distance_km(a, b) - geo.distance_km(b, a)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn downtown_neighbours_are_close_and_far_suburbs_are_not() {
        let geo = GeoIndex::new();
        let near = geo.distance_km(District::Dongcheng, District::Xicheng);
        assert!(near > 2.0 && near < 8.0, "Dongcheng-Xicheng {near:.1} km");
        let far = geo.distance_km(District::Pinggu, District::Yanqing);
        assert!(far > 90.0, "Pinggu-Yanqing {far:.1} km");
    }

    #[test]
    fn commute_at_25_kmh() {
        assert!((commute_minutes(37.5, 25.0) - 90.0).abs() < 1e-9);
    }
}
