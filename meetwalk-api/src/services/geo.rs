use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use meetwalk_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::User;
use crate::store::Repository;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

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

/// Great-circle distance in km (haversine, atan2 form).
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Lat/lon rectangle that contains every point within a radius of a center.
/// Used as a coarse prefilter; the haversine check decides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

// Slack so points sitting exactly on the radius survive the prefilter.
const BOX_PADDING: f64 = 1.01;

impl BoundingBox {
    pub fn around(center: Coordinates, radius_km: f64) -> Self {
        let angular = (radius_km / EARTH_RADIUS_KM) * BOX_PADDING;
        let d_lat = angular.to_degrees();

        let min_lat = center.latitude - d_lat;
        let max_lat = center.latitude + d_lat;
        let lat_rad = center.latitude.to_radians();

        // Widest longitude offset on the circle is asin(sin(d) / cos(lat)).
        let ratio = angular.sin() / lat_rad.cos();
        let crosses_pole = min_lat <= -90.0 || max_lat >= 90.0 || ratio >= 1.0;

        let (min_lon, max_lon) = if crosses_pole {
            (-180.0, 180.0)
        } else {
            let d_lon = ratio.asin().to_degrees();
            let (lo, hi) = (center.longitude - d_lon, center.longitude + d_lon);
            if lo < -180.0 || hi > 180.0 {
                (-180.0, 180.0)
            } else {
                (lo, hi)
            }
        };

        Self {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            min_lon,
            max_lon,
        }
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lon..=self.max_lon).contains(&point.longitude)
    }
}

/// Keeps candidates within `radius_km` of `origin` (inclusive), dropping
/// `excluded` ids and anyone without a location. Closest first.
pub fn filter_nearby(
    origin: Coordinates,
    candidates: Vec<User>,
    excluded: &HashSet<Uuid>,
    radius_km: f64,
) -> Vec<User> {
    let mut within: Vec<(f64, User)> = candidates
        .into_iter()
        .filter(|u| !excluded.contains(&u.id))
        .filter_map(|u| {
            let distance = haversine_km(origin, u.coordinates()?);
            (distance <= radius_km).then_some((distance, u))
        })
        .collect();

    within.sort_by(|a, b| a.0.total_cmp(&b.0));
    within.into_iter().map(|(_, u)| u).collect()
}

/// Nearby discovery for `requester`: everyone within the radius except the
/// requester and the users they already liked.
pub fn nearby_candidates(
    repo: &mut dyn Repository,
    requester: &User,
    radius_km: f64,
) -> AppResult<Vec<User>> {
    let origin = requester.coordinates().ok_or_else(|| {
        AppError::new(ErrorCode::LocationUnavailable, "user location not available")
    })?;

    let mut excluded: HashSet<Uuid> = repo.liked_user_ids(requester.id)?.into_iter().collect();
    excluded.insert(requester.id);

    let exclude: Vec<Uuid> = excluded.iter().copied().collect();
    let pool = repo.users_within(&BoundingBox::around(origin, radius_km), &exclude)?;
    let nearby = filter_nearby(origin, pool, &excluded, radius_km);

    tracing::debug!(
        user_id = %requester.id,
        radius_km,
        excluded = excluded.len(),
        found = nearby.len(),
        "nearby candidates computed"
    );

    Ok(nearby)
}
