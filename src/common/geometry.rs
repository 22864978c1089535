/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::types::Point;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two GPS coordinates (haversine formula).
pub fn distance_in_meters(from: &Point, to: &Point) -> f64 {
    let from_lat = from.lat.to_radians();
    let to_lat = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + from_lat.cos() * to_lat.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// A point exactly on the boundary counts as inside.
pub fn is_within_radius(point: &Point, centre: &Point, radius_meters: f64) -> bool {
    distance_in_meters(point, centre) <= radius_meters
}

/// Even-odd ray casting on the (lat, lon) plane. The polygon is closed
/// implicitly; fewer than 3 vertices can never contain a point. The planar
/// approximation is acceptable at sub-kilometre geofence scales.
pub fn is_inside_polygon(point: &Point, vertices: &[Point]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (vi, vj) = (&vertices[i], &vertices[j]);
        if (vi.lon > point.lon) != (vj.lon > point.lon)
            && point.lat
                < (vj.lat - vi.lat) * (point.lon - vi.lon) / (vj.lon - vi.lon) + vi.lat
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}
