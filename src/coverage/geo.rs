use crate::storage::Position;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Initial bearing from `from` towards `to` in degrees, clockwise from north,
/// within `[0, 360)`.
pub fn bearing(from: &Position, to: &Position) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid rounds tiny negative angles up to 360.
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}

/// Great-circle distance in kilometres.
pub fn distance(from: &Position, to: &Position) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_DEGREE_KM: f64 = 111.194_926_6;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn bearing_points_at_compass_directions() {
        let origin = Position::new(0.0, 0.0);

        assert!(close(bearing(&origin, &Position::new(1.0, 0.0)), 0.0));
        assert!(close(bearing(&origin, &Position::new(0.0, 1.0)), 90.0));
        assert!(close(bearing(&origin, &Position::new(-1.0, 0.0)), 180.0));
        assert!(close(bearing(&origin, &Position::new(0.0, -1.0)), 270.0));
        assert!(close(bearing(&origin, &Position::new(1.0, 1.0)), 44.995_636_4));
    }

    #[test]
    fn bearing_is_never_360() {
        let station = Position::new(50.0, 20.0);
        for lon in [19.999_999_999, 20.0, 20.000_000_001] {
            let b = bearing(&station, &Position::new(51.0, lon));
            assert!((0.0..360.0).contains(&b), "{}", b);
        }
    }

    #[test]
    fn distance_along_meridian_and_equator() {
        let origin = Position::new(0.0, 0.0);

        assert!(close(distance(&origin, &origin), 0.0));
        assert!((distance(&origin, &Position::new(1.0, 0.0)) - ONE_DEGREE_KM).abs() < 1e-4);
        assert!((distance(&origin, &Position::new(0.0, -2.0)) - 2.0 * ONE_DEGREE_KM).abs() < 1e-4);
    }

    #[test]
    fn distance_between_cities() {
        let krakow = Position::new(50.0647, 19.9450);
        let warsaw = Position::new(52.2297, 21.0122);

        let d = distance(&krakow, &warsaw);
        assert!((d - 252.0).abs() < 1.0, "{}", d);
        assert!(close(d, distance(&warsaw, &krakow)));
    }
}
