//! Cheap per-frame fingerprint.
//!
//! The fingerprint disambiguates candidate frames near a seek target. It
//! samples one column of every other row per plane, so it costs O(height)
//! rather than O(width × height). It is not collision resistant.

use crate::source::Picture;

/// Fingerprint a decoded picture.
///
/// For every plane with a positive stride, sums the sample at the plane's
/// middle column on each even row into a wrapping 16-bit accumulator.
pub fn fingerprint(picture: &Picture) -> u16 {
    let mut sum: u16 = 0;
    for plane in &picture.planes {
        if plane.stride <= 0 {
            continue;
        }
        let column = plane.width / 2;
        for row in (0..plane.height).step_by(2) {
            match plane.sample(row, column) {
                Some(sample) => sum = sum.wrapping_add(sample as u16),
                None => break,
            }
        }
    }
    sum
}
