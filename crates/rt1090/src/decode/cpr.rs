/**
* The position information is encoded in a Compact Position Reporting (CPR)
* format, which requires fewer bits to encode positions with higher
* resolution. The CPR offers a trade-off between global position ambiguity
* and local position accuracy. Two types of position messages (identified by
* the odd and even frame bit) are broadcast alternately.
*
* The globally unambiguous decoding implemented here requires both types of
* messages from the same aircraft, received at most ten seconds apart.
*/
use super::bds::bds05::AirbornePosition;
use serde::{Deserialize, Serialize};

/// NZ represents the number of latitude zones between the equator and a
/// pole. In Mode S, is defined to be 15.
const NZ: f64 = 15.0;

/// CPR_MAX is 2^17 since CPR lat and lon values are encoded on 17 bits
const CPR_MAX: f64 = 131_072.0;

const D_LAT_EVEN: f64 = 360.0 / (4.0 * NZ);
const D_LAT_ODD: f64 = 360.0 / (4.0 * NZ - 1.0);

/// The window within which an odd and an even frame may be paired
pub const CPR_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// A raw CPR report, as stored per aircraft until its sibling arrives
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CprFrame {
    pub lat_cpr: u32,
    pub lon_cpr: u32,
    /// Reception time in milliseconds
    pub timestamp: u64,
}

impl CprFrame {
    pub fn from_message(msg: &AirbornePosition, timestamp: u64) -> Self {
        CprFrame {
            lat_cpr: msg.lat_cpr,
            lon_cpr: msg.lon_cpr,
            timestamp,
        }
    }
}

/// Given the latitude, this function yields the number of longitude zones
/// between 1 and 59.
/// The nl function uses the precomputed table from 1090-WP-9-14
#[rustfmt::skip]
pub fn nl(lat: f64) -> u64 {
    let mut lat = lat;
    if lat < 0.0 { lat = -lat; } // Table is symmetric about the equator
    if lat < 29.911_356_86 {
        if lat < 10.470_471_30 { return 59; }
        if lat < 14.828_174_37 { return 58; }
        if lat < 18.186_263_57 { return 57; }
        if lat < 21.029_394_93 { return 56; }
        if lat < 23.545_044_87 { return 55; }
        if lat < 25.829_247_07 { return 54; }
        if lat < 27.938_987_10 { return 53; }
        // < 29.91135686
        return 52;
    }
    if lat < 44.194_549_51 {
        if lat < 31.772_097_08 { return 51; }
        if lat < 33.539_934_36 { return 50; }
        if lat < 35.228_995_98 { return 49; }
        if lat < 36.850_251_08 { return 48; }
        if lat < 38.412_418_92 { return 47; }
        if lat < 39.922_566_84 { return 46; }
        if lat < 41.386_518_32 { return 45; }
        if lat < 42.809_140_12 { return 44; }
        // < 44.19454951
        return 43;
    }
    if lat < 59.954_592_77 {
        if lat < 45.546_267_23 { return 42; }
        if lat < 46.867_332_52 { return 41; }
        if lat < 48.160_391_28 { return 40; }
        if lat < 49.427_764_39 { return 39; }
        if lat < 50.671_501_66 { return 38; }
        if lat < 51.893_424_69 { return 37; }
        if lat < 53.095_161_53 { return 36; }
        if lat < 54.278_174_72 { return 35; }
        if lat < 55.443_784_44 { return 34; }
        if lat < 56.593_187_56 { return 33; }
        if lat < 57.727_473_54 { return 32; }
        if lat < 58.847_637_76 { return 31; }
        // < 59.95459277
        return 30;
    }
    if lat < 61.049_177_74 { return 29; }
    if lat < 62.132_166_59 { return 28; }
    if lat < 63.204_274_79 { return 27; }
    if lat < 64.266_165_23 { return 26; }
    if lat < 65.318_453_10 { return 25; }
    if lat < 66.361_710_08 { return 24; }
    if lat < 67.396_467_74 { return 23; }
    if lat < 68.423_220_22 { return 22; }
    if lat < 69.442_426_31 { return 21; }
    if lat < 70.454_510_75 { return 20; }
    if lat < 71.459_864_73 { return 19; }
    if lat < 72.458_845_45 { return 18; }
    if lat < 73.451_774_42 { return 17; }
    if lat < 74.438_934_16 { return 16; }
    if lat < 75.420_562_57 { return 15; }
    if lat < 76.396_843_91 { return 14; }
    if lat < 77.367_894_61 { return 13; }
    if lat < 78.333_740_83 { return 12; }
    if lat < 79.294_282_25 { return 11; }
    if lat < 80.249_232_13 { return 10; }
    if lat < 81.198_013_49 { return 9; }
    if lat < 82.139_569_81 { return 8; }
    if lat < 83.071_994_45 { return 7; }
    if lat < 83.991_735_63 { return 6; }
    if lat < 84.891_661_91 { return 5; }
    if lat < 85.755_416_21 { return 4; }
    if lat < 86.535_369_98 { return 3; }
    if lat < 87.000_000_00 { return 2; }
    1
}

/// The always-non-negative modulus used for CPR decoding.
///
/// The main difference for % between Python and Rust is that in Rust, the
/// sign of the result matches the sign of the dividend.
pub fn modulo(a: f64, b: f64) -> f64 {
    if a >= 0. {
        a % b
    } else {
        a % b + libm::fabs(b)
    }
}

/**
 * Decode an airborne position from a pair of even and odd CPR reports.
 *
 * The latitude zone index j is recovered from both latitudes; if the two
 * frames fall into different longitude zone counts the aircraft crossed a
 * zone boundary between the two transmissions and decoding is aborted. The
 * longitude is computed from the frame with the most recent timestamp.
 */
pub fn airborne_position(
    even: &CprFrame,
    odd: &CprFrame,
) -> Option<Position> {
    let cpr_lat_even = f64::from(even.lat_cpr) / CPR_MAX;
    let cpr_lon_even = f64::from(even.lon_cpr) / CPR_MAX;
    let cpr_lat_odd = f64::from(odd.lat_cpr) / CPR_MAX;
    let cpr_lon_odd = f64::from(odd.lon_cpr) / CPR_MAX;

    // Compute the latitude index j
    let j = libm::floor(59.0 * cpr_lat_even - 60.0 * cpr_lat_odd + 0.5);

    let mut lat_even = D_LAT_EVEN * (modulo(j, 60.) + cpr_lat_even);
    let mut lat_odd = D_LAT_ODD * (modulo(j, 59.) + cpr_lat_odd);

    if lat_even >= 270.0 {
        lat_even -= 360.0;
    }

    if lat_odd >= 270.0 {
        lat_odd -= 360.0;
    }

    if !(-90. ..=90.).contains(&lat_even) || !(-90. ..=90.).contains(&lat_odd)
    {
        return None;
    }

    // Both must be in the same latitude zone, or abort
    if nl(lat_even) != nl(lat_odd) {
        return None;
    }

    let newest_is_even = even.timestamp > odd.timestamp;

    let (lat, p, c) = if newest_is_even {
        (lat_even, 0, cpr_lon_even)
    } else {
        (lat_odd, 1, cpr_lon_odd)
    };

    let ni = std::cmp::max(nl(lat) - p, 1) as f64;
    let m = libm::floor(
        cpr_lon_even * (nl(lat) - 1) as f64 - cpr_lon_odd * nl(lat) as f64
            + 0.5,
    );

    let r = modulo(m, ni);

    let mut lon = (360.0 / ni) * (r + c);
    if lon > 180.0 {
        lon -= 360.0;
    }

    Some(Position {
        latitude: lat,
        longitude: lon,
    })
}
