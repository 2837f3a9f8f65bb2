/**
 * Field primitives shared by several Downlink Formats: the 24-bit airframe
 * address, the address/parity overlay, the 13-bit altitude code and the
 * 13-bit identity code, plus the Gillham bit shuffling both codes rely on.
 */
use deku::bitvec::{BitSlice, Msb0};
use deku::prelude::*;
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// 24-bit ICAO airframe address
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, DekuRead)]
pub struct Icao(#[deku(bits = "24", endian = "big")] pub u32);

impl fmt::Display for Icao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

impl fmt::Debug for Icao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Icao {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&format_args!("{:06x}", self.0))
    }
}

impl core::str::FromStr for Icao {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Icao(u32::from_str_radix(s, 16)?))
    }
}

/// The address/parity overlay closing DF 0/4/5/16/20/21 frames.
///
/// The transmitter XORs its address into the parity field, so the syndrome
/// of a correctly received frame IS the address: the reader discards the
/// parity bits and substitutes the syndrome passed down as context.
#[derive(PartialEq, Eq, Hash, Copy, Clone, DekuRead)]
#[deku(ctx = "crc: u32")]
pub struct AddressParity(
    #[deku(reader = "read_address_parity(deku::rest, crc)")] pub Icao,
);

fn read_address_parity(
    rest: &BitSlice<u8, Msb0>,
    crc: u32,
) -> Result<(&BitSlice<u8, Msb0>, Icao), DekuError> {
    let (rest, _parity) =
        u32::read(rest, (deku::ctx::Endian::Big, deku::ctx::BitSize(24)))?;
    Ok((rest, Icao(crc)))
}

impl fmt::Display for AddressParity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for AddressParity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 13-bit altitude code, decoded to feet. None when the code is invalid.
#[derive(Debug, PartialEq, Eq, Copy, Clone, DekuRead)]
pub struct AltitudeCode(
    #[deku(reader = "AltitudeCode::read(deku::rest)")] pub Option<u16>,
);

impl AltitudeCode {
    pub fn feet(&self) -> Option<u16> {
        self.0
    }

    fn read(
        rest: &BitSlice<u8, Msb0>,
    ) -> Result<(&BitSlice<u8, Msb0>, Option<u16>), DekuError> {
        let (rest, code) =
            u16::read(rest, (deku::ctx::Endian::Big, deku::ctx::BitSize(13)))?;
        Ok((rest, decode_ac13(code)))
    }
}

/// Altitude in feet for the 13-bit code: metric when the M bit is set,
/// 25 ft steps when the Q bit is set, Gillham encoding otherwise.
pub fn decode_ac13(code: u16) -> Option<u16> {
    let m_bit = code & 0x0040;
    let q_bit = code & 0x0010;

    if m_bit != 0 {
        let metres = ((code & 0x1f80) >> 2) | (code & 0x3f);
        Some((f32::from(metres) * 3.28084) as u16)
    } else if q_bit != 0 {
        // 11-bit count left after dropping the M and Q bits
        let n = ((code & 0x1f80) >> 2)
            | ((code & 0x0020) >> 1)
            | (code & 0x000f);
        if n > 40 {
            Some(n * 25 - 1000)
        } else {
            None
        }
    } else {
        gillham_to_feet(gillham_field(code))
            .and_then(|hundreds| u16::try_from(hundreds * 100).ok())
    }
}

/// 13-bit identity code, folded into the four octal digits of the squawk
/// and rendered as a decimal number (e.g. 7000)
#[derive(PartialEq, Eq, Copy, Clone, DekuRead)]
pub struct Squawk(#[deku(reader = "Squawk::read(deku::rest)")] pub u16);

impl Squawk {
    pub fn from_field(raw: u16) -> Squawk {
        let code = gillham_field(raw);
        let a = (code >> 12) & 7;
        let b = (code >> 8) & 7;
        let c = (code >> 4) & 7;
        let d = code & 7;
        Squawk(a * 1000 + b * 100 + c * 10 + d)
    }

    fn read(
        rest: &BitSlice<u8, Msb0>,
    ) -> Result<(&BitSlice<u8, Msb0>, u16), DekuError> {
        let (rest, raw) =
            u16::read(rest, (deku::ctx::Endian::Big, deku::ctx::BitSize(13)))?;
        Ok((rest, Squawk::from_field(raw).0))
    }
}

impl fmt::Display for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl fmt::Debug for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Flight status announced in DF 4/5/20/21 replies
#[derive(Debug, PartialEq, Eq, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "3")]
pub enum FlightStatus {
    #[deku(id = "0")]
    Airborne,
    #[deku(id = "1")]
    OnGround,
    #[deku(id = "2")]
    AirborneAlert,
    #[deku(id = "3")]
    OnGroundAlert,
    #[deku(id = "4")]
    AlertAndSpi,
    #[deku(id = "5")]
    Spi,
    #[deku(id_pat = "_")]
    Reserved(#[deku(bits = "3")] u8),
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Airborne | Self::AirborneAlert => "airborne",
            Self::OnGround | Self::OnGroundAlert => "ground",
            Self::AlertAndSpi | Self::Spi => "airborne/ground",
            Self::Reserved(_) => "reserved",
        };
        write!(f, "{status}")
    }
}

/// Transponder capability announced in DF 11 and DF 17
#[derive(Debug, PartialEq, Eq, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "3")]
pub enum Capability {
    /// Level 1 transponder, surveillance only
    #[deku(id = "0")]
    SurveillanceOnly,
    #[deku(id_pat = "1..=3")]
    Reserved(#[deku(bits = "3")] u8),
    /// Level 2 or above, on ground
    #[deku(id = "4")]
    OnGround,
    /// Level 2 or above, airborne
    #[deku(id = "5")]
    Airborne,
    /// Level 2 or above, either airborne or on ground
    #[deku(id = "6")]
    GroundOrAirborne,
    /// Downlink request or alert condition, airborne or on ground
    #[deku(id = "7")]
    Alert,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let capability = match self {
            Self::SurveillanceOnly => "surveillance only",
            Self::Reserved(_) => "reserved",
            Self::OnGround => "ground",
            Self::Airborne => "airborne",
            Self::GroundOrAirborne => "ground/airborne",
            Self::Alert => "alert",
        };
        write!(f, "{capability}")
    }
}

/// Bit interleaving of the 13-bit identity and altitude fields.
///
/// Each entry maps a field bit to its place in the
/// C1-A1-C2-A2-C4-A4-X-B1-D1-B2-D2-B4-D4 Gillham layout, where each letter
/// collects into one octal triad (A in bits 12-14, B in 8-10, C in 4-6,
/// D in 0-2). The X (or M) bit is never part of the code.
#[rustfmt::skip]
const GILLHAM_LAYOUT: [(u16, u16); 12] = [
    (0x1000, 0x0010), // C1
    (0x0800, 0x1000), // A1
    (0x0400, 0x0020), // C2
    (0x0200, 0x2000), // A2
    (0x0100, 0x0040), // C4
    (0x0080, 0x4000), // A4
    (0x0020, 0x0100), // B1
    (0x0010, 0x0001), // D1
    (0x0008, 0x0200), // B2
    (0x0004, 0x0002), // D2
    (0x0002, 0x0400), // B4
    (0x0001, 0x0004), // D4
];

/// Gather the interleaved field bits into the A/B/C/D octal triads
pub fn gillham_field(raw: u16) -> u16 {
    GILLHAM_LAYOUT
        .iter()
        .fold(0, |code, &(field_bit, code_bit)| {
            if raw & field_bit != 0 {
                code | code_bit
            } else {
                code
            }
        })
}

/// Altitude for a Gillham-coded value, in hundreds of feet.
/// None for illegal codes.
pub fn gillham_to_feet(code: u16) -> Option<i32> {
    // zero bits must be zero, D1 must not be set, C1..C4 cannot all be clear
    if code & 0x8889 != 0 || code & 0x00f0 == 0 {
        return None;
    }

    // the C triad is a reflected code for the hundreds digit
    let mut hundreds: u32 = 0;
    for (bit, gray) in [(0x0010, 0x7), (0x0020, 0x3), (0x0040, 0x1)] {
        if code & bit != 0 {
            hundreds ^= gray;
        }
    }
    // 5 and 7 swap in the reflection
    if hundreds & 5 == 5 {
        hundreds ^= 2;
    }
    if hundreds > 5 {
        return None;
    }

    // D2 down to B4 form a Gray code counting 500 ft steps; D1 is never
    // used for altitude
    let mut five_hundreds: u32 = 0;
    for (bit, gray) in [
        (0x0002, 0x0ff), // D2
        (0x0004, 0x07f), // D4
        (0x1000, 0x03f), // A1
        (0x2000, 0x01f), // A2
        (0x4000, 0x00f), // A4
        (0x0100, 0x007), // B1
        (0x0200, 0x003), // B2
        (0x0400, 0x001), // B4
    ] {
        if code & bit != 0 {
            five_hundreds ^= gray;
        }
    }

    // odd five-hundred counts run the hundreds digit backwards
    if five_hundreds & 1 != 0 && hundreds <= 6 {
        hundreds = 6 - hundreds;
    }

    let n = five_hundreds * 5 + hundreds;
    // the scale starts at -1200 ft, the first 13 codes are illegal
    if n >= 13 {
        Some(n as i32 - 13)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squawk_from_field() {
        // A1, A2 and A4 set: a=7, b=c=d=0
        assert_eq!(Squawk::from_field(0x0A80).0, 7000);
        // all triads clear
        assert_eq!(Squawk::from_field(0x0000).0, 0);
        // the X bit contributes nothing
        assert_eq!(Squawk::from_field(0x0040).0, 0);
    }

    #[test]
    fn test_ac13_q_bit() {
        // Q=1, M=0: 25 ft steps offset by -1000; the count here is 768
        assert_eq!(decode_ac13(0x0C10), Some(18_200));
        // small counts would go below -1000 ft
        assert_eq!(decode_ac13(0x0010), None);
    }

    #[test]
    fn test_gillham_rejects_illegal_codes() {
        // C triad all clear
        assert_eq!(gillham_to_feet(0x0000), None);
        // D1 set
        assert_eq!(gillham_to_feet(0x0071), None);
    }

    #[test]
    fn test_icao_round_trip() {
        let icao: Icao = "40058b".parse().unwrap();
        assert_eq!(icao, Icao(0x40058B));
        assert_eq!(format!("{icao}"), "40058b");
    }
}
