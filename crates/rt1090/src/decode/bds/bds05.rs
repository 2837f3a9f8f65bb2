use crate::decode::fields::{gillham_field, gillham_to_feet};
use deku::bitvec::{BitSlice, Msb0};
use deku::prelude::*;
use serde::Serialize;
use std::fmt;

/**
 * ## Airborne Position (BDS 0,5)
 *
 * with barometric altitude (TC=9..=18) or geometric height (TC=20..=22)
 *
 * | TC | SS | SAF | ALT | T | F | LAT-CPR | LON-CPR |
 * | -- | -- | --- | --- | - | - | ------- | ------- |
 * | 5  | 2  |  1  | 12  | 1 | 1 |   17    |   17    |
 */
#[derive(Debug, PartialEq, Serialize, DekuRead, Copy, Clone)]
pub struct AirbornePosition {
    #[deku(bits = "5")]
    #[serde(skip)]
    /// The typecode value (between 9 and 18 or between 20 and 22)
    pub tc: u8,

    #[serde(skip)]
    /// The surveillance status
    pub ss: SurveillanceStatus,

    #[deku(bits = "1")]
    #[serde(skip)]
    /// Single Antenna Flag (NIC supplement-b in ADS-B v2)
    pub saf: u8,

    #[deku(reader = "decode_ac12(deku::rest)")]
    #[serde(rename = "altitude")]
    /// The altitude in feet, encoded on 12 bits. None if unavailable.
    pub alt: Option<u16>,

    #[deku(reader = "read_source(deku::rest, *tc)")]
    /// The altitude source (GNSS or barometric)
    pub source: Source,

    #[deku(bits = "1")]
    #[serde(skip)]
    /// UTC sync or not
    pub t: bool,

    /// The CPR odd/even frame flag
    pub parity: CPRFormat,

    /// Raw CPR latitude on 17 bits
    #[deku(bits = "17", endian = "big")]
    pub lat_cpr: u32,

    /// Raw CPR longitude on 17 bits
    #[deku(bits = "17", endian = "big")]
    pub lon_cpr: u32,
}

/// A flag to qualify a CPR position as odd or even
#[derive(Debug, PartialEq, Eq, Serialize, DekuRead, Copy, Clone)]
#[deku(type = "u8", bits = "1")]
#[serde(rename_all = "snake_case")]
pub enum CPRFormat {
    Even = 0,
    Odd = 1,
}

impl fmt::Display for CPRFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Even => "even",
                Self::Odd => "odd",
            }
        )
    }
}

/// Decode the altitude value encoded on 12 bits (Q-bit format or Gillham)
fn decode_ac12(
    rest: &BitSlice<u8, Msb0>,
) -> Result<(&BitSlice<u8, Msb0>, Option<u16>), DekuError> {
    let (rest, num) =
        u16::read(rest, (deku::ctx::Endian::Big, deku::ctx::BitSize(12)))?;
    Ok((rest, ac12_to_feet(num)))
}

/// The altitude in feet for a 12-bit AC field, None when undecodable
pub fn ac12_to_feet(num: u16) -> Option<u16> {
    let q = num & 0x10;

    if q > 0 {
        // 11 bit integer resulting from the removal of bit Q
        let n = ((num & 0x0fe0) >> 1) | (num & 0x000f);
        let n = n * 25;
        if n > 1000 {
            Some(n - 1000) // 25 ft interval
        } else {
            None
        }
    } else {
        // 11 bit Gillham coded altitude, the Q-bit gap restored
        let code = gillham_field(((num & 0x0fc0) << 1) | (num & 0x003f));
        gillham_to_feet(code)
            .and_then(|hundreds| u16::try_from(hundreds * 100).ok())
    }
}

fn read_source(
    rest: &BitSlice<u8, Msb0>,
    tc: u8,
) -> Result<(&BitSlice<u8, Msb0>, Source), DekuError> {
    let source = if tc < 19 {
        Source::Barometric
    } else {
        Source::Gnss
    };
    Ok((rest, source))
}

#[derive(Debug, PartialEq, Eq, DekuRead, Serialize, Copy, Clone)]
#[deku(type = "u8", bits = "2")]
pub enum SurveillanceStatus {
    NoCondition = 0,
    PermanentAlert = 1,
    TemporaryAlert = 2,
    SPICondition = 3,
}

#[derive(Debug, PartialEq, Eq, Serialize, Copy, Clone)]
pub enum Source {
    #[serde(rename = "barometric")]
    Barometric = 0,
    #[serde(rename = "GNSS")]
    Gnss = 1,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Barometric => "barometric",
                Self::Gnss => "GNSS",
            }
        )
    }
}

impl fmt::Display for AirbornePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Airborne position (BDS 0,5)")?;
        let altitude = self.alt.map_or_else(
            || "None".to_string(),
            |altitude| format!("{altitude} ft"),
        );
        writeln!(f, "  Altitude:      {} {}", altitude, self.source)?;
        writeln!(f, "  CPR parity:    {}", self.parity)?;
        writeln!(f, "  CPR latitude:  ({})", self.lat_cpr)?;
        writeln!(f, "  CPR longitude: ({})", self.lon_cpr)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::adsb::ME;
    use crate::decode::{DownlinkFormat, Message};
    use hexlit::hex;

    #[test]
    fn test_airborne_position() {
        let bytes = hex!("8D40058B58C901375147EFD09357");
        let msg = Message::from_bytes((&bytes, 0)).unwrap().1;
        let DownlinkFormat::Adsb(squitter) = msg.df else {
            unreachable!()
        };
        let ME::BDS05(me) = squitter.message else {
            unreachable!()
        };
        assert_eq!(me.parity, CPRFormat::Even);
        assert_eq!(me.lat_cpr, 39848);
        assert_eq!(me.lon_cpr, 83951);
        assert_eq!(me.source, Source::Barometric);
    }

    #[test]
    fn test_ac12_q_bit() {
        // Q=1: 25 ft intervals, offset -1000
        assert_eq!(ac12_to_feet(0xC10), Some(37400));
        // low codes would be negative altitudes
        assert_eq!(ac12_to_feet(0x010), None);
    }
}
