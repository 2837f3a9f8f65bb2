use super::bds::{bds05, bds08, bds09};
use super::fields::{Capability, Icao};
use deku::prelude::*;
use std::fmt;

/**
 * The DF 17 extended squitter: 112 bits, five parts.
 *
 * +----------+----------+-------------+------------------------+-----------+
 * |  DF (5)  |  CA (3)  |  ICAO (24)  |         ME (56)        |  PI (24)  |
 * +----------+----------+-------------+------------------------+-----------+
 *
 * Unlike the interrogation replies, the address is broadcast in clear and
 * the parity field is pure parity, so the frame is self-contained.
 */
#[derive(Debug, PartialEq, DekuRead, Clone)]
pub struct Squitter {
    pub capability: Capability,

    /// ICAO airframe address, broadcast in clear
    pub address: Icao,

    /// The 56-bit ME field, dispatched on its five-bit typecode
    pub message: ME,

    /// Parity/Interrogator ID
    pub parity: Icao,
}

impl fmt::Display for Squitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DF 17: ADS-B message.")?;
        writeln!(f, "  ICAO Address   : {}", self.address)?;
        writeln!(f, "  Air/Ground     : {}", self.capability)?;
        write!(f, "{}", self.message)
    }
}

/**
 * The extended squitter payload, keyed by typecode:
 *
 * | typecode | content                                |
 * | -------- | -------------------------------------- |
 * | 1..=4    | aircraft identification ([`ME::BDS08`]) |
 * | 9..=18   | airborne position, barometric altitude |
 * | 19       | airborne velocity ([`ME::BDS09`])       |
 * | 20..=22  | airborne position, GNSS height         |
 *
 * Surface positions (5..=8) and the remaining typecodes are passed over
 * undecoded.
 */
#[derive(Debug, PartialEq, DekuRead, Clone)]
#[deku(type = "u8", bits = "5")]
pub enum ME {
    #[deku(id_pat = "0")]
    NoPosition(#[deku(bits = "56")] u64),

    #[deku(id_pat = "1..=4")]
    BDS08(bds08::AircraftIdentification),

    #[deku(id_pat = "5..=8")]
    SurfacePosition(#[deku(bits = "56")] u64),

    #[deku(id_pat = "9..=18 | 20..=22")]
    BDS05(bds05::AirbornePosition),

    #[deku(id = "19")]
    BDS09(bds09::AirborneVelocity),

    #[deku(id_pat = "23..=31")]
    Unsupported(#[deku(bits = "56")] u64),
}

impl fmt::Display for ME {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ME::NoPosition(_)
            | ME::SurfacePosition(_)
            | ME::Unsupported(_) => Ok(()),
            ME::BDS05(me) => write!(f, "{me}"),
            ME::BDS08(me) => write!(f, "{me}"),
            ME::BDS09(me) => write!(f, "{me}"),
        }
    }
}
