pub mod adsb;
pub mod bds;
pub mod cpr;
pub mod crc;
pub mod fields;
pub mod time;

use adsb::Squitter;
use crc::modes_checksum;
use deku::bitvec::{BitSlice, Msb0};
use deku::prelude::*;
use std::fmt;

pub use fields::{AltitudeCode, Capability, FlightStatus, Icao, Squawk};

use fields::AddressParity;

/**
 * The Downlink Formats this receiver understands.
 *
 * The five leading bits of every frame carry the format number, which also
 * fixes the frame length: 56 bits below DF 16, 112 bits from there on.
 * Only the formats carrying position, altitude or identity are decoded:
 *
 * - DF 0 and 16: air-air surveillance, short and long, with an altitude;
 * - DF 4 and 20: altitude replies to ground interrogation;
 * - DF 5 and 21: identity (squawk) replies;
 * - DF 11: the all-call reply announcing an airframe address;
 * - DF 17: the extended squitter carrying ADS-B ([`Squitter`]);
 * - DF 19: military extended squitter, length acknowledged, not decoded.
 *
 * Anything else fails decoding and is dropped as channel noise.
 */
#[derive(Debug, PartialEq, DekuRead, Clone)]
#[deku(type = "u8", bits = "5", ctx = "crc: u32")]
pub enum DownlinkFormat {
    #[deku(id = "0")]
    AirAirShort {
        /// Vertical status: set when on the ground
        #[deku(bits = "1")]
        vertical_status: u8,
        /// Crosslink, sensitivity level and reply information
        #[deku(bits = "13")]
        control: u16,
        altitude: AltitudeCode,
        #[deku(ctx = "crc")]
        address: AddressParity,
    },

    #[deku(id = "4")]
    AltitudeReply {
        fs: FlightStatus,
        /// Downlink request
        #[deku(bits = "5")]
        dr: u8,
        /// Utility message
        #[deku(bits = "6")]
        um: u8,
        altitude: AltitudeCode,
        #[deku(ctx = "crc")]
        address: AddressParity,
    },

    #[deku(id = "5")]
    IdentityReply {
        fs: FlightStatus,
        #[deku(bits = "5")]
        dr: u8,
        #[deku(bits = "6")]
        um: u8,
        squawk: Squawk,
        #[deku(ctx = "crc")]
        address: AddressParity,
    },

    #[deku(id = "11")]
    AllCall {
        capability: Capability,
        address: Icao,
        /// Parity overlaid with the interrogator identifier
        interrogator: Icao,
    },

    #[deku(id = "16")]
    AirAirLong {
        #[deku(bits = "1")]
        vertical_status: u8,
        #[deku(bits = "13")]
        control: u16,
        altitude: AltitudeCode,
        /// ACAS resolution advisory payload, left undecoded
        #[deku(count = "7")]
        acas: Vec<u8>,
        #[deku(ctx = "crc")]
        address: AddressParity,
    },

    #[deku(id = "17")]
    Adsb(Squitter),

    #[deku(id = "19")]
    Military {
        #[deku(bits = "3")]
        application: u8,
    },

    #[deku(id = "20")]
    CommBAltitude {
        fs: FlightStatus,
        #[deku(bits = "5")]
        dr: u8,
        #[deku(bits = "6")]
        um: u8,
        altitude: AltitudeCode,
        /// Comm-B register contents, left undecoded
        #[deku(count = "7")]
        comm_b: Vec<u8>,
        #[deku(ctx = "crc")]
        address: AddressParity,
    },

    #[deku(id = "21")]
    CommBIdentity {
        fs: FlightStatus,
        #[deku(bits = "5")]
        dr: u8,
        #[deku(bits = "6")]
        um: u8,
        squawk: Squawk,
        #[deku(count = "7")]
        comm_b: Vec<u8>,
        #[deku(ctx = "crc")]
        address: AddressParity,
    },
}

/// Frame length in bits for a format number: long from DF 16 upward
fn frame_bits(df: u8) -> usize {
    if df & 0x10 != 0 {
        112
    } else {
        56
    }
}

/// A decoded Mode S frame: the entry point of the decoding layer.
///
/// `Message::from_bytes` verifies the CRC over the whole frame before any
/// field is extracted, so every value handed out downstream comes from a
/// frame that passed the parity check (or, for the address/parity formats,
/// one whose syndrome is reinterpreted as the airframe address).
#[derive(Debug, PartialEq, DekuRead, Clone)]
pub struct Message {
    /// 24-bit syndrome of the whole frame: 0 for a valid DF 11/17, the
    /// airframe address for the address/parity formats
    #[deku(reader = "Self::verify(deku::input_bits)")]
    pub crc: u32,

    #[deku(ctx = "*crc")]
    pub df: DownlinkFormat,
}

impl Message {
    /// One pass over the full input before field extraction starts.
    ///
    /// The frame length follows from the format number in the first five
    /// bits; a DF 17 frame with a nonzero syndrome is corrupt and decoding
    /// stops here.
    fn verify(
        input: &BitSlice<u8, Msb0>,
    ) -> Result<(&BitSlice<u8, Msb0>, u32), DekuError> {
        let (_, frame, _) = input
            .domain()
            .region()
            .ok_or_else(|| DekuError::Assertion("empty frame".into()))?;

        let df = frame[0] >> 3;
        let syndrome = modes_checksum(frame, frame_bits(df))?;

        if df == 17 && syndrome != 0 {
            return Err(DekuError::Assertion(format!(
                "ADS-B frame with syndrome {syndrome:06x}"
            )));
        }
        Ok((input, syndrome))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.df {
            DownlinkFormat::AirAirShort {
                altitude, address, ..
            } => {
                writeln!(f, "DF 0: Short Air-Air Surveillance.")?;
                if let Some(feet) = altitude.feet() {
                    writeln!(f, "  Altitude       : {feet} feet")?;
                }
                writeln!(f, "  ICAO Address   : {address}")?;
            }
            DownlinkFormat::AltitudeReply {
                fs,
                altitude,
                address,
                ..
            } => {
                writeln!(f, "DF 4: Surveillance, Altitude Reply.")?;
                writeln!(f, "  Flight Status  : {fs}")?;
                if let Some(feet) = altitude.feet() {
                    writeln!(f, "  Altitude       : {feet} feet")?;
                }
                writeln!(f, "  ICAO Address   : {address}")?;
            }
            DownlinkFormat::IdentityReply {
                fs,
                squawk,
                address,
                ..
            } => {
                writeln!(f, "DF 5: Surveillance, Identity Reply.")?;
                writeln!(f, "  Flight Status  : {fs}")?;
                writeln!(f, "  Squawk         : {squawk}")?;
                writeln!(f, "  ICAO Address   : {address}")?;
            }
            DownlinkFormat::AllCall {
                capability,
                address,
                ..
            } => {
                writeln!(f, "DF 11: All Call Reply.")?;
                writeln!(f, "  Capability     : {capability}")?;
                writeln!(f, "  ICAO Address   : {address}")?;
            }
            DownlinkFormat::AirAirLong {
                altitude, address, ..
            } => {
                writeln!(f, "DF 16: Long Air-Air Surveillance.")?;
                if let Some(feet) = altitude.feet() {
                    writeln!(f, "  Altitude       : {feet} feet")?;
                }
                writeln!(f, "  ICAO Address   : {address}")?;
            }
            DownlinkFormat::Adsb(squitter) => {
                write!(f, "{squitter}")?;
            }
            DownlinkFormat::Military { .. } => {
                writeln!(f, "DF 19: Military Extended Squitter.")?;
            }
            DownlinkFormat::CommBAltitude {
                fs,
                altitude,
                address,
                ..
            } => {
                writeln!(f, "DF 20: Comm-B, Altitude Reply.")?;
                writeln!(f, "  Flight Status  : {fs}")?;
                if let Some(feet) = altitude.feet() {
                    writeln!(f, "  Altitude       : {feet} feet")?;
                }
                writeln!(f, "  ICAO Address   : {address}")?;
            }
            DownlinkFormat::CommBIdentity {
                fs,
                squawk,
                address,
                ..
            } => {
                writeln!(f, "DF 21: Comm-B, Identity Reply.")?;
                writeln!(f, "  Flight Status  : {fs}")?;
                writeln!(f, "  Squawk         : {squawk}")?;
                writeln!(f, "  ICAO Address   : {address}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;

    #[test]
    fn test_altitude_reply() {
        let bytes = hex!("a0001910cc300030aa0000eae004");
        let msg = Message::from_bytes((&bytes, 0)).unwrap().1;
        match msg.df {
            DownlinkFormat::CommBAltitude { altitude, .. } => {
                assert_eq!(altitude.feet(), Some(39_000));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_address_from_parity() {
        // the syndrome of an address/parity frame is the airframe address
        let bytes = hex!("a0001910cc300030aa0000eae004");
        let msg = Message::from_bytes((&bytes, 0)).unwrap().1;
        assert_eq!(msg.crc, 0x020176);
        match msg.df {
            DownlinkFormat::CommBAltitude { address, .. } => {
                assert_eq!(format!("{address}"), "020176");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_invalid_crc() {
        let bytes = hex!("8d4ca251204994b1c36e60a5343d");
        match Message::from_bytes((&bytes, 0)) {
            Err(DekuError::Assertion(_)) => (),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_idempotent_decoding() {
        let bytes = hex!("8D406B902015A678D4D220AA4BDA");
        let first = Message::from_bytes((&bytes, 0)).unwrap().1;
        let second = Message::from_bytes((&bytes, 0)).unwrap().1;
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        // DF 24 (Comm-D) is outside the decoded set
        let bytes = hex!("c0001910cc300030aa0000eae004");
        assert!(Message::from_bytes((&bytes, 0)).is_err());
    }
}
