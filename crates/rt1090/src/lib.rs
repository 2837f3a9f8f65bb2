#![doc = include_str!("../readme.md")]
pub mod acars;
pub mod decode;
pub mod demod;
pub mod error;
pub mod geo;
pub mod pool;
pub mod registry;
pub mod sched;
pub mod services;
pub mod source;

pub mod prelude {
    /// This re-export is necessary to decode messages
    pub use deku::prelude::*;

    pub use crate::decode::adsb::{Squitter, ME};
    pub use crate::decode::bds::bds05::AirbornePosition;
    pub use crate::decode::bds::bds08::AircraftIdentification;
    pub use crate::decode::bds::bds09::AirborneVelocity;
    /// The root structure to decode messages
    pub use crate::decode::Message;
    pub use crate::decode::{
        cpr::Position, AltitudeCode, Capability, DownlinkFormat,
        FlightStatus, Icao, Squawk,
    };
    pub use crate::error::Error;

    pub use crate::acars::{AcarsContext, AcarsDemodulator};
    pub use crate::pool::{buffer_pool, BLOCK_SIZE, POOL_CAPACITY};
    pub use crate::registry::{Aircraft, AircraftRegistry};
    pub use crate::sched::{Scheduler, ServiceConfig};
    pub use crate::services::{AcarsService, AdsbService, ReaderService};
    pub use crate::source::{FileSource, SampleSource};

    #[cfg(feature = "rtlsdr")]
    pub use crate::source::rtlsdr::RtlSdrSource;
}
