use thiserror::Error;

/// Errors raised outside of frame decoding (decoding failures are
/// `DekuError` and are dropped as channel noise).
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal at startup: the scheduler is not running yet
    #[error("no RTL-SDR device could be opened")]
    NoDevice,

    /// A single failed read; the next period retries
    #[error("radio read failed: {0}")]
    ReadFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Fatal at startup: the requested rate is beyond the hardware
    #[error("rate multiplier {0} is beyond the RTL-SDR capabilities")]
    UnsupportedRateMultiplier(u32),

    /// Fatal at startup: an empty ACARS channel list
    #[error("at least one ACARS channel frequency is required")]
    NoChannels,

    /// Fatal at startup: the channels do not fit in the input bandwidth
    #[error("ACARS channel frequencies too far apart")]
    ChannelSpread,

    /// Fatal at startup: no centre frequency satisfies the constraints
    #[error("no suitable centre frequency for the ACARS channel set")]
    NoCentreFrequency,
}
