/**
 * ACARS channel placement and the integration contract for the external
 * MSK demodulator.
 *
 * The VHF channels all fit in one complex baseband capture; the centre
 * frequency is chosen so that every channel lands inside the usable
 * bandwidth, away from DC, and no two channels alias onto each other. The
 * demodulation itself happens behind [`AcarsDemodulator`], outside this
 * crate.
 */
use crate::error::Error;
use tracing::{info, warn};

/// Per-channel decimated sample rate, all frequencies are multiples of it
pub const INTRATE: u32 = 12_500;

/// Upper bound on simultaneously monitored channels
pub const MAX_CHANNELS: usize = 16;

/// Rate multipliers beyond this are outside the RTL-SDR capabilities
pub const RATE_MULT_MAX: u32 = 320;

/// 160 × 12 500 Hz = 2 MS/s, the safe RTL-SDR rate
pub const DEFAULT_RATE_MULT: u32 = 160;

/// Commonly active ACARS channels on the North American west coast
pub const DEFAULT_CHANNELS_MHZ: [f64; 3] = [131.475, 131.550, 131.725];

/// The second consumer of the sample stream; its DSP lives out of tree
pub trait AcarsDemodulator: Send {
    fn process(&mut self, samples: &[u8]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub index: usize,
    /// Channel frequency rounded to the nearest INTRATE multiple
    pub freq_hz: u32,
}

/// Channel set and capture placement for the ACARS stream
#[derive(Debug, Clone)]
pub struct AcarsContext {
    channels: Vec<Channel>,
    centre_freq: u32,
    input_rate: u32,
}

impl AcarsContext {
    /// Validate the channel set and place the capture centre frequency.
    ///
    /// All failure modes here are fatal: they are raised before the
    /// scheduler starts.
    pub fn new(freqs_mhz: &[f64], rate_mult: u32) -> Result<Self, Error> {
        if rate_mult > RATE_MULT_MAX {
            return Err(Error::UnsupportedRateMultiplier(rate_mult));
        }
        if freqs_mhz.is_empty() {
            return Err(Error::NoChannels);
        }
        let freqs_mhz = if freqs_mhz.len() > MAX_CHANNELS {
            warn!(
                "too many ACARS frequencies, using only the first {}",
                MAX_CHANNELS
            );
            &freqs_mhz[..MAX_CHANNELS]
        } else {
            freqs_mhz
        };

        let input_rate = INTRATE * rate_mult;

        let channels: Vec<Channel> = freqs_mhz
            .iter()
            .enumerate()
            .map(|(index, f)| Channel {
                index,
                freq_hz: ((1e6 * f) as u32 + INTRATE / 2) / INTRATE
                    * INTRATE,
            })
            .collect();

        let mut sorted: Vec<u32> =
            channels.iter().map(|c| c.freq_hz).collect();
        sorted.sort_unstable();

        let span = sorted[sorted.len() - 1] - sorted[0];
        if span > input_rate.saturating_sub(4 * INTRATE) {
            return Err(Error::ChannelSpread);
        }

        let centre_freq = choose_centre(&sorted, input_rate)?;
        info!("ACARS centre frequency: {centre_freq} Hz");

        Ok(AcarsContext {
            channels,
            centre_freq,
            input_rate,
        })
    }

    /// The frequency the radio is tuned to for the ACARS stream
    pub fn centre_frequency(&self) -> u32 {
        self.centre_freq
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }
}

/// Scan downward from `max(F) + 2·INTRATE` for a centre frequency such
/// that every channel is inside the usable bandwidth, at least 2·INTRATE
/// away from DC, and no two channels are equidistant from the centre.
fn choose_centre(sorted: &[u32], input_rate: u32) -> Result<u32, Error> {
    let lowest = sorted[0];
    let highest = sorted[sorted.len() - 1];

    let mut fc = highest + 2 * INTRATE;
    while fc + 2 * INTRATE > lowest {
        let suitable = sorted.iter().enumerate().all(|(n, &fd)| {
            let offset = fc.abs_diff(fd);
            offset < (input_rate / 2).saturating_sub(2 * INTRATE)
                && offset >= 2 * INTRATE
                && (n == 0
                    || i64::from(fc) - i64::from(sorted[n - 1])
                        != i64::from(fd) - i64::from(fc))
        });
        if suitable {
            return Ok(fc);
        }
        fc -= 1;
    }
    Err(Error::NoCentreFrequency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_placement() {
        let context =
            AcarsContext::new(&DEFAULT_CHANNELS_MHZ, DEFAULT_RATE_MULT)
                .unwrap();
        assert_eq!(context.centre_frequency(), 131_750_000);
        assert_eq!(context.input_rate(), 2_000_000);
        assert_eq!(
            context
                .channels()
                .iter()
                .map(|c| c.freq_hz)
                .collect::<Vec<_>>(),
            vec![131_475_000, 131_550_000, 131_725_000]
        );
    }

    #[test]
    fn test_placement_constraints_hold() {
        for freqs in [
            &[131.475, 131.550, 131.725][..],
            &[131.125, 131.425, 131.550][..],
            &[130.025][..],
        ] {
            let context =
                AcarsContext::new(freqs, DEFAULT_RATE_MULT).unwrap();
            let fc = context.centre_frequency();
            for channel in context.channels() {
                let offset = fc.abs_diff(channel.freq_hz);
                assert!(offset >= 2 * INTRATE);
                assert!(offset < context.input_rate() / 2 - 2 * INTRATE);
            }
        }
    }

    #[test]
    fn test_rejects_empty_channel_set() {
        assert!(matches!(
            AcarsContext::new(&[], DEFAULT_RATE_MULT),
            Err(Error::NoChannels)
        ));
    }

    #[test]
    fn test_rejects_excessive_rate_multiplier() {
        assert!(matches!(
            AcarsContext::new(&DEFAULT_CHANNELS_MHZ, 321),
            Err(Error::UnsupportedRateMultiplier(321))
        ));
    }

    #[test]
    fn test_rejects_wide_spread() {
        assert!(matches!(
            AcarsContext::new(&[130.0, 132.0], DEFAULT_RATE_MULT),
            Err(Error::ChannelSpread)
        ));
    }

    #[test]
    fn test_frequency_rounding() {
        // 131.482 MHz is not a multiple of 12.5 kHz: nearest is 131.4875
        let context =
            AcarsContext::new(&[131.482], DEFAULT_RATE_MULT).unwrap();
        assert_eq!(context.channels()[0].freq_hz, 131_487_500);
    }
}
