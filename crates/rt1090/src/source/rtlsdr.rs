use super::SampleSource;
use crate::demod;
use crate::error::Error;
use rtl_sdr_rs::{RtlSdr, TunerGain};
use tracing::{info, warn};

/// Maximum gain of the RTL-SDR tuners, in tenths of dB.
///
/// The backend does not expose the per-tuner gain list, so the highest
/// value supported by the R820T is requested; the driver clamps to the
/// nearest supported step.
const MAX_TUNER_GAIN: i32 = 496;

/// The RTL-SDR dongle behind the [`SampleSource`] façade.
///
/// Aircraft signals are weak, so the tuner is set to maximum gain with
/// hardware AGC left disabled.
pub struct RtlSdrSource {
    device: RtlSdr,
}

impl RtlSdrSource {
    pub fn open(index: usize) -> Result<Self, Error> {
        let mut device = RtlSdr::open(index).map_err(|e| {
            warn!("failed to open RTL-SDR device {index}: {e:?}");
            Error::NoDevice
        })?;

        device
            .set_tuner_gain(TunerGain::Manual(MAX_TUNER_GAIN))
            .map_err(|e| Error::ReadFailed(format!("{e:?}")))?;
        device
            .set_bias_tee(false)
            .map_err(|e| Error::ReadFailed(format!("{e:?}")))?;
        device
            .set_sample_rate(demod::RTLSDR_RATE)
            .map_err(|e| Error::ReadFailed(format!("{e:?}")))?;
        device
            .set_center_freq(demod::MODES_FREQ)
            .map_err(|e| Error::ReadFailed(format!("{e:?}")))?;
        device
            .reset_buffer()
            .map_err(|e| Error::ReadFailed(format!("{e:?}")))?;

        info!("RTL-SDR device {index} opened at maximum tuner gain");
        Ok(RtlSdrSource { device })
    }
}

impl SampleSource for RtlSdrSource {
    fn read(&mut self, freq_hz: u32, dst: &mut [u8]) -> Result<usize, Error> {
        // Retuning is synchronous; the source alternates between the ADS-B
        // and ACARS centre frequencies on successive calls.
        self.device
            .set_center_freq(freq_hz)
            .map_err(|e| Error::ReadFailed(format!("{e:?}")))?;

        let n = self
            .device
            .read_sync(dst)
            .map_err(|e| Error::ReadFailed(format!("{e:?}")))?;

        if n < dst.len() {
            warn!("partial read: {n} of {} bytes", dst.len());
        }
        Ok(n)
    }
}
