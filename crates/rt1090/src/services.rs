/**
 * The periodic services released by the scheduler.
 *
 * The Reader service owns the radio and performs two blocking reads per
 * release, one per stream; each decoder service drains its own pool, one
 * buffer per release. An empty pool is a no-op, a full pool drops the
 * incoming sample set; both are the expected steady state of a consumer
 * and producer running at different cadences.
 */
use crate::acars::AcarsDemodulator;
use crate::decode::time::now_in_ms;
use crate::decode::Message;
use crate::demod;
use crate::pool::{Consumer, Producer};
use crate::registry::AircraftRegistry;
use crate::source::SampleSource;
use deku::DekuContainerRead;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

/// Serialises the ADS-B and ACARS reads on the shared radio
pub struct ReaderService {
    source: Box<dyn SampleSource + Send>,
    adsb: Producer,
    acars: Producer,
    acars_freq: u32,
    dropped: u64,
}

impl ReaderService {
    pub fn new(
        source: Box<dyn SampleSource + Send>,
        adsb: Producer,
        acars: Producer,
        acars_freq: u32,
    ) -> Self {
        ReaderService {
            source,
            adsb,
            acars,
            acars_freq,
            dropped: 0,
        }
    }

    /// One release: read the ADS-B block, then the ACARS block
    pub fn run_once(&mut self) {
        fill(
            &mut self.adsb,
            self.source.as_mut(),
            demod::MODES_FREQ,
            "adsb",
            &mut self.dropped,
        );
        fill(
            &mut self.acars,
            self.source.as_mut(),
            self.acars_freq,
            "acars",
            &mut self.dropped,
        );
    }

    /// Sample sets discarded because a pool was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

fn fill(
    producer: &mut Producer,
    source: &mut dyn SampleSource,
    freq_hz: u32,
    stream: &str,
    dropped: &mut u64,
) {
    let published = match producer.acquire_head() {
        Some(slot) => match source.read(freq_hz, &mut slot.bytes) {
            Ok(n) => {
                slot.filled = n;
                true
            }
            Err(e) => {
                // recoverable: the next period retries
                warn!("{stream}: radio read failed: {e}");
                false
            }
        },
        None => {
            *dropped += 1;
            trace!("{stream}: pool full, sample set discarded");
            false
        }
    };
    if published {
        producer.publish();
    }
}

/// Demodulates and decodes one ADS-B buffer per release
pub struct AdsbService {
    pool: Consumer,
    registry: Arc<AircraftRegistry>,
    max_age: Duration,
    frames_decoded: u64,
    frames_rejected: u64,
}

impl AdsbService {
    pub fn new(
        pool: Consumer,
        registry: Arc<AircraftRegistry>,
        max_age: Duration,
    ) -> Self {
        AdsbService {
            pool,
            registry,
            max_age,
            frames_decoded: 0,
            frames_rejected: 0,
        }
    }

    pub fn run_once(&mut self) {
        let now = now_in_ms();
        let consumed = match self.pool.peek_tail() {
            Some(buffer) => {
                if buffer.filled > 0 {
                    let samples = demod::iq_samples(buffer.samples());
                    let mut magnitudes = demod::magnitude(&samples);
                    for frame in demod::detect_modes(&mut magnitudes) {
                        match Message::from_bytes((frame.bytes(), 0)) {
                            Ok((_, message)) => {
                                self.frames_decoded += 1;
                                trace!(
                                    "frame {} {message}",
                                    hex::encode(frame.bytes())
                                );
                                self.registry.upsert(now, &message);
                            }
                            Err(_) => {
                                // CRC failure or unhandled format: noise
                                self.frames_rejected += 1;
                            }
                        }
                    }
                }
                true
            }
            None => false,
        };
        if consumed {
            self.pool.release();
        }
        self.registry.sweep(now, self.max_age);
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }
}

/// Feeds one ACARS buffer per release to the external demodulator
pub struct AcarsService {
    pool: Consumer,
    demodulator: Box<dyn AcarsDemodulator>,
}

impl AcarsService {
    pub fn new(pool: Consumer, demodulator: Box<dyn AcarsDemodulator>) -> Self {
        AcarsService { pool, demodulator }
    }

    pub fn run_once(&mut self) {
        let consumed = match self.pool.peek_tail() {
            Some(buffer) => {
                if buffer.filled > 0 {
                    self.demodulator.process(buffer.samples());
                }
                true
            }
            None => false,
        };
        if consumed {
            self.pool.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pool::buffer_pool;

    struct PatternSource {
        fills: u8,
        fail: bool,
    }

    impl SampleSource for PatternSource {
        fn read(
            &mut self,
            _freq_hz: u32,
            dst: &mut [u8],
        ) -> Result<usize, Error> {
            if self.fail {
                return Err(Error::ReadFailed("synthetic".to_string()));
            }
            dst.fill(self.fills);
            self.fills = self.fills.wrapping_add(1);
            Ok(dst.len())
        }
    }

    #[test]
    fn test_reader_publishes_both_streams() {
        let (adsb_tx, mut adsb_rx) = buffer_pool(4, 32);
        let (acars_tx, mut acars_rx) = buffer_pool(4, 32);
        let source = PatternSource {
            fills: 7,
            fail: false,
        };
        let mut reader = ReaderService::new(
            Box::new(source),
            adsb_tx,
            acars_tx,
            131_750_000,
        );

        reader.run_once();

        let adsb = adsb_rx.peek_tail().unwrap();
        assert_eq!(adsb.filled, 32);
        assert_eq!(adsb.bytes[0], 7);
        let acars = acars_rx.peek_tail().unwrap();
        assert_eq!(acars.bytes[0], 8);
        assert_eq!(reader.dropped(), 0);
    }

    #[test]
    fn test_reader_drops_on_full_pool() {
        let (adsb_tx, _adsb_rx) = buffer_pool(2, 16);
        let (acars_tx, _acars_rx) = buffer_pool(2, 16);
        let source = PatternSource {
            fills: 0,
            fail: false,
        };
        let mut reader = ReaderService::new(
            Box::new(source),
            adsb_tx,
            acars_tx,
            131_750_000,
        );

        for _ in 0..4 {
            reader.run_once();
        }
        // both pools were full for the two last releases
        assert_eq!(reader.dropped(), 4);
    }

    #[test]
    fn test_reader_does_not_publish_on_error() {
        let (adsb_tx, adsb_rx) = buffer_pool(4, 16);
        let (acars_tx, acars_rx) = buffer_pool(4, 16);
        let source = PatternSource {
            fills: 0,
            fail: true,
        };
        let mut reader = ReaderService::new(
            Box::new(source),
            adsb_tx,
            acars_tx,
            131_750_000,
        );

        reader.run_once();
        assert!(adsb_rx.is_empty());
        assert!(acars_rx.is_empty());
    }

    #[test]
    fn test_adsb_service_empty_pool_is_noop() {
        let (_tx, rx) = buffer_pool(2, 16);
        let registry = Arc::new(AircraftRegistry::new());
        let mut service =
            AdsbService::new(rx, registry.clone(), Duration::from_secs(60));
        service.run_once();
        assert!(registry.is_empty());
        assert_eq!(service.frames_decoded(), 0);
    }
}
