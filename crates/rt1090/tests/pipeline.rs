/**
 * End-to-end: raw I/Q bytes through the buffer pool, the demodulator, the
 * decoder and into the aircraft registry, without any radio hardware.
 */
use hexlit::hex;
use rt1090::acars::AcarsDemodulator;
use rt1090::demod;
use rt1090::error::Error;
use rt1090::pool::buffer_pool;
use rt1090::registry::AircraftRegistry;
use rt1090::services::{AcarsService, AdsbService, ReaderService};
use rt1090::source::SampleSource;
use std::sync::Arc;
use std::time::Duration;

/// I/Q pair mapping to a strong magnitude (|I|=8, |Q|=0 → 2880)
const PULSE: [u8; 2] = [135, 127];
/// I/Q pair mapping to zero magnitude
const QUIET: [u8; 2] = [127, 127];

/// Encode Mode S frames as an interleaved I/Q byte stream
fn synthesize_iq(frames: &[&[u8]]) -> Vec<u8> {
    let mut iq = Vec::new();
    for frame in frames {
        // lead-in
        for _ in 0..16 {
            iq.extend_from_slice(&QUIET);
        }
        // four-pulse preamble at sample offsets 0, 2, 7, 9
        for k in 0..16 {
            if matches!(k, 0 | 2 | 7 | 9) {
                iq.extend_from_slice(&PULSE);
            } else {
                iq.extend_from_slice(&QUIET);
            }
        }
        // two samples per bit, high first for a one
        for byte in *frame {
            for bit in (0..8).rev() {
                if byte & (1 << bit) != 0 {
                    iq.extend_from_slice(&PULSE);
                    iq.extend_from_slice(&QUIET);
                } else {
                    iq.extend_from_slice(&QUIET);
                    iq.extend_from_slice(&PULSE);
                }
            }
        }
    }
    // scan margin past the last message
    for _ in 0..300 {
        iq.extend_from_slice(&QUIET);
    }
    iq
}

/// Plays one capture on the ADS-B frequency, silence on the ACARS one
struct CaptureSource {
    iq: Vec<u8>,
}

impl SampleSource for CaptureSource {
    fn read(&mut self, freq_hz: u32, dst: &mut [u8]) -> Result<usize, Error> {
        if freq_hz == demod::MODES_FREQ {
            let n = dst.len().min(self.iq.len());
            dst[..n].copy_from_slice(&self.iq[..n]);
            Ok(n)
        } else {
            dst.fill(127);
            Ok(dst.len())
        }
    }
}

struct BlockCounter {
    blocks: Arc<std::sync::atomic::AtomicU64>,
}

impl AcarsDemodulator for BlockCounter {
    fn process(&mut self, samples: &[u8]) {
        assert!(!samples.is_empty());
        self.blocks
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}

#[test]
fn test_iq_to_tracked_aircraft() {
    let even = hex!("8D40058B58C901375147EFD09357");
    let odd = hex!("8D40058B58C904A87F402D3B8C59");
    let iq = synthesize_iq(&[&even, &odd]);
    let block_size = iq.len();

    let (adsb_tx, adsb_rx) = buffer_pool(8, block_size);
    let (acars_tx, acars_rx) = buffer_pool(8, block_size);
    let registry = Arc::new(AircraftRegistry::new());

    let mut reader = ReaderService::new(
        Box::new(CaptureSource { iq }),
        adsb_tx,
        acars_tx,
        131_750_000,
    );
    let mut adsb = AdsbService::new(
        adsb_rx,
        registry.clone(),
        Duration::from_secs(3600),
    );
    let blocks = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let mut acars = AcarsService::new(
        acars_rx,
        Box::new(BlockCounter {
            blocks: blocks.clone(),
        }),
    );

    reader.run_once();
    adsb.run_once();
    acars.run_once();

    assert!(adsb.frames_decoded() >= 2);

    let all = registry.snapshot();
    assert_eq!(all.len(), 1);
    let aircraft = &all[0];
    assert_eq!(format!("{}", aircraft.icao24), "40058b");
    assert!(aircraft.position_known());

    let latitude = aircraft.latitude.unwrap();
    let longitude = aircraft.longitude.unwrap();
    assert!((latitude - 49.81755).abs() < 1e-3);
    assert!((longitude - 6.08442).abs() < 1e-3);

    assert_eq!(blocks.load(std::sync::atomic::Ordering::Relaxed), 1);
}

#[test]
fn test_corrupted_frame_is_dropped() {
    let mut corrupted = hex!("8D40058B58C901375147EFD09357");
    corrupted[5] ^= 0x10;
    let iq = synthesize_iq(&[&corrupted]);
    let block_size = iq.len();

    let (adsb_tx, adsb_rx) = buffer_pool(8, block_size);
    let (acars_tx, _acars_rx) = buffer_pool(8, block_size);
    let registry = Arc::new(AircraftRegistry::new());

    let mut reader = ReaderService::new(
        Box::new(CaptureSource { iq }),
        adsb_tx,
        acars_tx,
        131_750_000,
    );
    let mut adsb = AdsbService::new(
        adsb_rx,
        registry.clone(),
        Duration::from_secs(3600),
    );

    reader.run_once();
    adsb.run_once();

    assert_eq!(adsb.frames_decoded(), 0);
    assert!(adsb.frames_rejected() >= 1);
    assert!(registry.is_empty());
}
