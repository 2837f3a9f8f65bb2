/**
 * The live table of tracked aircraft.
 *
 * The registry is mutated only by the ADS-B decoder service; the renderer
 * reads it through [`AircraftRegistry::snapshot`], a copy taken under the
 * lock so a consistent view is produced while decoding continues.
 *
 * An aircraft enters the table with its first airborne-position message;
 * identification and velocity messages enrich aircraft already tracked.
 */
use crate::decode::adsb::ME;
use crate::decode::bds::bds05::CPRFormat;
use crate::decode::bds::bds09::AirborneVelocitySubType;
use crate::decode::cpr::{airborne_position, CprFrame, CPR_TIMEOUT_MS};
use crate::decode::{DownlinkFormat, Icao, Message};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::trace;

/// The state tracked for one airframe, keyed by its ICAO address
#[derive(Debug, Clone, Serialize)]
pub struct Aircraft {
    pub icao24: Icao,
    /// Milliseconds since the epoch
    pub first_seen: u64,
    pub last_seen: u64,
    pub callsign: Option<String>,
    /// Barometric altitude in feet
    pub altitude: Option<u16>,
    pub groundspeed: Option<f64>,
    pub track: Option<f64>,
    /// Decoded from the most recent odd/even CPR pair
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Number of Mode S messages received from this aircraft
    pub messages: u64,

    #[serde(skip)]
    even: Option<CprFrame>,
    #[serde(skip)]
    odd: Option<CprFrame>,
}

impl Aircraft {
    fn new(icao24: Icao, now_ms: u64) -> Self {
        Aircraft {
            icao24,
            first_seen: now_ms,
            last_seen: now_ms,
            callsign: None,
            altitude: None,
            groundspeed: None,
            track: None,
            latitude: None,
            longitude: None,
            messages: 0,
            even: None,
            odd: None,
        }
    }

    pub fn position_known(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

#[derive(Default)]
pub struct AircraftRegistry {
    aircraft: Mutex<HashMap<Icao, Aircraft>>,
}

impl AircraftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one decoded message into the table.
    ///
    /// `now_ms` is the reception time in milliseconds; it drives both the
    /// odd/even pairing window and the staleness sweep.
    pub fn upsert(&self, now_ms: u64, message: &Message) {
        let DownlinkFormat::Adsb(squitter) = &message.df else {
            return;
        };

        let mut aircraft = self.aircraft.lock().expect("registry poisoned");

        match &squitter.message {
            ME::BDS05(position) => {
                let entry = aircraft
                    .entry(squitter.address)
                    .or_insert_with(|| {
                        Aircraft::new(squitter.address, now_ms)
                    });
                entry.last_seen = now_ms;
                entry.messages += 1;
                entry.altitude = position.alt;

                let frame = CprFrame::from_message(position, now_ms);
                match position.parity {
                    CPRFormat::Even => entry.even = Some(frame),
                    CPRFormat::Odd => entry.odd = Some(frame),
                }

                if let (Some(even), Some(odd)) = (&entry.even, &entry.odd) {
                    if even.timestamp.abs_diff(odd.timestamp)
                        <= CPR_TIMEOUT_MS
                    {
                        if let Some(pos) = airborne_position(even, odd) {
                            trace!(
                                "{} at {:.4}, {:.4}",
                                entry.icao24,
                                pos.latitude,
                                pos.longitude
                            );
                            entry.latitude = Some(pos.latitude);
                            entry.longitude = Some(pos.longitude);
                        }
                    }
                }
            }
            ME::BDS08(identification) => {
                if let Some(entry) = aircraft.get_mut(&squitter.address) {
                    entry.callsign =
                        Some(identification.callsign.clone());
                    entry.last_seen = now_ms;
                    entry.messages += 1;
                }
            }
            ME::BDS09(velocity) => {
                if let Some(entry) = aircraft.get_mut(&squitter.address) {
                    if let AirborneVelocitySubType::GroundSpeedDecoding(
                        ground,
                    ) = &velocity.velocity
                    {
                        entry.groundspeed = Some(ground.groundspeed);
                        entry.track = Some(ground.track);
                    }
                    entry.last_seen = now_ms;
                    entry.messages += 1;
                }
            }
            _ => {}
        }
    }

    /// Drop every aircraft unseen for longer than `max_age`
    pub fn sweep(&self, now_ms: u64, max_age: Duration) {
        let max_age_ms = max_age.as_millis() as u64;
        self.aircraft
            .lock()
            .expect("registry poisoned")
            .retain(|_, a| now_ms.saturating_sub(a.last_seen) <= max_age_ms);
    }

    /// A consistent copy for the renderer, ordered by address
    pub fn snapshot(&self) -> Vec<Aircraft> {
        let mut all: Vec<Aircraft> = self
            .aircraft
            .lock()
            .expect("registry poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by_key(|a| a.icao24);
        all
    }

    pub fn len(&self) -> usize {
        self.aircraft.lock().expect("registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deku::DekuContainerRead;
    use hexlit::hex;

    fn message(bytes: &[u8]) -> Message {
        Message::from_bytes((bytes, 0)).unwrap().1
    }

    #[test]
    fn test_position_from_odd_even_pair() {
        let registry = AircraftRegistry::new();

        registry
            .upsert(1000, &message(&hex!("8D40058B58C901375147EFD09357")));
        {
            let all = registry.snapshot();
            assert_eq!(all.len(), 1);
            assert!(!all[0].position_known());
        }

        registry
            .upsert(2000, &message(&hex!("8D40058B58C904A87F402D3B8C59")));
        let all = registry.snapshot();
        let aircraft = &all[0];
        assert_eq!(format!("{}", aircraft.icao24), "40058b");
        assert!(aircraft.position_known());

        let latitude = aircraft.latitude.unwrap();
        let longitude = aircraft.longitude.unwrap();
        assert!((-90. ..90.).contains(&latitude));
        assert!((-180. ..=180.).contains(&longitude));
        assert!((latitude - 49.81755).abs() < 1e-3);
        assert!((longitude - 6.08442).abs() < 1e-3);
    }

    #[test]
    fn test_stale_pair_not_resolved() {
        let registry = AircraftRegistry::new();
        registry
            .upsert(1000, &message(&hex!("8D40058B58C901375147EFD09357")));
        // second frame arrives more than ten seconds later
        registry
            .upsert(12_001, &message(&hex!("8D40058B58C904A87F402D3B8C59")));
        assert!(!registry.snapshot()[0].position_known());
    }

    #[test]
    fn test_identification_does_not_create() {
        let registry = AircraftRegistry::new();
        registry
            .upsert(1000, &message(&hex!("8D406B902015A678D4D220AA4BDA")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_velocity_enriches_tracked_aircraft() {
        let registry = AircraftRegistry::new();
        registry
            .upsert(1000, &message(&hex!("8D48502058C901375147EF6DF62F")));
        registry
            .upsert(1100, &message(&hex!("8D485020994409940838175B284F")));
        let all = registry.snapshot();
        assert_eq!(all.len(), 1);
        let aircraft = &all[0];
        assert!(aircraft.groundspeed.is_some());
        assert!((aircraft.track.unwrap() - 182.88).abs() < 1e-2);
        assert_eq!(aircraft.messages, 2);
    }

    #[test]
    fn test_sweep_removes_stale_entries() {
        let registry = AircraftRegistry::new();
        registry
            .upsert(1000, &message(&hex!("8D40058B58C901375147EFD09357")));
        registry
            .upsert(8000, &message(&hex!("8D48502058C901375147EF6DF62F")));

        registry.sweep(12_000, Duration::from_secs(10));
        assert_eq!(registry.len(), 2);

        registry.sweep(60_000, Duration::from_secs(10));
        assert!(registry.is_empty());
    }
}
