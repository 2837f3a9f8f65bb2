use rt1090::geo::MapProjection;
use rt1090::registry::Aircraft;

/// The map renderer contract: consume one registry snapshot per frame
pub trait Renderer {
    fn draw(&mut self, aircraft: &[Aircraft]);
}

/// A text renderer standing in for the graphical map window.
///
/// Aircraft with a resolved position are listed with the pixel coordinates
/// a raster renderer would place their icon at.
pub struct ConsoleRenderer {
    projection: MapProjection,
    last_fingerprint: u64,
}

impl ConsoleRenderer {
    pub fn new(projection: MapProjection) -> Self {
        ConsoleRenderer {
            projection,
            last_fingerprint: 0,
        }
    }
}

impl Renderer for ConsoleRenderer {
    fn draw(&mut self, aircraft: &[Aircraft]) {
        // redraw only when the table content changed
        let fingerprint = aircraft
            .iter()
            .fold(aircraft.len() as u64, |acc, a| {
                acc.wrapping_mul(31).wrapping_add(a.messages)
            });
        if fingerprint == self.last_fingerprint {
            return;
        }
        self.last_fingerprint = fingerprint;

        println!(
            "{:>6}  {:<8} {:>8} {:>6} {:>6} {:>10} {:>10} {:>6} {:>6}",
            "icao24", "callsign", "alt(ft)", "gs", "trk", "lat", "lon",
            "x", "y",
        );
        for a in aircraft {
            let (x, y) = match (a.latitude, a.longitude) {
                (Some(lat), Some(lon))
                    if self.projection.bounds.contains(lat, lon) =>
                {
                    let (x, y) = self.projection.latlon_to_pixel(lat, lon);
                    (format!("{x:.0}"), format!("{y:.0}"))
                }
                _ => (String::new(), String::new()),
            };
            println!(
                "{:>6}  {:<8} {:>8} {:>6} {:>6} {:>10} {:>10} {:>6} {:>6}",
                format!("{}", a.icao24),
                a.callsign.as_deref().unwrap_or(""),
                a.altitude.map(|v| v.to_string()).unwrap_or_default(),
                a.groundspeed
                    .map(|v| format!("{v:.0}"))
                    .unwrap_or_default(),
                a.track.map(|v| format!("{v:.0}")).unwrap_or_default(),
                a.latitude
                    .map(|v| format!("{v:.4}"))
                    .unwrap_or_default(),
                a.longitude
                    .map(|v| format!("{v:.4}"))
                    .unwrap_or_default(),
                x,
                y,
            );
        }
    }
}
