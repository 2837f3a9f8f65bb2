mod render;

use clap::Parser;
use render::{ConsoleRenderer, Renderer};
use rt1090::acars::{
    AcarsContext, AcarsDemodulator, DEFAULT_RATE_MULT,
};
use rt1090::geo::{MapBounds, MapProjection};
use rt1090::pool::{buffer_pool, BLOCK_SIZE, POOL_CAPACITY};
use rt1090::registry::AircraftRegistry;
use rt1090::sched::{Scheduler, ServiceConfig};
use rt1090::services::{AcarsService, AdsbService, ReaderService};
use rt1090::source::{FileSource, SampleSource};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "radar1090",
    version,
    about = "Real-time aircraft detection and plotting from an RTL-SDR"
)]
struct Options {
    /// Replay a raw 8-bit I/Q capture instead of reading from the radio
    #[arg(short, long, default_value = None)]
    file: Option<PathBuf>,

    /// ACARS channel frequencies, in MHz
    #[arg(long = "acars-channel", default_values_t = vec![131.475, 131.550, 131.725])]
    acars_channels: Vec<f64>,

    /// Remove aircraft unseen for this many seconds
    #[arg(long, short = 'x', default_value = "60")]
    expire: u64,

    /// Refresh period of the console display, in milliseconds
    #[arg(long, default_value = "500")]
    refresh: u64,

    /// Dump the final aircraft table as JSON instead of text
    #[arg(long, default_value = "false")]
    json: bool,
}

/// Default service set: reader on its own core, both decoders sharing one
const READER: (usize, i32, u32) = (2, 99, 300);
const PROCESS_ADSB: (usize, i32, u32) = (1, 99, 140);
const PROCESS_ACARS: (usize, i32, u32) = (1, 98, 150);

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_sigint(_signal: libc::c_int) {
    // async-signal-safe: a single atomic store
    RUNNING.store(false, Ordering::Release);
}

fn install_sigint_handler() {
    let handler: extern "C" fn(libc::c_int) = handle_sigint;
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

/// Stands in for the external ACARS MSK demodulator
struct AcarsBlockSink {
    blocks: u64,
}

impl AcarsDemodulator for AcarsBlockSink {
    fn process(&mut self, samples: &[u8]) {
        self.blocks += 1;
        debug!(
            "ACARS block {} received ({} bytes)",
            self.blocks,
            samples.len()
        );
    }
}

fn open_source(
    options: &Options,
) -> Result<Box<dyn SampleSource + Send>, Box<dyn std::error::Error>> {
    if let Some(path) = &options.file {
        return Ok(Box::new(FileSource::open(path)?));
    }
    #[cfg(feature = "rtlsdr")]
    {
        Ok(Box::new(rt1090::source::rtlsdr::RtlSdrSource::open(0)?))
    }
    #[cfg(not(feature = "rtlsdr"))]
    {
        Err("compiled without RTL-SDR support, use --file <capture>".into())
    }
}

fn dump_aircraft(registry: &AircraftRegistry, json: bool) {
    let aircraft = registry.snapshot();
    if json {
        match serde_json::to_string_pretty(&aircraft) {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("failed to serialise aircraft: {e}"),
        }
        return;
    }
    for a in &aircraft {
        println!("X-----------------------------------------------------X");
        println!("    ICAO Addr : {}", a.icao24);
        if let Some(callsign) = &a.callsign {
            println!("    Callsign  : {callsign}");
        }
        if let Some(altitude) = a.altitude {
            println!("    Altitude  : {altitude} feet");
        }
        if let (Some(lat), Some(lon)) = (a.latitude, a.longitude) {
            println!("    Latitude  : {lat:.6}");
            println!("    Longitude : {lon:.6}");
        }
        println!("    Messages  : {}", a.messages);
    }
    println!("{} aircraft tracked", aircraft.len());
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = Options::parse();

    // All fatal configuration errors surface before the scheduler starts
    let acars_context =
        AcarsContext::new(&options.acars_channels, DEFAULT_RATE_MULT)?;
    let source = open_source(&options)?;

    let (adsb_tx, adsb_rx) = buffer_pool(POOL_CAPACITY, BLOCK_SIZE);
    let (acars_tx, acars_rx) = buffer_pool(POOL_CAPACITY, BLOCK_SIZE);
    let registry = Arc::new(AircraftRegistry::new());

    let mut reader = ReaderService::new(
        source,
        adsb_tx,
        acars_tx,
        acars_context.centre_frequency(),
    );
    let mut adsb = AdsbService::new(
        adsb_rx,
        registry.clone(),
        Duration::from_secs(options.expire),
    );
    let mut acars =
        AcarsService::new(acars_rx, Box::new(AcarsBlockSink { blocks: 0 }));

    let mut scheduler = Scheduler::new();
    scheduler.add_service(
        ServiceConfig {
            name: "reader".to_string(),
            affinity: READER.0,
            priority: READER.1,
            period: READER.2,
        },
        move || reader.run_once(),
    );
    scheduler.add_service(
        ServiceConfig {
            name: "processAdsb".to_string(),
            affinity: PROCESS_ADSB.0,
            priority: PROCESS_ADSB.1,
            period: PROCESS_ADSB.2,
        },
        move || adsb.run_once(),
    );
    scheduler.add_service(
        ServiceConfig {
            name: "processAcars".to_string(),
            affinity: PROCESS_ACARS.0,
            priority: PROCESS_ACARS.1,
            period: PROCESS_ACARS.2,
        },
        move || acars.run_once(),
    );
    scheduler.start();

    install_sigint_handler();
    println!("Press Ctrl+C to terminate the program...");

    // The renderer is driven by the main thread, outside the scheduler
    let projection = MapProjection::new(MapBounds::default(), 750, 800);
    let mut renderer = ConsoleRenderer::new(projection);
    while RUNNING.load(Ordering::Acquire) {
        renderer.draw(&registry.snapshot());
        thread::sleep(Duration::from_millis(options.refresh));
    }

    println!("\nStopping services...");
    scheduler.stop();
    for report in scheduler.reports() {
        println!("{report}");
    }
    dump_aircraft(&registry, options.json);
    println!("Exiting, bye!");
    Ok(())
}
