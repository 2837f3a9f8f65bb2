#[cfg(feature = "rtlsdr")]
pub mod rtlsdr;

use crate::error::Error;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// The blocking read primitive the Reader service is built on.
///
/// The device is retuned to `freq_hz` before every read; both operations
/// are synchronous and the read only returns once `dst` is filled or the
/// device errors. A source is shared between the ADS-B and ACARS streams
/// and is therefore owned by a single service which serialises the reads.
pub trait SampleSource {
    fn read(&mut self, freq_hz: u32, dst: &mut [u8]) -> Result<usize, Error>;
}

/// Replay raw interleaved 8-bit I/Q captures from a file.
///
/// The capture rewinds at end of file so a short recording drives the
/// pipeline indefinitely.
pub struct FileSource {
    file: File,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        Ok(FileSource { file })
    }
}

impl SampleSource for FileSource {
    fn read(&mut self, freq_hz: u32, dst: &mut [u8]) -> Result<usize, Error> {
        let mut filled = 0;
        let mut rewound = false;
        while filled < dst.len() {
            let n = self.file.read(&mut dst[filled..])?;
            if n == 0 {
                if rewound && filled == 0 {
                    return Err(Error::ReadFailed("empty capture".into()));
                }
                debug!("end of capture, rewinding");
                self.file.seek(SeekFrom::Start(0))?;
                rewound = true;
                continue;
            }
            rewound = false;
            filled += n;
        }
        debug!(freq_hz, filled, "file source read");
        Ok(filled)
    }
}
