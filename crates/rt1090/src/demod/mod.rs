/**
 * Demodulation of Mode S frames out of raw I/Q sample blocks.
 *
 * The radio delivers interleaved unsigned 8-bit I/Q pairs at 2 MS/s. Those
 * are turned into a vector of 16-bit magnitudes through a precomputed
 * lookup table, then scanned for the characteristic four-pulse Mode S
 * preamble; candidate messages are sliced two samples per bit, with an
 * optional phase-correction retry for frames that fail on the first pass.
 */
use num_complex::Complex;
use once_cell::sync::Lazy;

/// Downlink frequency for Mode S / ADS-B
pub const MODES_FREQ: u32 = 1_090_000_000;

/// Sampling rate of the radio
pub const RTLSDR_RATE: u32 = 2_000_000;

/// Duration of the preamble in microseconds (one sample each 0.5 µs)
pub const MODES_PREAMBLE_US: usize = 8;

pub const MODES_LONG_MSG_BITS: usize = 112;
pub const MODES_SHORT_MSG_BITS: usize = 56;
pub const MODES_LONG_MSG_BYTES: usize = MODES_LONG_MSG_BITS / 8;

/// Preamble plus one long message, in microseconds
const MODES_FULL_LEN: usize = MODES_PREAMBLE_US + MODES_LONG_MSG_BITS;

/// I/Q magnitude lookup table.
///
/// Square roots are too expensive for the sample rate, so the magnitudes of
/// all the 129×129 possible |I|,|Q| pairs are precomputed. The maximum
/// modulus is √(128²+128²) ≈ 181.02, scaled by 360 to span the u16 range.
static MAGNITUDE_LUT: Lazy<Box<[[u16; 129]; 129]>> = Lazy::new(|| {
    let mut table = Box::new([[0u16; 129]; 129]);
    for (i, row) in table.iter_mut().enumerate() {
        for (q, entry) in row.iter_mut().enumerate() {
            let module = f64::sqrt((i * i + q * q) as f64);
            *entry = libm::round(module * 360.) as u16;
        }
    }
    table
});

/// Reinterpret interleaved unsigned I/Q bytes as centred complex samples
pub fn iq_samples(buf: &[u8]) -> Vec<Complex<i16>> {
    buf.chunks_exact(2)
        .map(|chunk| {
            let real = chunk[0] as i16 - 127;
            let imag = chunk[1] as i16 - 127;
            Complex::new(real, imag)
        })
        .collect()
}

/// Turn complex samples into the magnitude vector
pub fn magnitude(samples: &[Complex<i16>]) -> Vec<u16> {
    samples
        .iter()
        .map(|c| {
            let i = c.re.unsigned_abs() as usize;
            let q = c.im.unsigned_abs() as usize;
            MAGNITUDE_LUT[i][q]
        })
        .collect()
}

/// A frame sliced out of the magnitude vector, CRC not yet verified
#[derive(Debug, PartialEq, Clone)]
pub struct DemodFrame {
    /// Message bytes, MSB first; only the first `msgbits / 8` are relevant
    pub msg: [u8; MODES_LONG_MSG_BYTES],
    /// Declared length, 56 or 112 bits depending on the Downlink Format
    pub msgbits: usize,
    /// Whether the phase-correction retry produced this frame
    pub phase_corrected: bool,
    /// Average bit-level signal excursion, normalised to [0, 1]
    pub signal_level: f64,
}

impl DemodFrame {
    pub fn bytes(&self) -> &[u8] {
        &self.msg[..self.msgbits / 8]
    }
}

/// Given the Downlink Format of the message, return its length in bits
pub fn message_len_by_type(msgtype: u8) -> usize {
    match msgtype {
        16 | 17 | 19 | 20 | 21 => MODES_LONG_MSG_BITS,
        _ => MODES_SHORT_MSG_BITS,
    }
}

/// Return -1 if the message is out of phase left-side, 1 if the message is
/// out of phase right-side, 0 if the message is not particularly out of
/// phase.
///
/// This function accesses `m[j - 1]`, so callers must ensure `j ≥ 1`.
fn detect_out_of_phase(m: &[u16], j: usize) -> i32 {
    if m[j + 3] > m[j + 2] / 3 {
        return 1;
    }
    if m[j + 10] > m[j + 9] / 3 {
        return 1;
    }
    if m[j + 6] > m[j + 7] / 3 {
        return -1;
    }
    if m[j - 1] > m[j + 1] / 3 {
        return -1;
    }
    0
}

/// Amplify the first sample of a bit if the previous bit was a one, damp it
/// otherwise.
///
/// Out-of-phase messages mix part of each high half-bit into its neighbour,
/// which blurs runs of identical bits; 0→1 and 1→0 transitions remain
/// recognisable, so nudging each sample towards the previous decision makes
/// similar levels resolve the right way more often.
fn apply_phase_correction(m: &mut [u16]) {
    let m = &mut m[MODES_PREAMBLE_US * 2..]; // skip preamble
    for j in (0..(MODES_LONG_MSG_BITS - 1) * 2).step_by(2) {
        if m[j] > m[j + 1] {
            // One
            m[j + 2] = (u32::from(m[j + 2]) * 5 / 4) as u16;
        } else {
            // Zero
            m[j + 2] = (u32::from(m[j + 2]) * 4 / 5) as u16;
        }
    }
}

/**
 * Detect Mode S messages in the magnitude vector and slice them into
 * frames.
 *
 * The Mode S preamble is made of impulses of 0.5 microseconds at the
 * following time offsets:
 *
 * 0   - 0.5 usec: first impulse.
 * 1.0 - 1.5 usec: second impulse.
 * 3.5 - 4   usec: third impulse.
 * 4.5 - 5   usec: last impulse.
 *
 * Since the sample rate is 2 MHz, every sample in the magnitude vector is
 * 0.5 usec, so the preamble looks like this, assuming there is an impulse
 * at offset 0 in the array:
 *
 * 0   -----------------
 * 1   -
 * 2   ------------------
 * 3   --
 * 4   -
 * 5   --
 * 6   -
 * 7   ------------------
 * 8   --
 * 9   -------------------
 *
 * The vector is mutated transiently during the phase-correction retry; the
 * affected span is restored from a scratch copy before the function moves
 * on, so a failed correction cannot corrupt later detection attempts.
 */
pub fn detect_modes(m: &mut [u16]) -> Vec<DemodFrame> {
    let mut frames = Vec::new();
    if m.len() < MODES_FULL_LEN * 2 + 1 {
        return frames;
    }

    let mut bits = [0u8; MODES_LONG_MSG_BITS];
    let mut msg = [0u8; MODES_LONG_MSG_BYTES];
    let mut aux = [0u16; MODES_LONG_MSG_BITS * 2];
    let data = MODES_PREAMBLE_US * 2; // first sample past the preamble

    let mut use_correction = false;
    let mut j = 0;
    while j < m.len() - MODES_FULL_LEN * 2 {
        if !use_correction {
            // First check of relations between the first 10 samples
            // representing a valid preamble. We don't even investigate
            // further if this simple test is not passed.
            if !(m[j] > m[j + 1]
                && m[j + 1] < m[j + 2]
                && m[j + 2] > m[j + 3]
                && m[j + 3] < m[j]
                && m[j + 4] < m[j]
                && m[j + 5] < m[j]
                && m[j + 6] < m[j]
                && m[j + 7] > m[j + 8]
                && m[j + 8] < m[j + 9]
                && m[j + 9] > m[j + 6])
            {
                j += 1;
                continue;
            }

            // The samples between the two spikes must be < than the average
            // of the high spikes level. We don't test bits too near to
            // the high levels as signals can be out of phase so part of the
            // energy can be in the near samples.
            let high = ((u32::from(m[j])
                + u32::from(m[j + 2])
                + u32::from(m[j + 7])
                + u32::from(m[j + 9]))
                / 6) as u16;
            if m[j + 4] >= high || m[j + 5] >= high {
                j += 1;
                continue;
            }

            // Similarly samples in the range 11-14 must be low, as it is the
            // space between the preamble and real data.
            if m[j + 11] >= high
                || m[j + 12] >= high
                || m[j + 13] >= high
                || m[j + 14] >= high
            {
                j += 1;
                continue;
            }
        }

        // If the previous attempt with this candidate failed, retry using
        // magnitude correction on a scratch copy.
        if use_correction {
            let aux_len = aux.len();
            aux.copy_from_slice(&m[j + data..j + data + aux_len]);
            if j > 0 && detect_out_of_phase(m, j) != 0 {
                apply_phase_correction(&mut m[j..]);
            }
        }

        // Decode all the next 112 bits, regardless of the actual message
        // size; the actual message type is checked later.
        let mut errors = 0;
        for i in (0..MODES_LONG_MSG_BITS * 2).step_by(2) {
            let low = i32::from(m[j + i + data]);
            let high = i32::from(m[j + i + data + 1]);
            let delta = (low - high).abs();

            if i > 0 && delta < 256 {
                bits[i / 2] = bits[i / 2 - 1];
            } else if low == high {
                // Two adjacent samples with the same magnitude are an
                // effective hint of random noise promoted to a preamble
                bits[i / 2] = 2; // error
                if i < MODES_SHORT_MSG_BITS * 2 {
                    errors += 1;
                }
            } else if low > high {
                bits[i / 2] = 1;
            } else {
                bits[i / 2] = 0;
            }
        }

        // Restore the original message if we used magnitude correction
        if use_correction {
            m[j + data..j + data + aux.len()].copy_from_slice(&aux);
        }

        // Pack bits into bytes
        for i in (0..MODES_LONG_MSG_BITS).step_by(8) {
            msg[i / 8] = bits[i] << 7
                | bits[i + 1] << 6
                | bits[i + 2] << 5
                | bits[i + 3] << 4
                | bits[i + 4] << 3
                | bits[i + 5] << 2
                | bits[i + 6] << 1
                | bits[i + 7];
        }

        let msgtype = msg[0] >> 3;
        let msglen = message_len_by_type(msgtype) / 8;

        // Last check: high and low bits must be different enough in
        // magnitude to mark this as a real message and not just noise.
        let mut delta = 0i32;
        for i in (0..msglen * 8 * 2).step_by(2) {
            delta += (i32::from(m[j + i + data])
                - i32::from(m[j + i + data + 1]))
            .abs();
        }
        delta /= (msglen * 4) as i32;

        // An average delta of 10·255 lets almost every kind of message
        // pass, while filtering some random noise.
        if delta < 10 * 255 {
            use_correction = false;
            j += 1;
            continue;
        }

        // With zero errors this is very likely a Mode S message, though it
        // may still be broken: the CRC check is the next layer's concern.
        let good_message = errors == 0;
        if good_message {
            frames.push(DemodFrame {
                msg,
                msgbits: msglen * 8,
                phase_corrected: use_correction,
                signal_level: f64::from(delta) / f64::from(u16::MAX),
            });
        }

        // Retry with phase correction if the first pass failed
        if !good_message && !use_correction {
            use_correction = true;
        } else {
            use_correction = false;
            j += 1;
        }
    }

    frames
}
