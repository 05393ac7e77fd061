//! # Delay Engine (Circular Delay Buffer)
//!
//! The delay engine owns one circular buffer row per audio channel and
//! folds each incoming block of audio into it with a fixed feedback gain.
//! Unlike a per-sample delay line, this engine works **block-wise**: the
//! host hands it a whole buffer of samples at a time, and the engine copies
//! the block into the circular store in one or two slice operations,
//! splitting the copy when the block would run past the end of the buffer.
//!
//! ## How the circular write works
//!
//! A single write position (shared by every channel row) marks where the
//! next block lands. Each block:
//!
//! 1. If the space between the write position and the end of the row is
//!    larger than the block, mix the whole block in at the write position.
//! 2. Otherwise, split: mix the first `remaining` samples up to the end of
//!    the row, then mix the rest starting back at index 0.
//! 3. Advance the write position by the block length, wrapping with modulo.
//!
//! ```text
//!  row:  [ . . . . . . . . . . ]     len = 10
//!                        ^ write_position = 8, block of 4
//!         [ c d . . . . . . a b ]    2 samples at [8,10), 2 at [0,2)
//!             ^ write_position = (8 + 4) % 10 = 2
//! ```
//!
//! ## The feedback mix
//!
//! Samples are not copied verbatim. Each written sample is a blend of the
//! row's existing content and the new input, both weighted by
//! [`FEEDBACK_GAIN`]:
//!
//! ```text
//! row[pos] = FEEDBACK_GAIN * row[pos] + FEEDBACK_GAIN * input[i]
//! ```
//!
//! The mix helper supports a linear gain ramp between a start and an end
//! gain; this engine always calls it with both ends at `FEEDBACK_GAIN`, so
//! the "ramp" degenerates to a constant-gain blend. Old content decays by
//! 0.8 on every pass of the write head, which is what keeps the buffer from
//! accumulating without bound.
//!
//! ## Two deliberately preserved quirks
//!
//! This engine reproduces the behavior of the processor it replaces, bugs
//! and all. Both quirks are covered by unit tests so a future fix is a
//! conscious decision, not an accident:
//!
//! - **Input restart on wrap**: the wrapped tail of a split write reads the
//!   input block from offset 0 again instead of continuing at `remaining`.
//!   Samples near the wrap boundary are duplicated at the row start and the
//!   block's tail never reaches the buffer.
//! - **Per-channel cursor advance**: the write position advances once per
//!   *channel*, not once per block. With a stereo block the second channel
//!   lands one block-length ahead of the first, and the cursor moves by
//!   `2 * block_len` per host callback.

/// Gain applied to both the existing buffer content and the incoming
/// sample in the write mix. Both ends of the gain ramp use this value,
/// so every write is a constant-gain blend at 0.8.
pub const FEEDBACK_GAIN: f32 = 0.8;

/// Derive the circular buffer length from the host's audio configuration.
///
/// The product `2 * sample_rate * samples_per_block`, truncated to an
/// integer. Note that this is **not** a duration in seconds: multiplying
/// the sample rate by the block size yields a coarse capacity that scales
/// with both quantities (at 44100 Hz and 512-sample blocks, about 45
/// million samples — far more than any audible delay needs). It is kept
/// as-is because the engine's wrap behavior is defined against it.
pub fn delay_buffer_size(sample_rate: f64, samples_per_block: u32) -> usize {
    (2.0 * sample_rate * f64::from(samples_per_block)) as usize
}

/// Block-wise circular delay buffer, one row per channel.
///
/// All rows share a single write position and a single length; the engine
/// is either unprepared (no rows, length 0) or prepared (every row
/// allocated to `delay_buffer_len`). All allocation happens in
/// [`prepare`](Self::prepare); [`process_block`](Self::process_block)
/// never allocates, locks, or blocks.
pub struct DelayEngine {
    /// The circular store: `delay_buffer[channel][sample]`. Every row has
    /// length `delay_buffer_len`. Empty until `prepare` is called.
    delay_buffer: Vec<Vec<f32>>,

    /// Where the next block will be written, shared across all rows.
    /// Always in `[0, delay_buffer_len)` while prepared.
    write_position: usize,

    /// Cached row length so the wrap arithmetic never calls `.len()` on a
    /// row. Zero exactly when unprepared.
    delay_buffer_len: usize,

    /// When true, the delayed history at the write head is summed into the
    /// host's block before the write mix, making the effect audible. Off
    /// by default: the plain write path matches the original processor,
    /// which only ever updated its own history buffer.
    echo_enabled: bool,
}

impl Default for DelayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayEngine {
    /// Create an unprepared engine. `process_block` is invalid until
    /// [`prepare`](Self::prepare) has been called.
    pub fn new() -> Self {
        Self {
            delay_buffer: Vec::new(),
            write_position: 0,
            delay_buffer_len: 0,
            echo_enabled: false,
        }
    }

    /// Enable or disable the audible echo read-back. See
    /// [`process_block`](Self::process_block).
    pub fn set_echo_enabled(&mut self, enabled: bool) {
        self.echo_enabled = enabled;
    }

    /// True once `prepare` has run and `release` has not.
    pub fn is_prepared(&self) -> bool {
        self.delay_buffer_len > 0
    }

    /// Length of every circular row, or 0 while unprepared.
    pub fn delay_buffer_len(&self) -> usize {
        self.delay_buffer_len
    }

    /// Number of channel rows currently allocated.
    pub fn num_channels(&self) -> usize {
        self.delay_buffer.len()
    }

    /// Current write position. Always in `[0, delay_buffer_len)` while
    /// prepared.
    pub fn write_position(&self) -> usize {
        self.write_position
    }

    /// Allocate (or reallocate) the circular buffer for a new audio
    /// configuration.
    ///
    /// Called once before playback and again whenever the sample rate,
    /// maximum block size, or channel count changes. Each call fully
    /// replaces the rows with zero-filled ones of length
    /// [`delay_buffer_size`]`(sample_rate, samples_per_block)` and resets
    /// the write position to 0, so repeated calls with the same arguments
    /// always produce the same state.
    ///
    /// The write-position reset is an intentional departure from the
    /// processor this replaces, which left the cursor untouched across
    /// re-preparation; a shrinking buffer could then leave the cursor out
    /// of range. The old buffer contents are discarded here anyway, so
    /// there is no continuity to preserve.
    ///
    /// # Panics
    ///
    /// Panics if `sample_rate` is not positive or `samples_per_block` is
    /// zero. Both come straight from the host, which guarantees positive
    /// values; a violation is a programming error, not a runtime
    /// condition to recover from.
    pub fn prepare(&mut self, sample_rate: f64, samples_per_block: u32, num_channels: usize) {
        assert!(
            sample_rate > 0.0,
            "sample rate must be positive, got {sample_rate}"
        );
        assert!(samples_per_block > 0, "block size must be positive");

        let len = delay_buffer_size(sample_rate, samples_per_block);
        self.delay_buffer = (0..num_channels).map(|_| vec![0.0; len]).collect();
        self.delay_buffer_len = len;
        self.write_position = 0;
    }

    /// Zero the buffer contents and rewind the write position without
    /// reallocating. Used on transport stop so stale history does not
    /// bleed into the next playback session.
    pub fn clear(&mut self) {
        for row in &mut self.delay_buffer {
            row.fill(0.0);
        }
        self.write_position = 0;
    }

    /// Free the circular buffer. The engine returns to the unprepared
    /// state; `process_block` is invalid until the next `prepare`.
    pub fn release(&mut self) {
        self.delay_buffer = Vec::new();
        self.delay_buffer_len = 0;
        self.write_position = 0;
    }

    /// Fold one audio block into the circular buffer, channel by channel.
    ///
    /// `channels` is the host's block, one slice per output channel, all
    /// the same length. The first `num_input_channels` slices carry input;
    /// any slices beyond that are output-only channels whose content is
    /// undefined on entry, so they are cleared to silence every block
    /// regardless of the delay logic.
    ///
    /// For each input channel the engine:
    ///
    /// 1. (Echo enabled only) reads the oldest history — the region the
    ///    write head is about to overwrite — and sums it into the block.
    ///    Because this happens before the write mix, the echo re-enters
    ///    the buffer and decays by [`FEEDBACK_GAIN`] on each repeat.
    /// 2. Mixes the block into the row at the write position, splitting
    ///    the write when it would run past the end of the row.
    /// 3. Advances the write position by the block length, modulo the row
    ///    length. The advance is per channel (see the module docs).
    ///
    /// Calling this before a successful `prepare` is a programming error:
    /// it trips a debug assertion and is a no-op in release builds. No
    /// allocation or locking happens on this path.
    pub fn process_block(&mut self, channels: &mut [&mut [f32]], num_input_channels: usize) {
        debug_assert!(
            self.is_prepared(),
            "process_block called before prepare (or after release)"
        );
        if !self.is_prepared() {
            return;
        }

        // Output-only channels must be silenced every block; the host does
        // not clear them for us.
        for channel in channels.iter_mut().skip(num_input_channels) {
            channel.fill(0.0);
        }

        for (channel_index, channel) in channels.iter_mut().take(num_input_channels).enumerate() {
            // Rows are allocated per negotiated channel in prepare(); a
            // missing row means the host sent more channels than it
            // negotiated, which we skip rather than index out of range.
            let Some(delay_row) = self.delay_buffer.get_mut(channel_index) else {
                continue;
            };

            let buffer_len = channel.len();
            debug_assert!(
                buffer_len <= self.delay_buffer_len,
                "block of {buffer_len} samples exceeds delay buffer of {}",
                self.delay_buffer_len
            );

            if self.echo_enabled {
                // Read before writing: the samples just ahead of the write
                // head are the oldest stored history (one full buffer
                // length old), and the write mix below is about to
                // overwrite them.
                for (i, sample) in channel.iter_mut().enumerate() {
                    let read_index = (self.write_position + i) % self.delay_buffer_len;
                    *sample += delay_row[read_index];
                }
            }

            if self.delay_buffer_len > buffer_len + self.write_position {
                // The whole block fits before the end of the row.
                let write_end = self.write_position + buffer_len;
                mix_from_with_ramp(
                    &mut delay_row[self.write_position..write_end],
                    &channel[..],
                    FEEDBACK_GAIN,
                    FEEDBACK_GAIN,
                );
            } else {
                // Split write. Note the branch above is a strict
                // comparison: a block that lands exactly at the end of the
                // row still takes this path, with an empty wrapped tail.
                let remaining = self.delay_buffer_len - self.write_position;
                mix_from_with_ramp(
                    &mut delay_row[self.write_position..],
                    &channel[..remaining],
                    FEEDBACK_GAIN,
                    FEEDBACK_GAIN,
                );
                // Input restart quirk: the wrapped tail re-reads the input
                // from offset 0 instead of continuing at `remaining`.
                mix_from_with_ramp(
                    &mut delay_row[..buffer_len - remaining],
                    &channel[..buffer_len - remaining],
                    FEEDBACK_GAIN,
                    FEEDBACK_GAIN,
                );
            }

            // Per-channel advance, preserved from the original processor.
            self.write_position += buffer_len;
            self.write_position %= self.delay_buffer_len;
        }
    }
}

/// Mix `src` into `dest` with a linearly ramped gain: sample `i` is
/// written as `gain(i) * dest[i] + gain(i) * src[i]`, where `gain`
/// interpolates from `start_gain` to `end_gain` across the slice.
///
/// The engine always passes equal start and end gains, which makes the
/// ramp a constant-gain blend; the ramp form is kept because that is the
/// operation the write path is defined in terms of.
///
/// `src` must be at least as long as `dest`; extra source samples are
/// ignored.
fn mix_from_with_ramp(dest: &mut [f32], src: &[f32], start_gain: f32, end_gain: f32) {
    if dest.is_empty() {
        return;
    }

    if (start_gain - end_gain).abs() <= f32::EPSILON {
        for (d, s) in dest.iter_mut().zip(src) {
            *d = start_gain * *d + start_gain * *s;
        }
    } else {
        let increment = (end_gain - start_gain) / dest.len() as f32;
        let mut gain = start_gain;
        for (d, s) in dest.iter_mut().zip(src) {
            *d = gain * *d + gain * *s;
            gain += increment;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
