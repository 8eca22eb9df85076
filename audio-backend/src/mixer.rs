//! Software mixer: per-channel voice state consumed by the device callback.
//!
//! Each voice slot splits into two halves. The structural half (sample
//! reference, read cursor, step remainder, loop flag) sits behind a per-slot
//! mutex; the simulation thread takes it to install or clear a voice and the
//! audio callback only ever `try_lock`s it, skipping the slot for one buffer
//! when it is busy. The parameter half (step, left/right volume rows) is a set
//! of relaxed atomics written without the lock, so a parameter update can land
//! between the callback's reads of the left and right rows.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use asset_manager::sfx_loader::decode_for_output;
use asset_manager::{AssetError, LumpSource, PcmSample, SampleCache, SoundDescriptor, SoundId};
use parking_lot::Mutex;

use crate::RenderFn;

pub const NORM_PITCH: i32 = 128;
pub const NORM_SEP: i32 = 128;
pub const MAX_VOLUME: i32 = 127;

/// Per-voice playback parameters as produced by the spatial computer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceParams {
    /// 0..=127
    pub volume: i32,
    /// 0..=255, 128 is centered.
    pub separation: i32,
    /// 0..=255, 128 plays at the sample's own rate.
    pub pitch: i32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self { volume: MAX_VOLUME, separation: NORM_SEP, pitch: NORM_PITCH }
    }
}

struct Voice {
    sound: SoundId,
    sample: Arc<PcmSample>,
    cursor: usize,
    step_remainder: u32,
    looping: bool,
}

#[derive(Default)]
struct VoiceSlot {
    voice: Mutex<Option<Voice>>,
    playing: AtomicBool,
    instance_id: AtomicU32,
    step: AtomicU32,
    left_vol: AtomicU32,
    right_vol: AtomicU32,
}

struct MixTables {
    // 16.16 step per pitch value
    steps: [u32; 256],
    // signed, volume-scaled value per (volume, unsigned sample)
    volumes: Vec<[i32; 256]>,
}

impl MixTables {
    fn new() -> Self {
        let mut steps = [0u32; 256];
        for (pitch, step) in steps.iter_mut().enumerate() {
            let ratio = 2f64.powf((pitch as f64 - NORM_PITCH as f64) / 64.0);
            *step = (ratio * 65536.0) as u32;
        }
        let volumes = (0..=MAX_VOLUME)
            .map(|v| {
                let mut row = [0i32; 256];
                for (s, out) in row.iter_mut().enumerate() {
                    *out = v * (s as i32 - 128) * 256 / MAX_VOLUME;
                }
                row
            })
            .collect();
        Self { steps, volumes }
    }
}

/// Split a volume and stereo separation into left/right volume rows.
pub fn stereo_volumes(volume: i32, separation: i32) -> (u32, u32) {
    let volume = volume.clamp(0, MAX_VOLUME);
    let mut sep = separation.clamp(0, 255) + 1;
    let left = volume - ((volume * sep * sep) >> 16);
    sep -= 257;
    let right = volume - ((volume * sep * sep) >> 16);
    (left.clamp(0, MAX_VOLUME) as u32, right.clamp(0, MAX_VOLUME) as u32)
}

/// Fixed-count voice mixer shared between the simulation thread and the device
/// callback.
pub struct PlaybackEngine {
    slots: Box<[VoiceSlot]>,
    output_rate: u32,
    lumps: Arc<dyn LumpSource>,
    cache: Mutex<SampleCache>,
    tables: MixTables,
    flip_pan: AtomicBool,
}

impl PlaybackEngine {
    pub fn new(voices: usize, output_rate: u32, lumps: Arc<dyn LumpSource>, cache_budget: usize) -> Self {
        let slots = (0..voices).map(|_| VoiceSlot::default()).collect::<Vec<_>>().into_boxed_slice();
        tracing::info!(voices, output_rate, "playback engine created");
        Self {
            slots,
            output_rate,
            lumps,
            cache: Mutex::new(SampleCache::new(cache_budget)),
            tables: MixTables::new(),
            flip_pan: AtomicBool::new(false),
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn voice_count(&self) -> usize {
        self.slots.len()
    }

    pub fn set_flip_pan(&self, flip: bool) {
        self.flip_pan.store(flip, Ordering::Relaxed);
    }

    /// Decode (or fetch from cache) `sound`'s sample and take a reference on
    /// it. Hand the result to `install_prepared`, or give it back with
    /// `release_prepared`.
    pub fn prepare(&self, sound: &SoundDescriptor) -> Result<Arc<PcmSample>, AssetError> {
        let sample = self.cache.lock().acquire_with(sound.id, || self.load(sound));
        if let Err(e) = &sample {
            tracing::warn!(sound = %sound.name, lump = %sound.lump, error = %e, "cannot load sound sample");
        }
        sample
    }

    /// Drop the reference taken by a `prepare` that was never installed.
    pub fn release_prepared(&self, sound: SoundId) {
        self.cache.lock().release(sound);
    }

    /// Prepare `sound`'s sample and start it on `handle`.
    ///
    /// Returns false and leaves the slot untouched if the handle is out of
    /// range or the sample cannot be loaded.
    pub fn install(&self, handle: usize, sound: &SoundDescriptor, params: VoiceParams, looping: bool, instance_id: u32) -> bool {
        if handle >= self.slots.len() {
            return false;
        }
        match self.prepare(sound) {
            Ok(sample) => self.install_prepared(handle, sound, sample, params, looping, instance_id),
            Err(_) => false,
        }
    }

    /// Start a prepared sample on `handle`, releasing whatever occupied the
    /// slot before. An out-of-range handle gives the reference back.
    pub fn install_prepared(
        &self,
        handle: usize,
        sound: &SoundDescriptor,
        sample: Arc<PcmSample>,
        params: VoiceParams,
        looping: bool,
        instance_id: u32,
    ) -> bool {
        let Some(slot) = self.slots.get(handle) else {
            self.release_prepared(sound.id);
            return false;
        };

        self.update_params(handle, params.volume, params.separation, params.pitch);

        let previous = {
            let mut guard = slot.voice.lock();
            let previous = guard.replace(Voice { sound: sound.id, sample, cursor: 0, step_remainder: 0, looping });
            slot.instance_id.store(instance_id, Ordering::Release);
            slot.playing.store(true, Ordering::Release);
            previous
        };
        if let Some(old) = previous {
            tracing::debug!(handle, replaced = old.sound.0, "voice recycled");
            self.cache.lock().release(old.sound);
        }
        tracing::debug!(handle, sound = %sound.name, instance_id, looping, "voice installed");
        true
    }

    /// Lock-free parameter update. Out-of-range handles are ignored.
    pub fn update_params(&self, handle: usize, volume: i32, separation: i32, pitch: i32) {
        let Some(slot) = self.slots.get(handle) else {
            return;
        };
        let separation = if self.flip_pan.load(Ordering::Relaxed) { 255 - separation.clamp(0, 255) } else { separation };
        let (left, right) = stereo_volumes(volume, separation);
        slot.step.store(self.tables.steps[pitch.clamp(0, 255) as usize], Ordering::Relaxed);
        slot.left_vol.store(left, Ordering::Relaxed);
        slot.right_vol.store(right, Ordering::Relaxed);
    }

    /// Clear `handle` and release its sample. Safe to repeat.
    pub fn stop(&self, handle: usize) {
        let Some(slot) = self.slots.get(handle) else {
            return;
        };
        let voice = {
            let mut guard = slot.voice.lock();
            slot.playing.store(false, Ordering::Release);
            guard.take()
        };
        if let Some(voice) = voice {
            self.cache.lock().release(voice.sound);
            tracing::trace!(handle, sound = voice.sound.0, "voice stopped");
        }
    }

    pub fn is_playing(&self, handle: usize) -> bool {
        self.slots.get(handle).is_some_and(|s| s.playing.load(Ordering::Acquire))
    }

    /// Token of the current occupancy of `handle`; 0 for out-of-range handles.
    pub fn instance_id(&self, handle: usize) -> u32 {
        self.slots.get(handle).map(|s| s.instance_id.load(Ordering::Acquire)).unwrap_or(0)
    }

    /// Number of live voices referencing `sound`'s sample.
    pub fn sample_users(&self, sound: SoundId) -> usize {
        self.cache.lock().users(sound)
    }

    pub fn sample_reclaimable(&self, sound: SoundId) -> bool {
        self.cache.lock().is_reclaimable(sound)
    }

    /// Free every cached sample no voice references.
    pub fn purge_unused_samples(&self) {
        self.cache.lock().purge_reclaimable();
        tracing::debug!("unused samples purged");
    }

    /// Mix every playing voice into `out` (interleaved, `channels` per frame).
    ///
    /// Runs on the device thread: no allocation, no blocking, no logging.
    pub fn mix_into(&self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if channels == 0 {
            return;
        }

        for slot in self.slots.iter() {
            if !slot.playing.load(Ordering::Acquire) {
                continue;
            }
            let Some(mut guard) = slot.voice.try_lock() else {
                continue;
            };
            let Some(voice) = guard.as_mut() else {
                continue;
            };

            let step = slot.step.load(Ordering::Relaxed);
            let left = &self.tables.volumes[slot.left_vol.load(Ordering::Relaxed) as usize];
            let right = &self.tables.volumes[slot.right_vol.load(Ordering::Relaxed) as usize];
            let data = &voice.sample.data;
            if voice.cursor >= data.len() {
                continue;
            }

            for frame in out.chunks_exact_mut(channels) {
                let s = data[voice.cursor] as usize;
                if channels >= 2 {
                    frame[0] += left[s] as f32;
                    frame[1] += right[s] as f32;
                } else {
                    frame[0] += ((left[s] + right[s]) / 2) as f32;
                }

                voice.step_remainder += step;
                voice.cursor += (voice.step_remainder >> 16) as usize;
                voice.step_remainder &= 0xffff;

                if voice.cursor >= data.len() {
                    if voice.looping {
                        voice.cursor %= data.len();
                    } else {
                        slot.playing.store(false, Ordering::Release);
                        break;
                    }
                }
            }
        }

        for frame in out.chunks_exact_mut(channels) {
            for (i, s) in frame.iter_mut().enumerate() {
                *s = if i < 2 { s.clamp(i16::MIN as f32, i16::MAX as f32) / 32768.0 } else { 0.0 };
            }
        }
    }

    fn load(&self, sound: &SoundDescriptor) -> Result<PcmSample, AssetError> {
        let bytes = self.lumps.lump(&sound.lump).ok_or_else(|| AssetError::MissingLump(sound.lump.clone()))?;
        decode_for_output(&bytes, self.output_rate)
    }
}

/// Wrap an engine as a device render callback.
pub fn render_fn_for_engine(engine: Arc<PlaybackEngine>) -> RenderFn {
    Arc::new(move |buffer: &mut [f32], _sample_rate: u32, frames: usize| {
        let channels = if frames == 0 { 0 } else { buffer.len() / frames };
        engine.mix_into(buffer, channels);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_pitch_steps_one_sample() {
        let tables = MixTables::new();
        assert_eq!(tables.steps[NORM_PITCH as usize], 1 << 16);
        assert_eq!(tables.steps[NORM_PITCH as usize + 64], 2 << 16);
        assert!(tables.steps[0] < tables.steps[255]);
    }

    #[test]
    fn volume_rows_are_signed_around_128() {
        let tables = MixTables::new();
        assert_eq!(tables.volumes[127][128], 0);
        assert_eq!(tables.volumes[127][0], -128 * 256);
        assert_eq!(tables.volumes[0][255], 0);
    }

    #[test]
    fn centered_separation_splits_evenly() {
        let (l, r) = stereo_volumes(127, NORM_SEP);
        assert!((l as i32 - r as i32).abs() <= 1);
        let (l, r) = stereo_volumes(127, 0);
        assert!(l > r);
        let (l, r) = stereo_volumes(127, 255);
        assert!(r > l);
    }
}
