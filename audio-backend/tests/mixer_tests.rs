use std::sync::Arc;
use std::thread;

use asset_manager::sfx::encode_raw_sample;
use asset_manager::{MemoryLumps, SoundDescriptor, SoundId};
use audio_backend::{PlaybackEngine, VoiceParams, render_fn_for_engine};

fn engine(voices: usize, output_rate: u32) -> PlaybackEngine {
    let lumps = MemoryLumps::new()
        .with("DSLOUD", encode_raw_sample(11025, &[255u8; 100]))
        .with("DSQUIET", encode_raw_sample(11025, &[128u8; 50]))
        .with("DSBROKEN", vec![9u8, 0, 0x11, 0x2b, 4, 0, 0, 0, 1, 2, 3, 4]);
    PlaybackEngine::new(voices, output_rate, Arc::new(lumps), 1 << 20)
}

fn loud() -> SoundDescriptor {
    SoundDescriptor::new(1, "loud", "DSLOUD", 64)
}

fn quiet() -> SoundDescriptor {
    SoundDescriptor::new(2, "quiet", "DSQUIET", 64)
}

#[test]
fn voice_plays_until_data_runs_out() {
    let e = engine(4, 11025);
    assert!(e.install(0, &loud(), VoiceParams::default(), false, 7));
    assert!(e.is_playing(0));
    assert_eq!(e.instance_id(0), 7);

    let mut buf = vec![0.0f32; 50 * 2];
    e.mix_into(&mut buf, 2);
    assert!(e.is_playing(0));
    assert!(buf.iter().all(|s| *s > 0.0));

    let mut buf = vec![0.0f32; 60 * 2];
    e.mix_into(&mut buf, 2);
    assert!(!e.is_playing(0));
    // the tail past the end of data is silent
    assert_eq!(buf[59 * 2], 0.0);
    // finishing never drops the sample on the mixing side
    assert_eq!(e.sample_users(SoundId(1)), 1);

    e.stop(0);
    assert_eq!(e.sample_users(SoundId(1)), 0);
    assert!(e.sample_reclaimable(SoundId(1)));
}

#[test]
fn looping_voice_wraps() {
    let e = engine(1, 11025);
    assert!(e.install(0, &loud(), VoiceParams::default(), true, 1));
    let mut buf = vec![0.0f32; 1000 * 2];
    e.mix_into(&mut buf, 2);
    assert!(e.is_playing(0));
    assert!(buf.iter().all(|s| *s > 0.0));
}

#[test]
fn stop_twice_is_harmless() {
    let e = engine(2, 11025);
    e.stop(1);
    assert!(e.install(1, &loud(), VoiceParams::default(), false, 3));
    e.stop(1);
    e.stop(1);
    e.stop(99);
    assert!(!e.is_playing(1));
    assert_eq!(e.sample_users(SoundId(1)), 0);
}

#[test]
fn failed_install_leaves_slot_untouched() {
    let e = engine(2, 11025);
    let missing = SoundDescriptor::new(5, "missing", "DSNOPE", 10);
    let broken = SoundDescriptor::new(6, "broken", "DSBROKEN", 10);
    assert!(!e.install(0, &missing, VoiceParams::default(), false, 1));
    assert!(!e.install(0, &broken, VoiceParams::default(), false, 2));
    assert!(!e.install(5, &loud(), VoiceParams::default(), false, 3));
    assert!(!e.is_playing(0));
    assert_eq!(e.instance_id(0), 0);
    assert_eq!(e.sample_users(SoundId(1)), 0);
}

#[test]
fn prepared_samples_are_counted_until_installed_or_released() {
    let e = engine(2, 11025);
    assert!(e.prepare(&SoundDescriptor::new(6, "broken", "DSBROKEN", 10)).is_err());
    assert_eq!(e.sample_users(SoundId(6)), 0);

    let sample = e.prepare(&loud()).expect("loud decodes");
    assert_eq!(e.sample_users(SoundId(1)), 1);
    assert!(!e.is_playing(0));
    assert!(e.install_prepared(0, &loud(), sample, VoiceParams::default(), false, 4));
    assert_eq!(e.sample_users(SoundId(1)), 1);
    assert_eq!(e.instance_id(0), 4);

    e.prepare(&quiet()).expect("quiet decodes");
    e.release_prepared(SoundId(2));
    assert_eq!(e.sample_users(SoundId(2)), 0);
    assert!(e.sample_reclaimable(SoundId(2)));

    let sample = e.prepare(&quiet()).expect("quiet from cache");
    assert!(!e.install_prepared(9, &quiet(), sample, VoiceParams::default(), false, 5));
    assert_eq!(e.sample_users(SoundId(2)), 0);

    e.purge_unused_samples();
    assert!(!e.sample_reclaimable(SoundId(2)));
    assert_eq!(e.sample_users(SoundId(1)), 1);
}

#[test]
fn reinstall_recycles_slot_and_releases_previous_sample() {
    let e = engine(1, 11025);
    assert!(e.install(0, &loud(), VoiceParams::default(), false, 1));
    assert!(e.install(0, &quiet(), VoiceParams::default(), false, 2));
    assert_eq!(e.instance_id(0), 2);
    assert_eq!(e.sample_users(SoundId(1)), 0);
    assert_eq!(e.sample_users(SoundId(2)), 1);
}

#[test]
fn shared_sample_counts_every_voice() {
    let e = engine(3, 11025);
    for h in 0..3 {
        assert!(e.install(h, &loud(), VoiceParams::default(), false, h as u32 + 1));
    }
    assert_eq!(e.sample_users(SoundId(1)), 3);
    e.stop(0);
    e.stop(1);
    assert_eq!(e.sample_users(SoundId(1)), 1);
    assert!(!e.sample_reclaimable(SoundId(1)));
}

#[test]
fn separation_pans_output() {
    let e = engine(1, 11025);
    assert!(e.install(0, &loud(), VoiceParams { volume: 127, separation: 0, pitch: 128 }, false, 1));
    let mut buf = vec![0.0f32; 4 * 2];
    e.mix_into(&mut buf, 2);
    assert!(buf[0] > buf[1]);

    e.update_params(0, 127, 255, 128);
    e.mix_into(&mut buf, 2);
    assert!(buf[1] > buf[0]);

    e.set_flip_pan(true);
    e.update_params(0, 127, 255, 128);
    e.mix_into(&mut buf, 2);
    assert!(buf[0] > buf[1]);
}

#[test]
fn zero_volume_is_silent_but_still_advances() {
    let e = engine(1, 11025);
    assert!(e.install(0, &loud(), VoiceParams { volume: 0, separation: 128, pitch: 128 }, false, 1));
    let mut buf = vec![0.0f32; 120 * 2];
    e.mix_into(&mut buf, 2);
    assert!(buf.iter().all(|s| *s == 0.0));
    assert!(!e.is_playing(0));
}

#[test]
fn install_resamples_to_output_rate() {
    let e = engine(1, 44100);
    assert!(e.install(0, &loud(), VoiceParams::default(), false, 1));
    let mut buf = vec![0.0f32; 390 * 2];
    e.mix_into(&mut buf, 2);
    assert!(e.is_playing(0));
    let mut buf = vec![0.0f32; 20 * 2];
    e.mix_into(&mut buf, 2);
    assert!(!e.is_playing(0));
}

#[test]
fn higher_pitch_finishes_sooner() {
    let e = engine(1, 11025);
    // pitch 192 doubles the step
    assert!(e.install(0, &loud(), VoiceParams { volume: 127, separation: 128, pitch: 192 }, false, 1));
    let mut buf = vec![0.0f32; 50 * 2];
    e.mix_into(&mut buf, 2);
    assert!(!e.is_playing(0));
}

#[test]
fn mixed_output_saturates() {
    let e = engine(8, 11025);
    for h in 0..8 {
        assert!(e.install(h, &loud(), VoiceParams::default(), false, h as u32 + 1));
    }
    let mut buf = vec![0.0f32; 10 * 2];
    e.mix_into(&mut buf, 2);
    assert!(buf.iter().all(|s| (-1.0..=1.0).contains(s)));
    assert!(buf.iter().all(|s| *s > 0.99));
}

#[test]
fn extra_device_channels_are_zeroed() {
    let e = engine(1, 11025);
    assert!(e.install(0, &loud(), VoiceParams::default(), false, 1));
    let render = render_fn_for_engine(Arc::new(e));
    let mut buf = vec![1.0f32; 8 * 4];
    render(&mut buf, 11025, 8);
    for frame in buf.chunks_exact(4) {
        assert!(frame[0] > 0.0 && frame[1] > 0.0);
        assert_eq!(frame[2], 0.0);
        assert_eq!(frame[3], 0.0);
    }
}

#[test]
fn callback_thread_races_structural_changes() {
    let e = Arc::new(engine(4, 11025));
    let mixer = e.clone();
    let render = thread::spawn(move || {
        let mut buf = vec![0.0f32; 64 * 2];
        for _ in 0..2000 {
            mixer.mix_into(&mut buf, 2);
        }
    });

    for i in 0..2000u32 {
        let h = (i % 4) as usize;
        if i % 3 == 0 {
            e.stop(h);
        } else {
            let d = if i % 2 == 0 { loud() } else { quiet() };
            e.install(h, &d, VoiceParams::default(), i % 5 == 0, i + 1);
        }
        e.update_params(h, (i % 128) as i32, (i % 256) as i32, 128);
    }
    render.join().expect("mixer thread panicked");

    for h in 0..4 {
        e.stop(h);
    }
    assert_eq!(e.sample_users(SoundId(1)), 0);
    assert_eq!(e.sample_users(SoundId(2)), 0);
}
