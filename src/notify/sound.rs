//! Alert sounds.
//!
//! A named profile is a fixed list of tones. Each tone becomes one oscillator:
//! silent until its start offset, a linear attack up to its volume, then an
//! exponential decay towards (never reaching) zero by `start + duration`,
//! where it stops. All tones of one profile are placed against a single read
//! of the engine clock, so their relative timing does not depend on when the
//! scheduling code happens to run.

use crate::common::logging::Logger;
use std::f64::consts::PI;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Attack window shared by every tone, in seconds
pub const ATTACK_SECS: f64 = 0.01;

/// Gain the exponential decay aims for at the tone's end
pub const DECAY_FLOOR: f32 = 0.01;

/// Output sample rate of the PCM engine
pub const SAMPLE_RATE: u32 = 44_100;

/// Profile names accepted by [`profile`]
pub const PROFILE_NAMES: [&str; 5] = ["chime", "bell", "ping", "alert", "none"];

/// One tone of a profile; times are in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    pub duration: f64,
    pub start_offset: f64,
    pub volume: f32,
}

const fn tone(frequency: f32, duration: f64, start_offset: f64, volume: f32) -> Tone {
    Tone {
        frequency,
        duration,
        start_offset,
        volume,
    }
}

const CHIME: [Tone; 3] = [
    tone(523.25, 0.3, 0.0, 0.3),
    tone(659.25, 0.3, 0.15, 0.3),
    tone(783.99, 0.4, 0.3, 0.3),
];

const BELL: [Tone; 2] = [tone(830.61, 0.8, 0.0, 0.35), tone(1661.22, 0.5, 0.0, 0.1)];

const PING: [Tone; 1] = [tone(1046.5, 0.15, 0.0, 0.3)];

const ALERT: [Tone; 3] = [
    tone(880.0, 0.12, 0.0, 0.3),
    tone(880.0, 0.12, 0.18, 0.3),
    tone(1174.66, 0.2, 0.36, 0.3),
];

/// Look up a profile. `none` and unknown names have no tones.
pub fn profile(name: &str) -> Option<&'static [Tone]> {
    match name {
        "chime" => Some(&CHIME),
        "bell" => Some(&BELL),
        "ping" => Some(&PING),
        "alert" => Some(&ALERT),
        _ => None,
    }
}

/// A tone placed on an engine's clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTone {
    pub frequency: f32,
    pub start: f64,
    pub peak_at: f64,
    pub stop: f64,
    pub volume: f32,
}

impl ScheduledTone {
    pub fn at(clock: f64, tone: &Tone) -> Self {
        let start = clock + tone.start_offset;
        let stop = start + tone.duration;
        Self {
            frequency: tone.frequency,
            start,
            peak_at: (start + ATTACK_SECS).min(stop),
            stop,
            volume: tone.volume,
        }
    }

    /// Envelope gain at clock time `t`
    pub fn gain_at(&self, t: f64) -> f32 {
        if t < self.start || t >= self.stop {
            0.0
        } else if t < self.peak_at {
            self.volume * ((t - self.start) / (self.peak_at - self.start)) as f32
        } else {
            let span = self.stop - self.peak_at;
            if span <= 0.0 {
                return 0.0;
            }
            let progress = (t - self.peak_at) / span;
            let ratio = (DECAY_FLOOR / self.volume.max(DECAY_FLOOR)) as f64;
            self.volume * ratio.powf(progress) as f32
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SoundError {
    #[error("no audio player found")]
    NoPlayer,

    #[error("audio playback failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can play oscillators against its own clock
pub trait AudioEngine: Send {
    /// Current engine time in seconds
    fn current_time(&self) -> f64;

    fn schedule(&mut self, tone: ScheduledTone) -> Result<(), SoundError>;

    /// Start playback of everything scheduled since the last commit
    fn commit(&mut self) -> Result<(), SoundError>;
}

pub type EngineFactory = Box<dyn Fn() -> Result<Box<dyn AudioEngine>, SoundError> + Send>;

/// Plays named profiles on a lazily created engine. Failures are logged,
/// never returned.
pub struct SoundScheduler {
    engine: Option<Box<dyn AudioEngine>>,
    factory: EngineFactory,
    log: Logger,
}

impl SoundScheduler {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            engine: None,
            factory,
            log: Logger::root().child("sound"),
        }
    }

    /// Scheduler backed by the platform audio player
    pub fn system() -> Self {
        Self::new(Box::new(|| {
            PcmAudioEngine::detect().map(|engine| Box::new(engine) as Box<dyn AudioEngine>)
        }))
    }

    /// Play a profile. Returns the number of tones scheduled.
    pub fn play(&mut self, name: &str, enabled: bool) -> usize {
        if !enabled {
            return 0;
        }
        let Some(tones) = profile(name) else {
            return 0;
        };

        let log = self.log.clone();
        let engine = match self.engine() {
            Ok(engine) => engine,
            Err(e) => {
                log.warn(format_args!("audio engine unavailable: {}", e));
                return 0;
            }
        };

        let clock = engine.current_time();
        for tone in tones {
            if let Err(e) = engine.schedule(ScheduledTone::at(clock, tone)) {
                log.warn(format_args!("failed to schedule tone: {}", e));
                return 0;
            }
        }
        if let Err(e) = engine.commit() {
            log.warn(format_args!("failed to play '{}': {}", name, e));
            return 0;
        }
        tones.len()
    }

    fn engine(&mut self) -> Result<&mut (dyn AudioEngine + 'static), SoundError> {
        if self.engine.is_none() {
            self.engine = Some((self.factory)()?);
        }
        self.engine.as_deref_mut().ok_or(SoundError::NoPlayer)
    }
}

/// Renders oscillators to 16-bit mono PCM and hands the clip to a player
/// process (`afplay`, `paplay` or `aplay`)
pub struct PcmAudioEngine {
    epoch: Instant,
    pending: Vec<ScheduledTone>,
    player: &'static str,
}

static CLIP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl PcmAudioEngine {
    pub fn detect() -> Result<Self, SoundError> {
        let candidates: &[&'static str] = if cfg!(target_os = "macos") {
            &["afplay"]
        } else {
            &["paplay", "aplay"]
        };
        candidates
            .iter()
            .copied()
            .find(|player| is_available(player))
            .map(|player| Self {
                epoch: Instant::now(),
                pending: Vec::new(),
                player,
            })
            .ok_or(SoundError::NoPlayer)
    }

    fn clip_path() -> PathBuf {
        let n = CLIP_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("claude-dash-{}-{}.wav", std::process::id(), n))
    }
}

/// Start `player` on the clip at `path`. A watcher thread reaps the process
/// and deletes the clip once playback ends.
pub fn spawn_player(player: &str, path: PathBuf) -> Result<JoinHandle<()>, SoundError> {
    let spawned = Command::new(player)
        .arg(&path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
    };
    let log = Logger::root().child("sound");
    Ok(thread::spawn(move || {
        if let Err(e) = child.wait() {
            log.warn(format_args!("failed to reap audio player: {}", e));
        }
        if let Err(e) = fs::remove_file(&path) {
            log.debug(format_args!("failed to remove {}: {}", path.display(), e));
        }
    }))
}

impl AudioEngine for PcmAudioEngine {
    fn current_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn schedule(&mut self, tone: ScheduledTone) -> Result<(), SoundError> {
        self.pending.push(tone);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SoundError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let tones = std::mem::take(&mut self.pending);
        let origin = tones.iter().map(|t| t.start).fold(self.current_time(), f64::min);
        let clip = render_wav(&tones, origin, SAMPLE_RATE);

        let path = Self::clip_path();
        fs::write(&path, clip)?;
        spawn_player(self.player, path)?;
        Ok(())
    }
}

fn is_available(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Mix tones into a WAV clip whose first sample sits at clock time `origin`
pub fn render_wav(tones: &[ScheduledTone], origin: f64, sample_rate: u32) -> Vec<u8> {
    let end = tones.iter().map(|t| t.stop).fold(origin, f64::max);
    let frames = ((end - origin) * sample_rate as f64).ceil().max(0.0) as usize;

    let mut data = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = origin + i as f64 / sample_rate as f64;
        let sample: f64 = tones
            .iter()
            .map(|tone| {
                let gain = tone.gain_at(t) as f64;
                if gain == 0.0 {
                    0.0
                } else {
                    gain * (2.0 * PI * tone.frequency as f64 * (t - tone.start)).sin()
                }
            })
            .sum();
        let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f64) as i16;
        data.extend_from_slice(&pcm.to_le_bytes());
    }

    let mut wav = Vec::with_capacity(44 + data.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data.len() as u32).to_le_bytes());
    wav.extend_from_slice(&data);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    /// Engine with a fixed clock that records what it was given
    struct RecordingEngine {
        clock: f64,
        scheduled: Arc<Mutex<Vec<ScheduledTone>>>,
        commits: Arc<AtomicUsize>,
    }

    impl AudioEngine for RecordingEngine {
        fn current_time(&self) -> f64 {
            self.clock
        }

        fn schedule(&mut self, tone: ScheduledTone) -> Result<(), SoundError> {
            self.scheduled.lock().unwrap().push(tone);
            Ok(())
        }

        fn commit(&mut self) -> Result<(), SoundError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        scheduler: SoundScheduler,
        scheduled: Arc<Mutex<Vec<ScheduledTone>>>,
        created: Arc<AtomicUsize>,
        commits: Arc<AtomicUsize>,
    }

    fn harness(clock: f64) -> Harness {
        let scheduled = Arc::new(Mutex::new(Vec::new()));
        let created = Arc::new(AtomicUsize::new(0));
        let commits = Arc::new(AtomicUsize::new(0));
        let (s, c, k) = (scheduled.clone(), created.clone(), commits.clone());
        let scheduler = SoundScheduler::new(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingEngine {
                clock,
                scheduled: s.clone(),
                commits: k.clone(),
            }) as Box<dyn AudioEngine>)
        }));
        Harness {
            scheduler,
            scheduled,
            created,
            commits,
        }
    }

    mod scheduling {
        use super::*;

        #[test]
        fn test_tones_share_one_clock_read() {
            let mut h = harness(12.5);
            assert_eq!(h.scheduler.play("chime", true), 3);
            let scheduled = h.scheduled.lock().unwrap();
            let expected = [12.5, 12.65, 12.8];
            assert_eq!(scheduled.len(), expected.len());
            for (tone, start) in scheduled.iter().zip(expected) {
                assert!((tone.start - start).abs() < 1e-9);
            }
            assert!((scheduled[2].stop - 13.2).abs() < 1e-9);
            assert_eq!(h.commits.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn test_disabled_or_unknown_profile_does_nothing() {
            let mut h = harness(0.0);
            assert_eq!(h.scheduler.play("chime", false), 0);
            assert_eq!(h.scheduler.play("none", true), 0);
            assert_eq!(h.scheduler.play("kazoo", true), 0);
            assert_eq!(h.created.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_engine_is_created_once() {
            let mut h = harness(0.0);
            h.scheduler.play("ping", true);
            h.scheduler.play("bell", true);
            assert_eq!(h.created.load(Ordering::SeqCst), 1);
            assert_eq!(h.scheduled.lock().unwrap().len(), 3);
        }

        #[test]
        fn test_schedule_failure_is_swallowed() {
            struct RefusingEngine {
                commits: Arc<AtomicUsize>,
            }

            impl AudioEngine for RefusingEngine {
                fn current_time(&self) -> f64 {
                    0.0
                }

                fn schedule(&mut self, _tone: ScheduledTone) -> Result<(), SoundError> {
                    Err(SoundError::Io(std::io::Error::other("device busy")))
                }

                fn commit(&mut self) -> Result<(), SoundError> {
                    self.commits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }

            let commits = Arc::new(AtomicUsize::new(0));
            let k = commits.clone();
            let mut scheduler = SoundScheduler::new(Box::new(move || {
                Ok(Box::new(RefusingEngine { commits: k.clone() }) as Box<dyn AudioEngine>)
            }));
            assert_eq!(scheduler.play("chime", true), 0);
            assert_eq!(scheduler.play("ping", true), 0);
            assert_eq!(commits.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_factory_failure_is_swallowed() {
            let mut scheduler = SoundScheduler::new(Box::new(|| Err(SoundError::NoPlayer)));
            assert_eq!(scheduler.play("alert", true), 0);
        }

        #[test]
        fn test_every_named_profile_resolves() {
            for name in PROFILE_NAMES {
                assert_eq!(profile(name).is_some(), name != "none", "{}", name);
            }
        }
    }

    mod envelope {
        use super::*;

        fn scheduled() -> ScheduledTone {
            ScheduledTone::at(1.0, &tone(440.0, 0.5, 0.25, 0.4))
        }

        #[test]
        fn test_silent_outside_tone() {
            let t = scheduled();
            assert_eq!(t.gain_at(1.0), 0.0);
            assert_eq!(t.gain_at(1.2499), 0.0);
            assert_eq!(t.gain_at(1.75), 0.0);
            assert_eq!(t.gain_at(3.0), 0.0);
        }

        #[test]
        fn test_linear_attack_to_volume() {
            let t = scheduled();
            assert!((t.gain_at(1.25 + ATTACK_SECS / 2.0) - 0.2).abs() < 1e-4);
            assert!((t.gain_at(1.25 + ATTACK_SECS) - 0.4).abs() < 1e-4);
        }

        #[test]
        fn test_exponential_decay_stays_positive() {
            let t = scheduled();
            let mid = t.gain_at(1.5);
            let late = t.gain_at(1.7499);
            assert!(mid < 0.4 && mid > late);
            assert!(late > 0.0);
            assert!((late - DECAY_FLOOR).abs() < 1e-3);
        }

        #[test]
        fn test_tone_shorter_than_attack() {
            let t = ScheduledTone::at(0.0, &tone(440.0, 0.005, 0.0, 0.3));
            assert_eq!(t.peak_at, t.stop);
            assert_eq!(t.gain_at(0.01), 0.0);
        }
    }

    mod wav {
        use super::*;

        #[test]
        fn test_header_and_length() {
            let tones = [ScheduledTone::at(0.0, &tone(440.0, 0.1, 0.0, 0.3))];
            let clip = render_wav(&tones, 0.0, 8_000);
            assert_eq!(&clip[0..4], b"RIFF");
            assert_eq!(&clip[8..12], b"WAVE");
            assert_eq!(&clip[36..40], b"data");
            let data_len = u32::from_le_bytes([clip[40], clip[41], clip[42], clip[43]]) as usize;
            assert_eq!(data_len, 800 * 2);
            assert_eq!(clip.len(), 44 + data_len);
        }

        #[test]
        fn test_leading_offset_is_silence() {
            let tones = [ScheduledTone::at(0.0, &tone(440.0, 0.1, 0.05, 0.3))];
            let clip = render_wav(&tones, 0.0, 1_000);
            let first = i16::from_le_bytes([clip[44], clip[45]]);
            assert_eq!(first, 0);
        }
    }

    mod playback {
        use super::*;

        #[test]
        fn test_clip_paths_are_not_reused() {
            let a = PcmAudioEngine::clip_path();
            let b = PcmAudioEngine::clip_path();
            assert_ne!(a, b);
        }

        #[test]
        fn test_player_is_reaped_and_clip_removed() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("clip.wav");
            fs::write(&path, b"RIFF").unwrap();
            let watcher = spawn_player("true", path.clone()).unwrap();
            watcher.join().unwrap();
            assert!(!path.exists());
        }

        #[test]
        fn test_missing_player_removes_clip() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("clip.wav");
            fs::write(&path, b"RIFF").unwrap();
            let err = spawn_player("claude-dash-no-such-player", path.clone()).unwrap_err();
            assert!(matches!(err, SoundError::Io(_)));
            assert!(!path.exists());
        }
    }
}
