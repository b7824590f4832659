#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pooled sound playback layered over an engine audio backend.
//!
//! Every sound effect owns a fixed pool of voices so several instances can
//! overlap; music owns exactly one voice. The backend performs the actual
//! mixing and reports which voices are still audible, while this crate decides
//! which voice a request lands on, applies volume settings and drives fades
//! from simulated time.

use std::{collections::HashMap, num::NonZeroUsize, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_VOICES_PER_SOUND: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(value) => value,
    None => panic!("default voice count must be non-zero"),
};

/// Sounds the game can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundKind {
    /// Button tap feedback.
    UiTap,
    /// Tower shot.
    Shoot,
    /// Projectile impact.
    Hit,
    /// Enemy destroyed.
    Explosion,
    /// Reward collected.
    Collect,
    /// Power-up activated.
    PowerUp,
    /// The player's base took fatal damage.
    BaseBroken,
    /// Block rotated during placement.
    Rotate,
    /// Level won.
    Victory,
    /// Level lost.
    Failed,
    /// Main menu background music.
    MenuMusic,
    /// In-level background music.
    GameplayMusic,
    /// Boss wave background music.
    BossMusic,
}

/// Identifier of an audio clip known to the backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    /// Creates a new clip identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Authoring description of a sound.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoundDefinition {
    /// Sound this definition backs.
    pub kind: SoundKind,
    /// Candidate clips; one is chosen at random per playback.
    pub clips: Vec<ClipId>,
    /// Base volume in `0.0..=1.0` before the master volume is applied.
    #[serde(default = "unit")]
    pub volume: f32,
    /// Base playback pitch.
    #[serde(default = "unit")]
    pub pitch: f32,
    /// Maximum random deviation applied to the pitch per playback.
    #[serde(default)]
    pub pitch_variation: f32,
    /// Whether regular playback loops.
    #[serde(default)]
    pub looping: bool,
    /// Whether the sound is background music rather than an effect.
    #[serde(default)]
    pub music: bool,
}

fn unit() -> f32 {
    1.0
}

/// Handle of a single backend voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u32);

impl VoiceId {
    /// Retrieves the numeric representation of the voice.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Parameters for starting a clip on a voice.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayRequest {
    /// Clip to play.
    pub clip: ClipId,
    /// Output volume in `0.0..=1.0`.
    pub volume: f32,
    /// Playback pitch.
    pub pitch: f32,
    /// Whether the clip loops until stopped.
    pub looping: bool,
    /// Whether the clip is layered as a one-shot instead of replacing the voice clip.
    pub one_shot: bool,
}

/// Engine-side mixer that owns the real audio voices.
pub trait AudioBackend {
    /// Starts playing a clip on the voice.
    fn start(&mut self, voice: VoiceId, request: &PlayRequest);
    /// Stops the voice.
    fn stop(&mut self, voice: VoiceId);
    /// Pauses the voice, keeping its playback position.
    fn pause(&mut self, voice: VoiceId);
    /// Resumes a paused voice.
    fn resume(&mut self, voice: VoiceId);
    /// Changes the output volume of the voice.
    fn set_volume(&mut self, voice: VoiceId, volume: f32);
    /// Reports whether the voice is currently audible.
    fn is_playing(&self, voice: VoiceId) -> bool;
}

/// Player-facing audio toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioSettings {
    /// Whether background music may play.
    pub music_enabled: bool,
    /// Whether sound effects may play.
    pub sound_enabled: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            music_enabled: true,
            sound_enabled: true,
        }
    }
}

impl AudioSettings {
    fn allows(&self, definition: &SoundDefinition) -> bool {
        if definition.music {
            self.music_enabled
        } else {
            self.sound_enabled
        }
    }
}

/// Behaviour when every voice of an effect is busy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaturationPolicy {
    /// Restart the voice that was started longest ago.
    #[default]
    StealOldest,
    /// Refuse the request with [`AudioError::PoolSaturated`].
    Reject,
}

/// Configuration parameters required to construct the audio manager.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    master_volume: f32,
    voices_per_sound: NonZeroUsize,
    saturation: SaturationPolicy,
}

impl Config {
    /// Creates a configuration; the master volume is clamped to `0.0..=1.0`.
    #[must_use]
    pub fn new(
        master_volume: f32,
        voices_per_sound: NonZeroUsize,
        saturation: SaturationPolicy,
    ) -> Self {
        Self {
            master_volume: master_volume.clamp(0.0, 1.0),
            voices_per_sound,
            saturation,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(1.0, DEFAULT_VOICES_PER_SOUND, SaturationPolicy::default())
    }
}

/// Reasons a playback request may be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AudioError {
    /// No usable definition is registered for the sound.
    #[error("sound {0:?} is not registered")]
    UnknownSound(SoundKind),
    /// The player disabled the sound's category.
    #[error("sound {0:?} is muted by the audio settings")]
    Muted(SoundKind),
    /// Every voice of the effect is busy and the policy rejects stealing.
    #[error("all voices for {0:?} are busy")]
    PoolSaturated(SoundKind),
    /// Fades only apply to music.
    #[error("sound {0:?} is not music")]
    NotMusic(SoundKind),
}

#[derive(Debug)]
struct Voice {
    id: VoiceId,
    started: u64,
    volume: f32,
}

#[derive(Debug)]
struct SoundEntry {
    definition: SoundDefinition,
    voices: Vec<Voice>,
}

#[derive(Debug)]
struct Fade {
    voice: VoiceId,
    from: f32,
    to: f32,
    elapsed: Duration,
    duration: Duration,
    stop_when_done: bool,
}

/// Owns the voice pools and routes playback requests to the backend.
#[derive(Debug)]
pub struct AudioManager<B> {
    backend: B,
    config: Config,
    settings: AudioSettings,
    sounds: HashMap<SoundKind, SoundEntry>,
    start_counter: u64,
    fades: Vec<Fade>,
}

impl<B: AudioBackend> AudioManager<B> {
    /// Registers the definitions and allocates their voices.
    ///
    /// Definitions without clips are skipped. A later definition for the
    /// same kind replaces an earlier one.
    pub fn new(
        definitions: impl IntoIterator<Item = SoundDefinition>,
        config: Config,
        backend: B,
    ) -> Self {
        let mut sounds = HashMap::new();
        let mut next_voice = 0u32;
        for definition in definitions {
            if definition.clips.is_empty() {
                warn!(kind = ?definition.kind, "audio clips are missing; sound skipped");
                continue;
            }
            if let Some(field) = invalid_field(&definition) {
                warn!(kind = ?definition.kind, field, "sound definition out of range; sound skipped");
                continue;
            }

            let voice_count = if definition.music {
                1
            } else {
                config.voices_per_sound.get()
            };
            let volume = definition.volume * config.master_volume;
            let voices = (0..voice_count)
                .map(|_| {
                    let id = VoiceId(next_voice);
                    next_voice += 1;
                    Voice {
                        id,
                        started: 0,
                        volume,
                    }
                })
                .collect();

            let kind = definition.kind;
            if sounds
                .insert(kind, SoundEntry { definition, voices })
                .is_some()
            {
                warn!(?kind, "duplicate sound definition replaced");
            }
        }

        Self {
            backend,
            config,
            settings: AudioSettings::default(),
            sounds,
            start_counter: 0,
            fades: Vec::new(),
        }
    }

    /// Provides read-only access to the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Provides mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Current player audio toggles.
    #[must_use]
    pub fn settings(&self) -> AudioSettings {
        self.settings
    }

    /// Replaces the player audio toggles and re-applies every volume.
    pub fn set_settings(&mut self, settings: AudioSettings) {
        self.settings = settings;
        self.update_all_volumes();
    }

    /// Current master volume.
    #[must_use]
    pub fn master_volume(&self) -> f32 {
        self.config.master_volume
    }

    /// Sets the master volume, clamped to `0.0..=1.0`, and re-applies every volume.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.config.master_volume = volume.clamp(0.0, 1.0);
        self.update_all_volumes();
    }

    /// Plays the sound on a pooled voice, replacing the voice's clip.
    pub fn play<R>(&mut self, kind: SoundKind, rng: &mut R) -> Result<VoiceId, AudioError>
    where
        R: Rng + ?Sized,
    {
        self.start(kind, 1.0, false, rng)
    }

    /// Plays the sound once without looping.
    pub fn play_one_shot<R>(&mut self, kind: SoundKind, rng: &mut R) -> Result<VoiceId, AudioError>
    where
        R: Rng + ?Sized,
    {
        self.start(kind, 1.0, true, rng)
    }

    /// Plays the sound once, scaling its volume by `scale`.
    pub fn play_with_volume<R>(
        &mut self,
        kind: SoundKind,
        scale: f32,
        rng: &mut R,
    ) -> Result<VoiceId, AudioError>
    where
        R: Rng + ?Sized,
    {
        self.start(kind, scale.max(0.0), true, rng)
    }

    /// Stops every voice of the sound.
    pub fn stop(&mut self, kind: SoundKind) {
        let Some(entry) = self.sounds.get(&kind) else {
            return;
        };
        for voice in &entry.voices {
            if entry.definition.music || self.backend.is_playing(voice.id) {
                self.backend.stop(voice.id);
            }
            self.fades.retain(|fade| fade.voice != voice.id);
        }
    }

    /// Pauses every audible voice of the sound.
    pub fn pause(&mut self, kind: SoundKind) {
        let Some(entry) = self.sounds.get(&kind) else {
            return;
        };
        for voice in &entry.voices {
            if entry.definition.music || self.backend.is_playing(voice.id) {
                self.backend.pause(voice.id);
            }
        }
    }

    /// Resumes every voice of the sound.
    pub fn resume(&mut self, kind: SoundKind) {
        let Some(entry) = self.sounds.get(&kind) else {
            return;
        };
        for voice in &entry.voices {
            self.backend.resume(voice.id);
        }
    }

    /// Reports whether any voice of the sound is audible.
    #[must_use]
    pub fn is_playing(&self, kind: SoundKind) -> bool {
        self.sounds.get(&kind).map_or(false, |entry| {
            entry
                .voices
                .iter()
                .any(|voice| self.backend.is_playing(voice.id))
        })
    }

    /// Stops every sound effect, leaving music untouched.
    pub fn stop_all_sounds(&mut self) {
        self.stop_matching(false);
    }

    /// Stops every music track.
    pub fn stop_all_music(&mut self) {
        self.stop_matching(true);
    }

    /// Stops everything.
    pub fn stop_all(&mut self) {
        self.stop_all_sounds();
        self.stop_all_music();
    }

    /// Starts the music at zero volume and ramps it to its target volume.
    pub fn fade_in<R>(
        &mut self,
        kind: SoundKind,
        duration: Duration,
        rng: &mut R,
    ) -> Result<VoiceId, AudioError>
    where
        R: Rng + ?Sized,
    {
        self.require_music(kind)?;
        let voice = self.start(kind, 1.0, false, rng)?;
        let target = self.voice_volume(voice);
        self.set_voice_volume(voice, 0.0);
        self.fades.push(Fade {
            voice,
            from: 0.0,
            to: target,
            elapsed: Duration::ZERO,
            duration,
            stop_when_done: false,
        });
        Ok(voice)
    }

    /// Ramps the music down from its current volume and stops it.
    pub fn fade_out(&mut self, kind: SoundKind, duration: Duration) -> Result<(), AudioError> {
        self.require_music(kind)?;
        let Some(voice) = self
            .sounds
            .get(&kind)
            .and_then(|entry| entry.voices.first())
            .map(|voice| voice.id)
        else {
            return Err(AudioError::UnknownSound(kind));
        };

        let from = self.voice_volume(voice);
        self.fades.retain(|fade| fade.voice != voice);
        self.fades.push(Fade {
            voice,
            from,
            to: 0.0,
            elapsed: Duration::ZERO,
            duration,
            stop_when_done: true,
        });
        Ok(())
    }

    /// Switches background music, stopping any other track first.
    pub fn play_music<R>(
        &mut self,
        kind: SoundKind,
        fade: Option<Duration>,
        rng: &mut R,
    ) -> Result<VoiceId, AudioError>
    where
        R: Rng + ?Sized,
    {
        self.stop_all_music();
        match fade {
            Some(duration) => self.fade_in(kind, duration, rng),
            None => self.play(kind, rng),
        }
    }

    /// Fades `from` out, if audible, while fading `to` in.
    pub fn crossfade<R>(
        &mut self,
        from: SoundKind,
        to: SoundKind,
        duration: Duration,
        rng: &mut R,
    ) -> Result<VoiceId, AudioError>
    where
        R: Rng + ?Sized,
    {
        if self.is_playing(from) {
            self.fade_out(from, duration)?;
        }
        self.fade_in(to, duration, rng)
    }

    /// Advances active fades by `dt` of simulated time.
    pub fn advance(&mut self, dt: Duration) {
        if self.fades.is_empty() {
            return;
        }

        let mut fades = std::mem::take(&mut self.fades);
        fades.retain_mut(|fade| {
            fade.elapsed = fade.elapsed.saturating_add(dt);
            let progress = if fade.duration.is_zero() {
                1.0
            } else {
                (fade.elapsed.as_secs_f32() / fade.duration.as_secs_f32()).min(1.0)
            };
            let volume = if self.voice_allowed(fade.voice) {
                fade.from + (fade.to - fade.from) * progress
            } else {
                0.0
            };
            self.set_voice_volume(fade.voice, volume);

            if progress < 1.0 {
                return true;
            }
            if fade.stop_when_done {
                self.backend.stop(fade.voice);
            }
            debug!(voice = fade.voice.get(), "fade finished");
            false
        });
        fades.append(&mut self.fades);
        self.fades = fades;
    }

    fn start<R>(
        &mut self,
        kind: SoundKind,
        scale: f32,
        one_shot: bool,
        rng: &mut R,
    ) -> Result<VoiceId, AudioError>
    where
        R: Rng + ?Sized,
    {
        let Some(entry) = self.sounds.get_mut(&kind) else {
            warn!(?kind, "sound not found");
            return Err(AudioError::UnknownSound(kind));
        };
        if !self.settings.allows(&entry.definition) {
            return Err(AudioError::Muted(kind));
        }

        let Some(index) = select_voice(entry, &self.backend, self.config.saturation) else {
            debug!(?kind, "voice pool saturated");
            return Err(AudioError::PoolSaturated(kind));
        };

        let definition = &entry.definition;
        let request = PlayRequest {
            clip: pick_clip(definition, rng),
            volume: definition.volume * self.config.master_volume * scale,
            pitch: pick_pitch(definition, rng),
            looping: definition.looping && !one_shot,
            one_shot,
        };

        self.start_counter += 1;
        let voice = &mut entry.voices[index];
        voice.started = self.start_counter;
        voice.volume = request.volume;
        let id = voice.id;

        self.fades.retain(|fade| fade.voice != id);
        self.backend.start(id, &request);
        Ok(id)
    }

    fn require_music(&self, kind: SoundKind) -> Result<(), AudioError> {
        match self.sounds.get(&kind) {
            None => Err(AudioError::UnknownSound(kind)),
            Some(entry) if !entry.definition.music => Err(AudioError::NotMusic(kind)),
            Some(_) => Ok(()),
        }
    }

    fn stop_matching(&mut self, music: bool) {
        for entry in self.sounds.values() {
            if entry.definition.music != music {
                continue;
            }
            for voice in &entry.voices {
                if music || self.backend.is_playing(voice.id) {
                    self.backend.stop(voice.id);
                }
                self.fades.retain(|fade| fade.voice != voice.id);
            }
        }
    }

    fn update_all_volumes(&mut self) {
        for entry in self.sounds.values_mut() {
            let target = if self.settings.allows(&entry.definition) {
                entry.definition.volume * self.config.master_volume
            } else {
                0.0
            };
            for voice in &mut entry.voices {
                voice.volume = target;
                self.backend.set_volume(voice.id, target);
            }
        }
    }

    fn voice_allowed(&self, id: VoiceId) -> bool {
        self.sounds
            .values()
            .find(|entry| entry.voices.iter().any(|voice| voice.id == id))
            .map_or(false, |entry| self.settings.allows(&entry.definition))
    }

    fn voice_volume(&self, id: VoiceId) -> f32 {
        self.sounds
            .values()
            .flat_map(|entry| entry.voices.iter())
            .find(|voice| voice.id == id)
            .map_or(0.0, |voice| voice.volume)
    }

    fn set_voice_volume(&mut self, id: VoiceId, volume: f32) {
        if let Some(voice) = self
            .sounds
            .values_mut()
            .flat_map(|entry| entry.voices.iter_mut())
            .find(|voice| voice.id == id)
        {
            voice.volume = volume;
        }
        self.backend.set_volume(id, volume);
    }
}

fn invalid_field(definition: &SoundDefinition) -> Option<&'static str> {
    if !(0.0..=1.0).contains(&definition.volume) {
        Some("volume")
    } else if !definition.pitch.is_finite() || definition.pitch <= 0.0 {
        Some("pitch")
    } else if !definition.pitch_variation.is_finite() || definition.pitch_variation < 0.0 {
        Some("pitch_variation")
    } else {
        None
    }
}

fn select_voice<B: AudioBackend>(
    entry: &SoundEntry,
    backend: &B,
    policy: SaturationPolicy,
) -> Option<usize> {
    if entry.definition.music {
        return Some(0);
    }

    if let Some(index) = entry
        .voices
        .iter()
        .position(|voice| !backend.is_playing(voice.id))
    {
        return Some(index);
    }

    match policy {
        SaturationPolicy::Reject => None,
        SaturationPolicy::StealOldest => entry
            .voices
            .iter()
            .enumerate()
            .min_by_key(|(_, voice)| voice.started)
            .map(|(index, _)| index),
    }
}

fn pick_clip<R: Rng + ?Sized>(definition: &SoundDefinition, rng: &mut R) -> ClipId {
    let clips = &definition.clips;
    let index = if clips.len() > 1 {
        rng.gen_range(0..clips.len())
    } else {
        0
    };
    clips[index].clone()
}

fn pick_pitch<R: Rng + ?Sized>(definition: &SoundDefinition, rng: &mut R) -> f32 {
    let variation = definition.pitch_variation;
    if variation > 0.0 {
        definition.pitch + rng.gen_range(-variation..variation)
    } else {
        definition.pitch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[derive(Debug, Default)]
    struct FakeBackend {
        playing: HashSet<VoiceId>,
        paused: HashSet<VoiceId>,
        volumes: HashMap<VoiceId, f32>,
        started: Vec<(VoiceId, PlayRequest)>,
    }

    impl FakeBackend {
        fn finish(&mut self, voice: VoiceId) {
            let _ = self.playing.remove(&voice);
        }
    }

    impl AudioBackend for FakeBackend {
        fn start(&mut self, voice: VoiceId, request: &PlayRequest) {
            let _ = self.playing.insert(voice);
            let _ = self.volumes.insert(voice, request.volume);
            self.started.push((voice, request.clone()));
        }

        fn stop(&mut self, voice: VoiceId) {
            let _ = self.playing.remove(&voice);
            let _ = self.paused.remove(&voice);
        }

        fn pause(&mut self, voice: VoiceId) {
            if self.playing.remove(&voice) {
                let _ = self.paused.insert(voice);
            }
        }

        fn resume(&mut self, voice: VoiceId) {
            if self.paused.remove(&voice) {
                let _ = self.playing.insert(voice);
            }
        }

        fn set_volume(&mut self, voice: VoiceId, volume: f32) {
            let _ = self.volumes.insert(voice, volume);
        }

        fn is_playing(&self, voice: VoiceId) -> bool {
            self.playing.contains(&voice)
        }
    }

    #[derive(Debug, Deserialize)]
    struct SoundBank {
        sounds: Vec<SoundDefinition>,
    }

    const BANK: &str = r#"
        [[sounds]]
        kind = "shoot"
        clips = ["shoot_a", "shoot_b"]
        volume = 0.5
        pitch_variation = 0.1

        [[sounds]]
        kind = "hit"
        clips = []

        [[sounds]]
        kind = "menu_music"
        clips = ["menu_theme"]
        volume = 0.8
        looping = true
        music = true

        [[sounds]]
        kind = "gameplay_music"
        clips = ["battle_theme"]
        looping = true
        music = true
    "#;

    fn manager(voices: usize, saturation: SaturationPolicy) -> AudioManager<FakeBackend> {
        let bank: SoundBank = toml::from_str(BANK).expect("sound bank parses");
        let voices = NonZeroUsize::new(voices).expect("non-zero voices");
        AudioManager::new(
            bank.sounds,
            Config::new(1.0, voices, saturation),
            FakeBackend::default(),
        )
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(0x00a0_d10)
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn free_voices_are_preferred() {
        let mut audio = manager(3, SaturationPolicy::StealOldest);
        let mut rng = rng();

        let first = audio.play(SoundKind::Shoot, &mut rng).expect("first voice");
        let second = audio.play(SoundKind::Shoot, &mut rng).expect("second voice");
        assert_ne!(first, second);

        audio.backend_mut().finish(first);
        let third = audio.play(SoundKind::Shoot, &mut rng).expect("reused voice");
        assert_eq!(third, first);
    }

    #[test]
    fn saturated_pool_steals_oldest_voice() {
        let mut audio = manager(2, SaturationPolicy::StealOldest);
        let mut rng = rng();

        let first = audio.play(SoundKind::Shoot, &mut rng).expect("voice");
        let second = audio.play(SoundKind::Shoot, &mut rng).expect("voice");
        let stolen = audio.play(SoundKind::Shoot, &mut rng).expect("stolen voice");
        assert_eq!(stolen, first);

        let stolen_again = audio.play(SoundKind::Shoot, &mut rng).expect("stolen voice");
        assert_eq!(stolen_again, second);
    }

    #[test]
    fn saturated_pool_can_reject() {
        let mut audio = manager(1, SaturationPolicy::Reject);
        let mut rng = rng();

        let _ = audio.play(SoundKind::Shoot, &mut rng).expect("voice");
        assert_eq!(
            audio.play(SoundKind::Shoot, &mut rng),
            Err(AudioError::PoolSaturated(SoundKind::Shoot))
        );
    }

    #[test]
    fn sounds_without_clips_are_not_registered() {
        let mut audio = manager(2, SaturationPolicy::StealOldest);
        let mut rng = rng();
        assert_eq!(
            audio.play(SoundKind::Hit, &mut rng),
            Err(AudioError::UnknownSound(SoundKind::Hit))
        );
        assert!(!audio.is_playing(SoundKind::Hit));
    }

    #[test]
    fn disabled_categories_are_muted() {
        let mut audio = manager(2, SaturationPolicy::StealOldest);
        let mut rng = rng();
        audio.set_settings(AudioSettings {
            music_enabled: true,
            sound_enabled: false,
        });

        assert_eq!(
            audio.play(SoundKind::Shoot, &mut rng),
            Err(AudioError::Muted(SoundKind::Shoot))
        );
        assert!(audio.play(SoundKind::MenuMusic, &mut rng).is_ok());
        assert_eq!(audio.backend().started.len(), 1);
    }

    #[test]
    fn playback_applies_volume_pitch_and_clip_choice() {
        let mut audio = manager(2, SaturationPolicy::StealOldest);
        let mut rng = rng();
        audio.set_master_volume(0.5);

        let _ = audio
            .play_with_volume(SoundKind::Shoot, 0.5, &mut rng)
            .expect("voice");
        let (_, request) = audio.backend().started.last().expect("started");
        assert!(approx(request.volume, 0.125));
        assert!(request.pitch >= 0.9 && request.pitch < 1.1);
        assert!(["shoot_a", "shoot_b"].contains(&request.clip.as_str()));
        assert!(request.one_shot);
        assert!(!request.looping);
    }

    #[test]
    fn master_volume_is_clamped_and_reapplied() {
        let mut audio = manager(1, SaturationPolicy::StealOldest);
        let mut rng = rng();
        let voice = audio.play(SoundKind::MenuMusic, &mut rng).expect("music");

        audio.set_master_volume(4.0);
        assert!(approx(audio.master_volume(), 1.0));
        assert!(approx(audio.backend().volumes[&voice], 0.8));

        audio.set_settings(AudioSettings {
            music_enabled: false,
            sound_enabled: true,
        });
        assert!(approx(audio.backend().volumes[&voice], 0.0));
    }

    #[test]
    fn fade_in_reaches_target_volume() {
        let mut audio = manager(1, SaturationPolicy::StealOldest);
        let mut rng = rng();
        let voice = audio
            .fade_in(SoundKind::MenuMusic, Duration::from_secs(2), &mut rng)
            .expect("music");
        assert!(approx(audio.backend().volumes[&voice], 0.0));

        audio.advance(Duration::from_secs(1));
        assert!(approx(audio.backend().volumes[&voice], 0.4));

        audio.advance(Duration::from_secs(5));
        assert!(approx(audio.backend().volumes[&voice], 0.8));
        assert!(audio.is_playing(SoundKind::MenuMusic));
    }

    #[test]
    fn fades_stay_silent_while_music_is_disabled() {
        let mut audio = manager(1, SaturationPolicy::StealOldest);
        let mut rng = rng();
        let voice = audio
            .fade_in(SoundKind::MenuMusic, Duration::from_secs(2), &mut rng)
            .expect("music");

        audio.set_settings(AudioSettings {
            music_enabled: false,
            sound_enabled: true,
        });
        audio.advance(Duration::from_secs(1));
        assert!(approx(audio.backend().volumes[&voice], 0.0));

        audio.advance(Duration::from_secs(2));
        assert!(approx(audio.backend().volumes[&voice], 0.0));
    }

    #[test]
    fn out_of_range_definitions_are_skipped() {
        let bank: SoundBank = toml::from_str(
            r#"
            [[sounds]]
            kind = "hit"
            clips = ["hit"]
            pitch_variation = inf

            [[sounds]]
            kind = "collect"
            clips = ["coin"]
            volume = 1.5

            [[sounds]]
            kind = "rotate"
            clips = ["click"]
            pitch = nan

            [[sounds]]
            kind = "victory"
            clips = ["fanfare"]
            volume = 1.0
            pitch_variation = 0.2
            "#,
        )
        .expect("sound bank parses");
        let mut audio = AudioManager::new(bank.sounds, Config::default(), FakeBackend::default());
        let mut rng = rng();

        for kind in [SoundKind::Hit, SoundKind::Collect, SoundKind::Rotate] {
            assert_eq!(
                audio.play(kind, &mut rng),
                Err(AudioError::UnknownSound(kind))
            );
        }
        assert!(audio.play(SoundKind::Victory, &mut rng).is_ok());
    }

    #[test]
    fn fade_out_stops_music() {
        let mut audio = manager(1, SaturationPolicy::StealOldest);
        let mut rng = rng();
        let _ = audio.play(SoundKind::MenuMusic, &mut rng).expect("music");

        audio
            .fade_out(SoundKind::MenuMusic, Duration::from_millis(500))
            .expect("fade");
        audio.advance(Duration::from_millis(250));
        assert!(audio.is_playing(SoundKind::MenuMusic));

        audio.advance(Duration::from_millis(250));
        assert!(!audio.is_playing(SoundKind::MenuMusic));
    }

    #[test]
    fn fades_require_music() {
        let mut audio = manager(1, SaturationPolicy::StealOldest);
        let mut rng = rng();
        assert_eq!(
            audio.fade_in(SoundKind::Shoot, Duration::from_secs(1), &mut rng),
            Err(AudioError::NotMusic(SoundKind::Shoot))
        );
    }

    #[test]
    fn play_music_replaces_current_track() {
        let mut audio = manager(1, SaturationPolicy::StealOldest);
        let mut rng = rng();
        let _ = audio
            .play_music(SoundKind::MenuMusic, None, &mut rng)
            .expect("menu");
        let _ = audio
            .play_music(SoundKind::GameplayMusic, None, &mut rng)
            .expect("gameplay");

        assert!(!audio.is_playing(SoundKind::MenuMusic));
        assert!(audio.is_playing(SoundKind::GameplayMusic));
    }

    #[test]
    fn crossfade_swaps_tracks() {
        let mut audio = manager(1, SaturationPolicy::StealOldest);
        let mut rng = rng();
        let _ = audio.play(SoundKind::MenuMusic, &mut rng).expect("menu");

        let incoming = audio
            .crossfade(
                SoundKind::MenuMusic,
                SoundKind::GameplayMusic,
                Duration::from_secs(1),
                &mut rng,
            )
            .expect("crossfade");
        audio.advance(Duration::from_secs(1));

        assert!(!audio.is_playing(SoundKind::MenuMusic));
        assert!(audio.is_playing(SoundKind::GameplayMusic));
        assert!(approx(audio.backend().volumes[&incoming], 1.0));
    }

    #[test]
    fn pause_and_resume_round_trip_audible_voices() {
        let mut audio = manager(2, SaturationPolicy::StealOldest);
        let mut rng = rng();
        let _ = audio.play(SoundKind::Shoot, &mut rng).expect("voice");

        audio.pause(SoundKind::Shoot);
        assert!(!audio.is_playing(SoundKind::Shoot));

        audio.resume(SoundKind::Shoot);
        assert!(audio.is_playing(SoundKind::Shoot));
    }

    #[test]
    fn stop_all_sounds_keeps_music() {
        let mut audio = manager(2, SaturationPolicy::StealOldest);
        let mut rng = rng();
        let _ = audio.play(SoundKind::Shoot, &mut rng).expect("voice");
        let _ = audio.play(SoundKind::MenuMusic, &mut rng).expect("music");

        audio.stop_all_sounds();
        assert!(!audio.is_playing(SoundKind::Shoot));
        assert!(audio.is_playing(SoundKind::MenuMusic));

        audio.stop_all();
        assert!(!audio.is_playing(SoundKind::MenuMusic));
    }
}
