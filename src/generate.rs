//! Long-audio generation pipeline.
//!
//! Splits input text into word-bounded chunks, runs each chunk through the
//! external generation backend in order, and concatenates the per-chunk
//! waveforms into one buffer.  Chunks are generated strictly sequentially:
//! each backend call is model inference and usually saturates the device
//! on its own.
//!
//! With a work directory configured, every finished chunk is written to
//! disk immediately, so a failure deep into a multi-minute job keeps the
//! earlier chunks; a rerun with the same inputs resumes from the first
//! missing chunk instead of starting over.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::{self, SAMPLE_RATE};
use crate::chunk::{estimate_spoken_time, split_text, SpokenTime};
use crate::error::{Error, Result};
use crate::catalog::PresetCatalog;
use crate::npz::VoicePrompt;

// ─────────────────────────────────────────────────────────────────────────────
// Backend seam
// ─────────────────────────────────────────────────────────────────────────────

/// Output of one backend call.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Mono samples at [`SAMPLE_RATE`] Hz.
    pub audio: Vec<f32>,
    /// Full token history of the generation, when the backend surfaces it.
    /// Can be persisted with [`crate::npz::save_npz_file`] to create a new
    /// voice preset from this clip.
    pub prompt: Option<VoicePrompt>,
}

/// The external neural generation service.
///
/// Implementations wrap whatever actually synthesises speech (a Bark-style
/// model stack, a remote inference server, a test stub).  The pipeline
/// only needs these two calls.
pub trait TtsModel {
    /// Ensure model weights are loaded.  Must be idempotent; the pipeline
    /// calls it once per job and may be expensive only on first use.
    fn load_models(&self) -> Result<()>;

    /// Synthesise one chunk of text.  `history_prompt` is a voice-preset
    /// key (`None` selects the backend's default voice); `temperature`
    /// of zero requests deterministic, most-likely decoding.
    fn generate(
        &self,
        text: &str,
        history_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<Generation>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Pipeline configuration.
///
/// The defaults reproduce the reference behaviour: 35 words per chunk,
/// greedy decoding, advisory 14-second chunk warning at 150 wpm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LongAudioConfig {
    /// Words per generation chunk.  Takes precedence over line splitting.
    pub words_per_chunk: usize,
    /// Non-blank lines per chunk; only used when `words_per_chunk` is 0.
    pub lines_per_chunk: usize,
    /// Sampling temperature for the semantic stage.  0 = deterministic.
    pub temperature: f32,
    /// Voice preset used when the caller supplies none.  `None` leaves
    /// voice selection to the backend's default.
    pub default_voice: Option<String>,
    /// Speaking rate assumed by the spoken-time estimate.
    pub wpm: f32,
    /// Estimated seconds above which a chunk is flagged as risky.
    pub chunk_time_limit: f32,
    /// Directory for per-chunk WAVs and the resume manifest.  `None`
    /// disables partial persistence.
    pub work_dir: Option<PathBuf>,
}

impl Default for LongAudioConfig {
    fn default() -> Self {
        Self {
            words_per_chunk: 35,
            lines_per_chunk: 0,
            temperature: 0.0,
            default_voice: None,
            wpm: crate::chunk::DEFAULT_WPM,
            chunk_time_limit: crate::chunk::DEFAULT_TIME_LIMIT,
            work_dir: None,
        }
    }
}

impl LongAudioConfig {
    /// Load configuration from a JSON file.  Missing fields keep their
    /// defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Resume manifest written next to the chunk WAVs.  Cached chunks are only
/// reused when a rerun produces an identical manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Manifest {
    voice: Option<String>,
    temperature: f32,
    words_per_chunk: usize,
    lines_per_chunk: usize,
    chunks: Vec<String>,
}

const MANIFEST_FILE: &str = "manifest.json";

fn chunk_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("chunk_{:04}.wav", index))
}

/// Delete all persisted chunk WAVs in the work directory.
fn remove_chunk_files(dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("chunk_") && name.ends_with(".wav") {
            let path = entry.path();
            std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one chunk of the pipeline.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub index: usize,
    pub text: String,
    pub estimate: SpokenTime,
    /// Generated samples, or the error that stopped the job here.
    pub audio: Result<Vec<f32>>,
    /// Token history surfaced by the backend for this chunk, if any.
    /// Absent for resumed chunks.
    pub prompt: Option<VoicePrompt>,
    /// True when the samples were reloaded from the work directory
    /// instead of regenerated.
    pub resumed: bool,
}

/// A completed long-form generation.
#[derive(Debug, Clone)]
pub struct LongAudio {
    /// All chunk waveforms concatenated in chunk order.
    pub audio: Vec<f32>,
    pub sample_rate: u32,
    pub chunk_count: usize,
    /// Token history of the final chunk, when the backend surfaced one.
    pub final_prompt: Option<VoicePrompt>,
}

impl LongAudio {
    pub fn duration_secs(&self) -> f32 {
        audio::duration_secs(&self.audio)
    }
}

/// Orchestrates chunking, per-chunk generation and concatenation.
pub struct LongAudioGenerator {
    config: LongAudioConfig,
    catalog: Option<PresetCatalog>,
}

impl LongAudioGenerator {
    pub fn new(config: LongAudioConfig) -> Self {
        Self { config, catalog: None }
    }

    /// Attach a preset catalog.  Voice keys are then validated against it
    /// before any backend call.
    pub fn with_catalog(mut self, catalog: PresetCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &LongAudioConfig {
        &self.config
    }

    pub fn catalog(&self) -> Option<&PresetCatalog> {
        self.catalog.as_ref()
    }

    /// Pick the effective voice and validate it against the catalog.
    fn resolve_voice(&self, voice: Option<&str>) -> Result<Option<String>> {
        let chosen = voice
            .map(str::to_string)
            .or_else(|| self.config.default_voice.clone());
        if let (Some(key), Some(catalog)) = (chosen.as_deref(), &self.catalog) {
            if !catalog.contains(key) {
                return Err(Error::UnknownVoice {
                    key: key.to_string(),
                    known: catalog.keys().map(String::from).collect(),
                });
            }
        }
        Ok(chosen)
    }

    /// Set up the work directory and decide whether its cached chunks may
    /// be reused.  Returns `(dir, cache_valid)`.
    fn prepare_work_dir(
        &self,
        voice: Option<&str>,
        chunks: &[String],
    ) -> Result<Option<(PathBuf, bool)>> {
        let Some(dir) = &self.config.work_dir else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let manifest = Manifest {
            voice: voice.map(String::from),
            temperature: self.config.temperature,
            words_per_chunk: self.config.words_per_chunk,
            lines_per_chunk: self.config.lines_per_chunk,
            chunks: chunks.to_vec(),
        };

        let manifest_path = dir.join(MANIFEST_FILE);
        let cache_valid = match std::fs::read(&manifest_path) {
            Ok(bytes) => match serde_json::from_slice::<Manifest>(&bytes) {
                Ok(previous) if previous == manifest => true,
                Ok(_) => {
                    log::warn!(
                        "work dir {} belongs to a different job; cached chunks ignored",
                        dir.display()
                    );
                    false
                }
                Err(e) => {
                    log::warn!("unreadable manifest in {}: {}", dir.display(), e);
                    false
                }
            },
            Err(_) => false,
        };

        if !cache_valid {
            // Stale chunk WAVs belong to a different job; a later rerun
            // would otherwise resume from them and splice the wrong
            // job's audio into the output.
            remove_chunk_files(dir)?;
            let json = serde_json::to_string_pretty(&manifest)
                .map_err(|e| Error::Config(e.to_string()))?;
            std::fs::write(&manifest_path, json).map_err(|e| Error::io(&manifest_path, e))?;
        }
        Ok(Some((dir.clone(), cache_valid)))
    }

    /// Run the pipeline chunk by chunk, reporting each step.
    ///
    /// Later chunks are not attempted after a failure; the failed chunk's
    /// error is carried in its outcome.  Errors returned directly are
    /// pre-generation failures (voice validation, model loading, work-dir
    /// setup).
    pub fn generate_chunks<M: TtsModel>(
        &self,
        model: &M,
        text: &str,
        voice: Option<&str>,
    ) -> Result<Vec<ChunkOutcome>> {
        let voice = self.resolve_voice(voice)?;

        log::info!("loading generation models…");
        model.load_models()?;

        let chunks = split_text(text, self.config.words_per_chunk, self.config.lines_per_chunk);
        let total = chunks.len();
        log::info!("processing {} chunk(s)", total);

        let work_dir = self.prepare_work_dir(voice.as_deref(), &chunks)?;

        let mut outcomes = Vec::with_capacity(total);
        for (index, chunk) in chunks.into_iter().enumerate() {
            let estimate =
                estimate_spoken_time(&chunk, self.config.wpm, self.config.chunk_time_limit);

            if let Some((dir, true)) = &work_dir {
                let cached = chunk_path(dir, index);
                if cached.exists() {
                    match audio::read_wav(&cached) {
                        Ok(samples) => {
                            log::info!("chunk {} restored from {}", index + 1, cached.display());
                            outcomes.push(ChunkOutcome {
                                index,
                                text: chunk,
                                estimate,
                                audio: Ok(samples),
                                prompt: None,
                                resumed: true,
                            });
                            continue;
                        }
                        Err(e) => {
                            log::warn!("cached chunk {} unreadable, regenerating: {}", index, e)
                        }
                    }
                }
            }

            log::info!("chunk {}/{}: {:?}", index + 1, total, chunk);
            log::info!("estimated spoken time: {:.2} s", estimate.seconds);
            if estimate.over_limit {
                log::warn!(
                    "chunk {} may exceed the {:.0} s reliable generation window; \
                     consider splitting tighter",
                    index + 1,
                    self.config.chunk_time_limit
                );
            }

            match model.generate(&chunk, voice.as_deref(), self.config.temperature) {
                Ok(generation) => {
                    if let Some((dir, _)) = &work_dir {
                        let path = chunk_path(dir, index);
                        if let Err(e) = audio::write_wav(&path, &generation.audio) {
                            log::warn!("failed to persist chunk {}: {}", index, e);
                        }
                    }
                    outcomes.push(ChunkOutcome {
                        index,
                        text: chunk,
                        estimate,
                        audio: Ok(generation.audio),
                        prompt: generation.prompt,
                        resumed: false,
                    });
                }
                Err(e) => {
                    log::error!("generation failed on chunk {}: {}", index, e);
                    outcomes.push(ChunkOutcome {
                        index,
                        text: chunk,
                        estimate,
                        audio: Err(e),
                        prompt: None,
                        resumed: false,
                    });
                    break;
                }
            }
        }
        Ok(outcomes)
    }

    /// Generate speech for the whole of `text` as one concatenated buffer.
    ///
    /// On a chunk failure the returned error names the chunk index; with a
    /// work directory configured the finished chunks are already on disk
    /// and a rerun resumes from the failure point.
    pub fn generate<M: TtsModel>(
        &self,
        model: &M,
        text: &str,
        voice: Option<&str>,
    ) -> Result<LongAudio> {
        let outcomes = self.generate_chunks(model, text, voice)?;

        let mut audio = Vec::new();
        let mut final_prompt = None;
        let chunk_count = outcomes.len();
        for outcome in outcomes {
            match outcome.audio {
                Ok(samples) => audio.extend(samples),
                Err(e) => {
                    return Err(Error::Chunk { index: outcome.index, source: Box::new(e) })
                }
            }
            if outcome.prompt.is_some() {
                final_prompt = outcome.prompt;
            }
        }
        Ok(LongAudio { audio, sample_rate: SAMPLE_RATE, chunk_count, final_prompt })
    }

    /// [`generate`](Self::generate) and write the result as a 16-bit PCM
    /// WAV file.
    pub fn generate_to_file<M: TtsModel>(
        &self,
        model: &M,
        text: &str,
        voice: Option<&str>,
        output: &Path,
    ) -> Result<LongAudio> {
        let result = self.generate(model, text, voice)?;
        audio::write_wav(output, &result.audio)?;
        Ok(result)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
