//! # longbark
//!
//! Long-form text-to-speech front end for Bark-style neural backends.
//!
//! The backend model is only reliable for roughly 14 seconds of speech per
//! call, so this crate cuts long text into word-bounded chunks, generates
//! each chunk in order through a [`TtsModel`] implementation, and
//! concatenates the per-chunk waveforms into one 24 kHz buffer.  Finished
//! chunks can be persisted to a work directory as they complete, letting a
//! failed multi-minute job resume from the first missing chunk.
//!
//! Voice identity is conditioned by `.npz` preset files (semantic, coarse
//! and fine token histories); [`PresetCatalog`] discovers them, groups
//! them by language for display, and validates keys before generation.
//!
//! ## Quick start
//!
//! ```no_run
//! use longbark::{LongAudioConfig, LongAudioGenerator, PresetCatalog, TtsModel};
//! use std::path::Path;
//!
//! // Wrap your inference stack in the TtsModel trait.
//! # struct MyBackend;
//! # impl TtsModel for MyBackend {
//! #     fn load_models(&self) -> longbark::Result<()> { unimplemented!() }
//! #     fn generate(&self, _: &str, _: Option<&str>, _: f32)
//! #         -> longbark::Result<longbark::Generation> { unimplemented!() }
//! # }
//! let backend = MyBackend;
//!
//! let catalog = PresetCatalog::open("assets/prompts")?;
//! println!("{}", catalog.render_listing());
//!
//! let generator = LongAudioGenerator::new(LongAudioConfig::default())
//!     .with_catalog(catalog);
//! generator.generate_to_file(
//!     &backend,
//!     "A very long text…",
//!     Some("en_speaker_1"),
//!     Path::new("speech.wav"),
//! )?;
//! # Ok::<(), longbark::Error>(())
//! ```
//!
//! ## Pipeline
//! 1. **Chunking** — text split every 35 words (configurable).
//! 2. **Estimate** — advisory spoken-time check per chunk, logged.
//! 3. **Generation** — one backend call per chunk, fixed temperature.
//! 4. **Persistence** — each finished chunk written to the work dir.
//! 5. **Concat** — chunk waveforms joined in order, written as 16-bit PCM.

pub mod audio;
pub mod catalog;
pub mod chunk;
pub mod error;
pub mod generate;
pub mod npz;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use audio::SAMPLE_RATE;
pub use catalog::{file_category, PresetCatalog, VoicePreset, SUPPORTED_LANGS};
pub use chunk::{estimate_spoken_time, split_text, SpokenTime};
pub use error::{Error, Result};
pub use generate::{
    ChunkOutcome, Generation, LongAudio, LongAudioConfig, LongAudioGenerator, TtsModel,
};
pub use npz::{load_voice_prompt, save_npz_file, PromptArray, VoicePrompt};
