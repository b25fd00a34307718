//! Long-form pipeline demo with a stub backend.
//!
//! Wires the whole pipeline — catalog, chunking, per-chunk generation with
//! partial persistence, concatenation, WAV output — against a tone
//! generator standing in for the neural backend, so it runs without any
//! model weights.
//!
//! Usage:
//!   cargo run --example longform -- --text "some long text…"
//!   cargo run --example longform -- --prompts-dir bark/assets/prompts --voice en_speaker_1

use std::path::{Path, PathBuf};

use longbark::{
    Generation, LongAudioConfig, LongAudioGenerator, PresetCatalog, TtsModel, SAMPLE_RATE,
};

/// Stand-in backend: one short tone per chunk, pitch varied by text length.
struct ToneBackend;

impl TtsModel for ToneBackend {
    fn load_models(&self) -> longbark::Result<()> {
        // A real backend loads model weights here (idempotently).
        Ok(())
    }

    fn generate(
        &self,
        text: &str,
        _history_prompt: Option<&str>,
        _temperature: f32,
    ) -> longbark::Result<Generation> {
        let words = text.split_whitespace().count().max(1);
        let freq = 220.0 + (words % 12) as f32 * 20.0;
        let samples = (SAMPLE_RATE as usize / 4) * words.min(8);
        let audio = (0..samples)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (t * freq * std::f32::consts::TAU).sin() * 0.3
            })
            .collect();
        Ok(Generation { audio, prompt: None })
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // ── Parse simple CLI arguments ───────────────────────────────────────────
    let mut args = std::env::args().skip(1);

    let mut text = "Once upon a time, in a land far away, a narrator read a story \
                    so long that no single generation call could hold it."
        .to_string();
    let mut voice: Option<String> = None;
    let mut prompts_dir: Option<PathBuf> = None;
    let mut output = "longform.wav".to_string();
    let mut words_per_chunk = 35usize;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--text" => {
                if let Some(v) = args.next() {
                    text = v;
                }
            }
            "--voice" => voice = args.next(),
            "--prompts-dir" => prompts_dir = args.next().map(PathBuf::from),
            "--output" => {
                if let Some(v) = args.next() {
                    output = v;
                }
            }
            "--words" => {
                if let Some(v) = args.next() {
                    words_per_chunk = v.parse().unwrap_or(35);
                }
            }
            "--help" => {
                println!(
                    "Usage: longform [--text TEXT] [--voice KEY] \
                     [--prompts-dir DIR] [--output FILE] [--words N]"
                );
                return Ok(());
            }
            _ => {}
        }
    }

    let config = LongAudioConfig {
        words_per_chunk,
        work_dir: Some(PathBuf::from("longform_chunks")),
        ..Default::default()
    };
    let mut generator = LongAudioGenerator::new(config);

    // ── Voice-preset catalog (optional) ──────────────────────────────────────
    if let Some(dir) = prompts_dir {
        let catalog = PresetCatalog::open(&dir)?;
        println!("{}", catalog.render_listing());
        generator = generator.with_catalog(catalog);
    }

    println!("Voice  : {}", voice.as_deref().unwrap_or("(default)"));
    println!("Text   : {:?}", text);
    println!("Output : {}", output);
    println!();

    let result =
        generator.generate_to_file(&ToneBackend, &text, voice.as_deref(), Path::new(&output))?;

    println!(
        "Done: {} chunk(s), {:.2} s of audio.",
        result.chunk_count,
        result.duration_secs()
    );
    Ok(())
}
