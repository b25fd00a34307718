//! Voice-preset catalog.
//!
//! Scans a directory of `.npz` voice presets, reads their embedded
//! `name`/`desc` metadata and groups them into display categories derived
//! from the filename prefix: a known two-letter language code maps to the
//! language's display name, any other prefix becomes its own capitalised
//! category, and files with no prefix land under "Other".
//!
//! The catalog is an explicit object with a [`rebuild`](PresetCatalog::rebuild)
//! operation rather than process-wide state, so callers control when the
//! directory is re-scanned.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Write as _,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::npz::read_preset_metadata;

/// Preset file extension.
pub const PRESET_EXT: &str = ".npz";

/// Language display names keyed by the two-letter filename prefix.
pub const SUPPORTED_LANGS: [(&str, &str); 13] = [
    ("English", "en"),
    ("German", "de"),
    ("Spanish", "es"),
    ("French", "fr"),
    ("Hindi", "hi"),
    ("Italian", "it"),
    ("Japanese", "ja"),
    ("Korean", "ko"),
    ("Polish", "pl"),
    ("Portuguese", "pt"),
    ("Russian", "ru"),
    ("Turkish", "tr"),
    ("Chinese", "zh"),
];

/// One discovered voice preset.
///
/// `key` is the stable identifier passed to the generator as the history
/// prompt; `name` and `desc` are optional display metadata embedded in the
/// file (empty when absent).
#[derive(Debug, Clone, PartialEq)]
pub struct VoicePreset {
    pub key: String,
    pub filename: String,
    pub name: String,
    pub desc: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Filename parsing — pure, no filesystem access
// ─────────────────────────────────────────────────────────────────────────────

/// Leading prefix up to an underscore.  The two-letter branch is tried
/// first so `en_speaker_1` yields `en`, not `en_speaker`.
static RE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([a-z]{2}|\w+)_").unwrap());

/// Secondary suffix used as the in-category sort key, e.g. `_speaker_1`.
static RE_SORT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_\w+(_\d+)?\.npz$").unwrap());

/// First character uppercased, the rest lowercased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Derive `(category, sort_key)` from a preset filename.
///
/// The sort key is the matched suffix without the extension, falling back
/// to the whole filename when no suffix pattern matches.
pub fn file_category(filename: &str) -> (String, String) {
    let category = match RE_PREFIX.captures(filename) {
        Some(caps) => {
            let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            match SUPPORTED_LANGS.iter().find(|(_, code)| *code == prefix) {
                Some((lang, _)) => (*lang).to_string(),
                None => capitalize(prefix),
            }
        }
        None => "Other".to_string(),
    };

    let sort_key = RE_SORT_SUFFIX
        .find(filename)
        .map(|m| m.as_str().trim_end_matches(PRESET_EXT).to_string())
        .unwrap_or_else(|| filename.to_string());

    (category, sort_key)
}

// ─────────────────────────────────────────────────────────────────────────────
// PresetCatalog
// ─────────────────────────────────────────────────────────────────────────────

/// Rebuildable view of the presets available in one directory.
#[derive(Debug)]
pub struct PresetCatalog {
    dir: PathBuf,
    categories: BTreeMap<String, Vec<VoicePreset>>,
    keys: BTreeSet<String>,
}

impl PresetCatalog {
    /// Scan `dir` and build the catalog.  The directory must exist; an
    /// individual preset that cannot be parsed is skipped with a warning.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let mut catalog =
            Self { dir: dir.into(), categories: BTreeMap::new(), keys: BTreeSet::new() };
        catalog.rebuild()?;
        Ok(catalog)
    }

    /// Re-scan the directory, replacing the previous contents.
    pub fn rebuild(&mut self) -> Result<()> {
        let mut categories: BTreeMap<String, Vec<VoicePreset>> = BTreeMap::new();
        let mut keys = BTreeSet::new();

        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| crate::Error::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| crate::Error::io(&self.dir, e))?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            if !filename.ends_with(PRESET_EXT) {
                continue;
            }

            let meta = match read_preset_metadata(&entry.path()) {
                Ok(meta) => meta,
                Err(e) => {
                    log::warn!("skipping: {}", e);
                    continue;
                }
            };

            let key = filename.trim_end_matches(PRESET_EXT).to_string();
            let (category, _) = file_category(&filename);
            keys.insert(key.clone());
            categories.entry(category).or_default().push(VoicePreset {
                key,
                filename,
                name: meta.name,
                desc: meta.desc,
            });
        }

        for presets in categories.values_mut() {
            presets.sort_by(|a, b| {
                let ka = (file_category(&a.filename).1, &a.filename);
                let kb = (file_category(&b.filename).1, &b.filename);
                ka.cmp(&kb)
            });
        }

        self.categories = categories;
        self.keys = keys;
        log::info!("preset catalog: {} presets in {}", self.keys.len(), self.dir.display());
        Ok(())
    }

    /// Directory this catalog scans.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `key` names a discovered preset.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// All valid preset keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Number of discovered presets.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Presets grouped by category, each group in browse order.
    pub fn categories(&self) -> &BTreeMap<String, Vec<VoicePreset>> {
        &self.categories
    }

    /// Look up a preset by key.
    pub fn get(&self, key: &str) -> Option<&VoicePreset> {
        self.categories.values().flatten().find(|p| p.key == key)
    }

    /// Path of the preset file for `key`, if discovered.
    pub fn path_for(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(|p| self.dir.join(&p.filename))
    }

    /// Human-browsable listing of all presets, grouped by category.
    pub fn render_listing(&self) -> String {
        let mut out = String::from("Available voice presets:\n");
        for (category, presets) in &self.categories {
            let _ = writeln!(out, "\n  {}:", category);
            for preset in presets {
                let mut line = format!("    {}", preset.key);
                if !preset.name.is_empty() {
                    let _ = write!(line, "  \"{}\"", preset.name);
                }
                if !preset.desc.is_empty() {
                    let _ = write!(line, "  {}", preset.desc);
                }
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npz::{save_npz_file, PromptArray, VoicePrompt};

    fn dummy_prompt() -> VoicePrompt {
        VoicePrompt {
            semantic_prompt: PromptArray::new(vec![1, 2, 3]),
            coarse_prompt: PromptArray { shape: vec![2, 2], data: vec![4, 5, 6, 7] },
            fine_prompt: PromptArray { shape: vec![2, 2], data: vec![8, 9, 10, 11] },
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("longbark-catalog-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_language_prefix_maps_to_display_name() {
        assert_eq!(file_category("en_speaker_1.npz").0, "English");
        assert_eq!(file_category("de_speaker_3.npz").0, "German");
        assert_eq!(file_category("zh_speaker_9.npz").0, "Chinese");
    }

    #[test]
    fn test_unknown_prefix_is_capitalized() {
        assert_eq!(file_category("custom_voice.npz").0, "Custom");
        assert_eq!(file_category("narrator_calm.npz").0, "Narrator");
    }

    #[test]
    fn test_no_prefix_is_other() {
        assert_eq!(file_category("noise.npz").0, "Other");
    }

    #[test]
    fn test_sort_key_from_suffix() {
        assert_eq!(file_category("en_speaker_1.npz").1, "_speaker_1");
        assert_eq!(file_category("custom_voice.npz").1, "_voice");
        // No underscore suffix at all: fall back to the full filename.
        assert_eq!(file_category("noise.npz").1, "noise.npz");
    }

    #[test]
    fn test_two_letter_branch_takes_precedence() {
        // Without the two-letter alternative the greedy prefix would be
        // "en_speaker"; the language branch must win.
        assert_eq!(file_category("en_speaker_1.npz").0, "English");
    }

    #[test]
    fn test_catalog_groups_and_sorts() {
        let dir = temp_dir("groups");
        for name in [
            "en_speaker_2.npz",
            "en_speaker_10.npz",
            "en_fiery.npz",
            "custom_voice.npz",
            "noise.npz",
        ] {
            save_npz_file(&dir.join(name), &dummy_prompt()).unwrap();
        }

        let catalog = PresetCatalog::open(&dir).unwrap();
        assert_eq!(catalog.len(), 5);
        assert!(catalog.contains("en_speaker_2"));
        assert!(!catalog.contains("announcer"));

        let categories = catalog.categories();
        assert_eq!(
            categories.keys().collect::<Vec<_>>(),
            vec!["Custom", "English", "Other"]
        );

        // Suffix sort key is primary: _fiery < _speaker_10 < _speaker_2
        // (lexicographic, matching the reference ordering).
        let english: Vec<&str> =
            categories["English"].iter().map(|p| p.key.as_str()).collect();
        assert_eq!(english, vec!["en_fiery", "en_speaker_10", "en_speaker_2"]);

        assert_eq!(categories["Other"][0].key, "noise");
    }

    #[test]
    fn test_corrupt_preset_is_skipped() {
        let dir = temp_dir("corrupt");
        save_npz_file(&dir.join("en_good.npz"), &dummy_prompt()).unwrap();
        std::fs::write(dir.join("en_bad.npz"), b"not a zip archive").unwrap();

        let catalog = PresetCatalog::open(&dir).unwrap();
        assert!(catalog.contains("en_good"));
        assert!(!catalog.contains("en_bad"));
    }

    #[test]
    fn test_rebuild_picks_up_new_files() {
        let dir = temp_dir("rebuild");
        save_npz_file(&dir.join("en_first.npz"), &dummy_prompt()).unwrap();
        let mut catalog = PresetCatalog::open(&dir).unwrap();
        assert_eq!(catalog.len(), 1);

        save_npz_file(&dir.join("en_second.npz"), &dummy_prompt()).unwrap();
        catalog.rebuild().unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("en_second"));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = temp_dir("missing").join("does-not-exist");
        assert!(PresetCatalog::open(&dir).is_err());
    }

    #[test]
    fn test_non_npz_files_ignored() {
        let dir = temp_dir("ignore");
        save_npz_file(&dir.join("en_voice.npz"), &dummy_prompt()).unwrap();
        std::fs::write(dir.join("README.txt"), b"hello").unwrap();
        let catalog = PresetCatalog::open(&dir).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_render_listing() {
        let dir = temp_dir("listing");
        save_npz_file(&dir.join("en_speaker_1.npz"), &dummy_prompt()).unwrap();
        let catalog = PresetCatalog::open(&dir).unwrap();
        let listing = catalog.render_listing();
        assert!(listing.contains("English:"));
        assert!(listing.contains("en_speaker_1"));
    }

    #[test]
    fn test_path_for() {
        let dir = temp_dir("path");
        save_npz_file(&dir.join("en_voice.npz"), &dummy_prompt()).unwrap();
        let catalog = PresetCatalog::open(&dir).unwrap();
        assert_eq!(catalog.path_for("en_voice"), Some(dir.join("en_voice.npz")));
        assert_eq!(catalog.path_for("nope"), None);
    }
}
