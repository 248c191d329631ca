//! Ambient sound library and randomized timing

use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// List playable files in `folder`, filtered by extension (case-insensitive)
///
/// The folder is small and read once per cycle, so this reads synchronously.
/// Results are sorted for stable logs.
pub fn scan_sounds(folder: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut sounds = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
            });
        if matches {
            sounds.push(path);
        }
    }
    sounds.sort();
    Ok(sounds)
}

/// Pick one sound uniformly
pub fn pick_sound<R: Rng + ?Sized>(sounds: &[PathBuf], rng: &mut R) -> Option<PathBuf> {
    sounds.choose(rng).cloned()
}

/// Uniform duration in `[min, max]` at millisecond resolution
pub fn random_between<R: Rng + ?Sized>(min: Duration, max: Duration, rng: &mut R) -> Duration {
    let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
    if hi <= lo {
        return min;
    }
    Duration::from_millis(rng.gen_range(lo..=hi))
}
