// Domain rules - Selection validation and export naming policies

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::domain::model::*;

/// Business rules turning raw UI selection state into exportable ranges
pub struct SelectionValidator;

impl SelectionValidator {
    /// Clamp checked scenes into `[0, media_duration]` and drop degenerate ranges
    ///
    /// Output follows scene order regardless of the order of `checked`; duplicate
    /// and out-of-range indices are ignored. Never fails: an empty result means
    /// there is nothing to export.
    pub fn validate<I>(scenes: &[Scene], checked: I, media_duration: f64) -> Vec<Selection>
    where
        I: IntoIterator<Item = usize>,
    {
        // NaN and non-positive durations leave nothing to clamp into
        if !(media_duration > 0.0) {
            return Vec::new();
        }

        let checked: BTreeSet<usize> = checked.into_iter().collect();

        scenes
            .iter()
            .enumerate()
            .filter(|(index, _)| checked.contains(index))
            .filter_map(|(index, scene)| {
                let mut start = Self::clamp(scene.start(), media_duration);
                let mut end = Self::clamp(scene.end(), media_duration);
                if end < start {
                    std::mem::swap(&mut start, &mut end);
                }
                (end - start > MIN_SEGMENT_LENGTH).then_some(Selection { index, start, end })
            })
            .collect()
    }

    fn clamp(value: f64, media_duration: f64) -> f64 {
        value.max(0.0).min(media_duration)
    }
}

/// Deterministic output naming for exported clips
pub struct ExportNaming;

impl ExportNaming {
    /// Digits used for ordinals so names sort lexicographically
    pub fn pad_width(scene_count: usize) -> usize {
        scene_count.max(1).to_string().len().max(2)
    }

    /// `<basename>_scene_<ordinal>.mp4`, zero-padded by the scene count
    pub fn file_name(basename: &str, ordinal: usize, scene_count: usize) -> String {
        format!(
            "{}_scene_{:0width$}.mp4",
            basename,
            ordinal,
            width = Self::pad_width(scene_count)
        )
    }

    /// Full destination path inside the export directory
    pub fn output_path(
        export_dir: &Path,
        source: &Path,
        ordinal: usize,
        scene_count: usize,
    ) -> PathBuf {
        export_dir.join(Self::file_name(&Self::basename(source), ordinal, scene_count))
    }

    /// Source file name without its extension
    pub fn basename(source: &Path) -> String {
        source
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "clip".to_string())
    }
}

#[cfg(test)]
mod tests;
