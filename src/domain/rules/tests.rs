// Unit tests for domain rules

use std::collections::HashSet;
use std::path::Path;

use super::*;

fn scenes(ranges: &[(f64, f64)]) -> Vec<Scene> {
    ranges
        .iter()
        .map(|&(start, end)| Scene::new(start, end).unwrap())
        .collect()
}

#[test]
fn test_validate_drops_short_trailing_scene() {
    let list = scenes(&[(0.0, 5.0), (5.0, 9.0), (9.0, 9.02)]);
    let selections = SelectionValidator::validate(&list, 0..3, 9.5);

    assert_eq!(selections.len(), 2);
    assert_eq!(selections[0].ordinal(), 1);
    assert_eq!(selections[1].ordinal(), 2);
    assert_eq!(selections[1].end, 9.0);
}

#[test]
fn test_validate_clamps_to_media_duration() {
    let list = scenes(&[(8.0, 12.0)]);
    let selections = SelectionValidator::validate(&list, [0], 10.0);

    assert_eq!(selections.len(), 1);
    assert_eq!(selections[0].start, 8.0);
    assert_eq!(selections[0].end, 10.0);
}

#[test]
fn test_validate_drops_scene_entirely_past_the_end() {
    let list = scenes(&[(11.0, 12.0)]);
    assert!(SelectionValidator::validate(&list, [0], 10.0).is_empty());
}

#[test]
fn test_validate_preserves_scene_order_and_dedups() {
    let list = scenes(&[(0.0, 1.0), (1.0, 2.0), (2.0, 3.0), (3.0, 4.0)]);
    let selections = SelectionValidator::validate(&list, vec![3, 0, 2, 3, 0], 10.0);

    let indices: Vec<usize> = selections.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 2, 3]);
}

#[test]
fn test_validate_ignores_unknown_indices() {
    let list = scenes(&[(0.0, 1.0)]);
    let checked: HashSet<usize> = [0, 7].into_iter().collect();
    assert_eq!(SelectionValidator::validate(&list, checked, 10.0).len(), 1);
}

#[test]
fn test_validate_returns_empty_for_invalid_duration() {
    let list = scenes(&[(0.0, 5.0)]);
    assert!(SelectionValidator::validate(&list, [0], 0.0).is_empty());
    assert!(SelectionValidator::validate(&list, [0], f64::NAN).is_empty());
    assert!(SelectionValidator::validate(&[], [0], 10.0).is_empty());
}

#[test]
fn test_validate_never_returns_short_ranges() {
    let mut ranges = Vec::new();
    let mut t = 0.0;
    for step in [0.01, 0.05, 0.051, 0.2, 0.049, 1.0, 0.0] {
        ranges.push((t, t + step));
        t += step;
    }
    let list = scenes(&ranges);

    for duration in [0.1, 0.3, 1.0, 5.0] {
        for selection in SelectionValidator::validate(&list, 0..list.len(), duration) {
            assert!(selection.end - selection.start > MIN_SEGMENT_LENGTH);
            assert!(selection.start >= 0.0 && selection.end <= duration);
        }
    }
}

#[test]
fn test_validate_does_not_mutate_input() {
    let list = scenes(&[(0.0, 50.0)]);
    let before = list.clone();
    let _ = SelectionValidator::validate(&list, [0], 10.0);
    assert_eq!(list, before);
}

#[test]
fn test_pad_width() {
    assert_eq!(ExportNaming::pad_width(0), 2);
    assert_eq!(ExportNaming::pad_width(9), 2);
    assert_eq!(ExportNaming::pad_width(99), 2);
    assert_eq!(ExportNaming::pad_width(100), 3);
    assert_eq!(ExportNaming::pad_width(12345), 5);
}

#[test]
fn test_file_names_sort_and_are_unique() {
    let names: Vec<String> = (1..=120)
        .map(|ordinal| ExportNaming::file_name("talk", ordinal, 120))
        .collect();

    assert_eq!(names[0], "talk_scene_001.mp4");
    assert_eq!(names[119], "talk_scene_120.mp4");

    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(sorted, names);

    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
}

#[test]
fn test_output_path_is_deterministic() {
    let first = ExportNaming::output_path(Path::new("exports"), Path::new("/in/My Clip.mov"), 2, 3);
    let second =
        ExportNaming::output_path(Path::new("exports"), Path::new("/in/My Clip.mov"), 2, 3);

    assert_eq!(first, second);
    assert_eq!(first, Path::new("exports").join("My Clip_scene_02.mp4"));
}
