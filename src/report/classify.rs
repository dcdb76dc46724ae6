//! Image discovery and step classification
//!
//! Photos are matched to inspection steps by their file names. Matching is
//! case-insensitive and runs in three passes: the ordered keyword table, then
//! a `step N` pattern, then the fallback bucket.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::report::step::Step;

/// File extensions treated as images
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Image folder not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read image folder {path}: {message}")]
    Read { path: PathBuf, message: String },
}

/// Keywords that put an image into a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepKeywords {
    pub step: Step,
    pub keywords: Vec<String>,
}

/// A scanned image and its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub step: Step,
    pub is_defect: bool,
    /// Excluded images are neither renamed nor placed
    pub selected: bool,
}

/// Operator correction for one scanned image, matched by file name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOverride {
    pub file: String,
    pub step: Option<Step>,
    pub defect: Option<bool>,
    #[serde(rename = "use")]
    pub selected: Option<bool>,
}

pub struct ImageClassifier {
    defect_words: Vec<String>,
    step_keywords: Vec<StepKeywords>,
}

impl ImageClassifier {
    pub fn new(defect_words: &[String], step_keywords: &[StepKeywords]) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words.iter().map(|w| w.to_lowercase()).collect()
        };
        Self {
            defect_words: lower(defect_words),
            step_keywords: step_keywords
                .iter()
                .map(|sk| StepKeywords {
                    step: sk.step,
                    keywords: lower(&sk.keywords),
                })
                .collect(),
        }
    }

    /// Step and defect flag for a file name
    pub fn classify(&self, file_name: &str) -> (Step, bool) {
        let name = file_name.to_lowercase();
        let is_defect = self.defect_words.iter().any(|w| name.contains(w.as_str()));

        let by_keyword = self
            .step_keywords
            .iter()
            .find(|sk| sk.keywords.iter().any(|k| name.contains(k.as_str())))
            .map(|sk| sk.step);

        let step = by_keyword
            .or_else(|| {
                STEP_PATTERN
                    .captures(&name)
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .filter(|n| *n > 0)
                    .map(Step::new)
            })
            .unwrap_or_else(Step::fallback);

        debug!(file = file_name, step = %step, is_defect, "classified image");
        (step, is_defect)
    }

    /// Classify every image directly inside `folder`, sorted by step
    pub fn scan(&self, folder: &Path) -> Result<Vec<ImageEntry>, ScanError> {
        if !folder.is_dir() {
            return Err(ScanError::NotFound(folder.to_path_buf()));
        }

        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ScanError::Read {
                path: folder.to_path_buf(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() || !is_image(entry.path()) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let (step, is_defect) = self.classify(&file_name);
            entries.push(ImageEntry {
                path: entry.into_path(),
                file_name,
                step,
                is_defect,
                selected: true,
            });
        }

        sort_by_step(&mut entries);
        info!(
            images = entries.len(),
            defects = entries.iter().filter(|e| e.is_defect).count(),
            "scanned image folder"
        );
        Ok(entries)
    }
}

static STEP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"step[_\s]*(\d+)").expect("valid step regex"));

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Stable sort on the textual step key
pub fn sort_by_step(entries: &mut [ImageEntry]) {
    entries.sort_by_cached_key(|e| e.step.sort_key());
}

/// Apply operator overrides. Returns the override file names that matched no
/// scanned image.
pub fn apply_overrides(entries: &mut [ImageEntry], overrides: &[ImageOverride]) -> Vec<String> {
    let mut unmatched = Vec::new();
    for ov in overrides {
        let Some(entry) = entries.iter_mut().find(|e| e.file_name == ov.file) else {
            warn!(file = %ov.file, "override does not match any scanned image");
            unmatched.push(ov.file.clone());
            continue;
        };
        if let Some(step) = ov.step {
            entry.step = step;
        }
        if let Some(defect) = ov.defect {
            entry.is_defect = defect;
        }
        if let Some(selected) = ov.selected {
            entry.selected = selected;
        }
        debug!(file = %entry.file_name, step = %entry.step, "override applied");
    }
    sort_by_step(entries);
    unmatched
}

/// Selected images grouped into the steps shown on the reference sheet
#[derive(Debug, Clone, Default)]
pub struct StepGroups {
    groups: Vec<(Step, Vec<PathBuf>)>,
    unplaced: Vec<PathBuf>,
}

impl StepGroups {
    pub fn from_entries(entries: &[ImageEntry]) -> Self {
        let mut groups: Vec<(Step, Vec<PathBuf>)> = Step::display_buckets()
            .into_iter()
            .map(|s| (s, Vec::new()))
            .collect();
        let mut unplaced = Vec::new();

        for entry in entries.iter().filter(|e| e.selected) {
            match groups.iter_mut().find(|(s, _)| *s == entry.step) {
                Some((_, paths)) => paths.push(entry.path.clone()),
                None => unplaced.push(entry.path.clone()),
            }
        }

        Self { groups, unplaced }
    }

    pub fn images(&self, step: Step) -> &[PathBuf] {
        self.groups
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, paths)| paths.as_slice())
            .unwrap_or(&[])
    }

    /// Selected images whose step has no row on the reference sheet
    pub fn unplaced(&self) -> &[PathBuf] {
        &self.unplaced
    }
}

/// Selected defect images in scan order
pub fn defect_paths(entries: &[ImageEntry]) -> Vec<PathBuf> {
    entries
        .iter()
        .filter(|e| e.selected && e.is_defect)
        .map(|e| e.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn classifier() -> ImageClassifier {
        let config = crate::core::Config::builtin().unwrap();
        ImageClassifier::new(&config.defect_words, &config.step_keywords)
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"x").unwrap();
        }
    }

    #[test]
    fn test_keyword_and_fallback_classification() {
        let c = classifier();
        assert_eq!(c.classify("step3_label.jpg"), (Step::new(3), false));
        assert_eq!(c.classify("random_photo.jpg"), (Step::new(1), false));
        assert_eq!(c.classify("Shipping_Case.JPG").0, Step::new(1));
        assert_eq!(c.classify("step5_2_open.png").0, Step::sub(5, 2));
        assert_eq!(c.classify("shackle.png").0, Step::new(5));
    }

    #[test]
    fn test_keyword_table_order_decides_sub_steps() {
        let config = crate::core::Config::builtin().unwrap();
        let mut step5_first = config.step_keywords.clone();
        let step5 = step5_first
            .iter()
            .position(|sk| sk.step == Step::new(5))
            .unwrap();
        let moved = step5_first.remove(step5);
        let first_sub = step5_first
            .iter()
            .position(|sk| sk.step == Step::sub(5, 1))
            .unwrap();
        step5_first.insert(first_sub, moved);

        let c = ImageClassifier::new(&config.defect_words, &step5_first);
        assert_eq!(c.classify("step5_1_key.jpg").0, Step::new(5));
        assert_eq!(classifier().classify("step5_1_key.jpg").0, Step::sub(5, 1));
    }

    #[test]
    fn test_regex_fallback() {
        let c = classifier();
        assert_eq!(c.classify("STEP_7 overview.jpg").0, Step::new(7));
        assert_eq!(c.classify("step_12.png").0, Step::new(12));
    }

    #[test]
    fn test_defect_flag_independent_of_step() {
        let c = classifier();
        let (step, defect) = c.classify("缺陷_划痕.jpg");
        assert!(defect);
        assert_eq!(step, Step::new(1));

        let (step, defect) = c.classify("step4_nut_Reject.png");
        assert!(defect);
        assert_eq!(step, Step::new(4));
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        touch(
            tmp.path(),
            &[
                "step2_edge.jpg",
                "notes.txt",
                "step_10_extra.png",
                "b_case.jpeg",
                "a_random.BMP",
                "step4_nut.gif",
                "step5_1_key.jpg",
            ],
        );
        fs::create_dir(tmp.path().join("step3_dir.jpg")).unwrap();

        let entries = classifier().scan(tmp.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.file_name.as_str()).collect();

        insta::assert_snapshot!(names.join("\n"), @r"
        a_random.BMP
        b_case.jpeg
        step_10_extra.png
        step2_edge.jpg
        step4_nut.gif
        step5_1_key.jpg
        ");
        assert!(entries.iter().all(|e| e.selected));
    }

    #[test]
    fn test_scan_missing_folder() {
        let err = classifier().scan(Path::new("/nonexistent/photos")).unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[test]
    fn test_overrides() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), &["a.jpg", "b.jpg", "c.jpg"]);
        let mut entries = classifier().scan(tmp.path()).unwrap();

        let overrides = vec![
            ImageOverride {
                file: "c.jpg".into(),
                step: Some(Step::new(2)),
                defect: Some(true),
                ..Default::default()
            },
            ImageOverride {
                file: "b.jpg".into(),
                selected: Some(false),
                ..Default::default()
            },
            ImageOverride {
                file: "zzz.jpg".into(),
                ..Default::default()
            },
        ];
        let unmatched = apply_overrides(&mut entries, &overrides);

        assert_eq!(unmatched, vec!["zzz.jpg".to_string()]);
        assert_eq!(entries.last().unwrap().file_name, "c.jpg");
        assert_eq!(entries.last().unwrap().step, Step::new(2));
        assert_eq!(defect_paths(&entries), vec![tmp.path().join("c.jpg")]);

        let groups = StepGroups::from_entries(&entries);
        assert_eq!(groups.images(Step::new(1)), &[tmp.path().join("a.jpg")]);
        assert_eq!(groups.images(Step::new(2)), &[tmp.path().join("c.jpg")]);
    }

    #[test]
    fn test_groups_report_unplaced_steps() {
        let entry = |name: &str, step: Step| ImageEntry {
            path: PathBuf::from(name),
            file_name: name.to_string(),
            step,
            is_defect: false,
            selected: true,
        };
        let entries = vec![
            entry("a.jpg", Step::new(3)),
            entry("b.jpg", Step::new(5)),
            entry("c.jpg", Step::sub(5, 4)),
            entry("d.jpg", Step::new(9)),
        ];

        let groups = StepGroups::from_entries(&entries);
        assert_eq!(groups.images(Step::new(3)).len(), 1);
        assert_eq!(groups.images(Step::sub(5, 4)).len(), 1);
        assert_eq!(groups.unplaced(), &[PathBuf::from("b.jpg"), PathBuf::from("d.jpg")]);
    }
}
