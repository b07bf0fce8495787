// ============================================================
// Layer 4 — CSV Example Loader
// ============================================================
// Reads the pre-split domain CSV files from disk.
//
// Directory layout (one directory per domain pair):
//
//   <dataset_cache_dir>/
//     slate_travel/
//       train_source.csv   train_target.csv
//       dev_source.csv     dev_target.csv
//       test_source.csv    test_target.csv
//
// Column layout depends on the data module:
//   mnli → premise,hypothesis,label
//   sa   → sentence,label
// Extra columns are ignored. Labels must lie in 0..num_classes.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::example::{Side, Split, TextExample};
use crate::domain::hparams::DataModuleKind;
use crate::domain::source_target::SourceTarget;
use crate::domain::traits::ExampleSource;

#[derive(Debug, Deserialize)]
struct MnliRow {
    premise:    String,
    hypothesis: String,
    label:      i64,
}

#[derive(Debug, Deserialize)]
struct SaRow {
    sentence: String,
    label:    i64,
}

/// Loads `<split>_<side>.csv` files for one domain pair.
pub struct CsvDataSource {
    dir:         PathBuf,
    kind:        DataModuleKind,
    num_classes: usize,
}

impl CsvDataSource {
    pub fn new(
        cache_dir:   impl AsRef<Path>,
        pair:        &SourceTarget,
        kind:        DataModuleKind,
        num_classes: usize,
    ) -> Self {
        Self { dir: cache_dir.as_ref().join(pair.to_string()), kind, num_classes }
    }

    pub fn path_for(&self, split: Split, side: Side) -> PathBuf {
        self.dir.join(format!("{}_{}.csv", split.as_str(), side.as_str()))
    }
}

impl ExampleSource for CsvDataSource {
    fn load(&self, split: Split, side: Side) -> Result<Vec<TextExample>> {
        let path = self.path_for(split, side);
        let examples = read_examples(&path, self.kind, self.num_classes)?;
        tracing::debug!("Loaded {} examples from '{}'", examples.len(), path.display());
        Ok(examples)
    }
}

/// Parse one CSV file into examples. A malformed row or a label
/// outside `0..num_classes` fails the whole file.
pub fn read_examples(
    path:        &Path,
    kind:        DataModuleKind,
    num_classes: usize,
) -> Result<Vec<TextExample>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;

    let mut examples = Vec::new();
    match kind {
        DataModuleKind::Mnli => {
            for (i, row) in reader.deserialize::<MnliRow>().enumerate() {
                let row = row.with_context(|| {
                    format!("Bad MNLI row {} in '{}'", i + 1, path.display())
                })?;
                examples.push(TextExample::pair(row.premise, row.hypothesis, row.label));
            }
        }
        DataModuleKind::Sa => {
            for (i, row) in reader.deserialize::<SaRow>().enumerate() {
                let row = row.with_context(|| {
                    format!("Bad SA row {} in '{}'", i + 1, path.display())
                })?;
                examples.push(TextExample::single(row.sentence, row.label));
            }
        }
    }

    for (i, example) in examples.iter().enumerate() {
        if example.label < 0 || example.label as usize >= num_classes {
            bail!(
                "Label {} in row {} of '{}' is outside 0..{}",
                example.label, i + 1, path.display(), num_classes
            );
        }
    }
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_reads_mnli_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let pair = SourceTarget::new("slate", "travel");
        fs::create_dir_all(dir.path().join("slate_travel")).unwrap();
        fs::write(
            dir.path().join("slate_travel/train_source.csv"),
            "premise,hypothesis,label,genre\n\
             \"The cat sat, quietly.\",A cat sat.,0,slate\n\
             It rained.,The sun shone.,2,slate\n",
        )
        .unwrap();

        let source = CsvDataSource::new(dir.path(), &pair, DataModuleKind::Mnli, 3);
        let examples = source.load(Split::Train, Side::Source).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0], TextExample::pair("The cat sat, quietly.", "A cat sat.", 0));
        assert_eq!(examples[1].label, 2);
    }

    #[test]
    fn test_reads_sa_sentences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev_target.csv");
        fs::write(&path, "sentence,label\nloved it,1\nbroke in a day,0\n").unwrap();

        let examples = read_examples(&path, DataModuleKind::Sa, 2).unwrap();
        assert_eq!(examples, vec![
            TextExample::single("loved it", 1),
            TextExample::single("broke in a day", 0),
        ]);
    }

    #[test]
    fn test_bad_label_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "sentence,label\nok,1\nnope,positive\n").unwrap();

        let err = read_examples(&path, DataModuleKind::Sa, 2).unwrap_err();
        assert!(format!("{err:#}").contains("row 2"));
    }

    #[test]
    fn test_out_of_range_labels_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train_source.csv");

        fs::write(&path, "sentence,label\nfine,1\nodd,-1\n").unwrap();
        let err = read_examples(&path, DataModuleKind::Sa, 2).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Label -1 in row 2"), "{msg}");
        assert!(msg.contains("train_source.csv"), "{msg}");

        fs::write(&path, "premise,hypothesis,label\np,h,3\n").unwrap();
        let err = read_examples(&path, DataModuleKind::Mnli, 3).unwrap_err();
        assert!(format!("{err:#}").contains("outside 0..3"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pair = SourceTarget::new("a", "b");
        let source = CsvDataSource::new(dir.path(), &pair, DataModuleKind::Sa, 2);
        assert!(source.load(Split::Test, Side::Target).is_err());
    }
}
