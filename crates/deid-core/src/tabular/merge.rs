//! Merging result CSVs from folder trees into two files: the ones whose name
//! matches a pattern ("truth" files) and everything else.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use walkdir::WalkDir;

/// Columns a merge may add; dropped from inputs so re-merging does not stack them.
pub const METADATA_COLUMNS: [&str; 4] = ["source_file", "source_path", "file_size", "merge_timestamp"];

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub root: PathBuf,
    /// Only these folders below `root`; None = the whole tree.
    pub subfolders: Option<Vec<String>>,
    pub pattern: String,
    pub case_sensitive: bool,
    /// Append the metadata columns to every merged row.
    pub add_metadata: bool,
    /// Stamp output names with the merge time (`merged_truth_20240131_120000.csv`).
    pub timestamped: bool,
}

impl MergeOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            subfolders: None,
            pattern: "truth".to_string(),
            case_sensitive: false,
            add_metadata: false,
            timestamped: false,
        }
    }

    /// File names of the matched and the other output.
    pub fn output_names(&self, now: DateTime<Utc>) -> (String, String) {
        if self.timestamped {
            let stamp = now.format("%Y%m%d_%H%M%S");
            (
                format!("merged_{}_{stamp}.csv", self.pattern),
                format!("merged_other_{stamp}.csv"),
            )
        } else {
            (format!("merged_{}.csv", self.pattern), "merged_other.csv".to_string())
        }
    }

    fn matches(&self, file_name: &str) -> bool {
        if self.case_sensitive {
            file_name.contains(&self.pattern)
        } else {
            file_name.to_lowercase().contains(&self.pattern.to_lowercase())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedFile {
    pub path: PathBuf,
    pub files: usize,
    pub rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub matched: Option<MergedFile>,
    pub other: Option<MergedFile>,
    /// Requested subfolders that do not exist.
    pub missing: Vec<String>,
    /// Inputs that could not be read, with the error.
    pub skipped: Vec<(PathBuf, String)>,
}

/// One parsed input: header and rows, metadata columns removed.
struct Table {
    path: PathBuf,
    size: u64,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn read_table(path: &Path) -> Result<Table> {
    let size = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let header = reader.headers()?.clone();
    if header.is_empty() {
        bail!("no header row");
    }
    let keep: Vec<usize> = header
        .iter()
        .enumerate()
        .filter(|(_, name)| !METADATA_COLUMNS.contains(name))
        .map(|(i, _)| i)
        .collect();
    let columns = keep.iter().map(|&i| header[i].to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            keep.iter()
                .map(|&i| record.get(i).unwrap_or("").to_string())
                .collect(),
        );
    }
    Ok(Table {
        path: path.to_path_buf(),
        size,
        columns,
        rows,
    })
}

/// `*.csv` files below `dir`, sorted.
fn csv_files(dir: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    out.sort();
    out
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Concatenates `tables` under the union of their columns (first-seen order)
/// and writes the result to `out`. Cells of columns a table lacks stay empty.
fn write_merged(
    root: &Path,
    tables: &[Table],
    out: &Path,
    add_metadata: bool,
    now: DateTime<Utc>,
) -> Result<MergedFile> {
    let mut columns: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for table in tables {
        for name in &table.columns {
            if !index.contains_key(name) {
                index.insert(name.clone(), columns.len());
                columns.push(name.clone());
            }
        }
    }

    let mut writer = csv::Writer::from_path(out).with_context(|| format!("create {}", out.display()))?;
    let mut header = columns.clone();
    if add_metadata {
        header.extend(METADATA_COLUMNS.iter().map(|c| c.to_string()));
    }
    writer.write_record(&header)?;

    let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut rows = 0usize;
    for table in tables {
        let slots: Vec<usize> = table.columns.iter().map(|c| index[c]).collect();
        let file_name = table
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rel = relative_name(root, &table.path);
        for row in &table.rows {
            let mut cells = vec![String::new(); columns.len()];
            for (value, &slot) in row.iter().zip(&slots) {
                if cells[slot].is_empty() {
                    cells[slot] = value.clone();
                }
            }
            if add_metadata {
                cells.extend([
                    file_name.clone(),
                    rel.clone(),
                    table.size.to_string(),
                    stamp.clone(),
                ]);
            }
            writer.write_record(&cells)?;
            rows += 1;
        }
    }
    writer.flush().with_context(|| format!("write {}", out.display()))?;

    tracing::info!(output = %out.display(), files = tables.len(), rows, "merged");
    if add_metadata {
        columns = header;
    }
    Ok(MergedFile {
        path: out.to_path_buf(),
        files: tables.len(),
        rows,
        columns,
    })
}

/// Finds the CSVs below `opts.root` (or the selected subfolders), splits them
/// by `opts.pattern` in the file name and writes one merged file per group
/// into `opts.root`. A group with no readable file produces no output.
pub fn merge_csv(opts: &MergeOptions) -> Result<MergeReport> {
    if !opts.root.is_dir() {
        bail!("{} is not a directory", opts.root.display());
    }
    let now = Utc::now();
    let (matched_name, other_name) = opts.output_names(now);
    let outputs = [opts.root.join(&matched_name), opts.root.join(&other_name)];
    let mut report = MergeReport::default();

    let mut inputs = Vec::new();
    match &opts.subfolders {
        None => inputs = csv_files(&opts.root),
        Some(folders) => {
            for folder in folders {
                let dir = opts.root.join(folder);
                if dir.is_dir() {
                    let found = csv_files(&dir);
                    tracing::debug!(folder = %folder, files = found.len(), "scanned");
                    inputs.extend(found);
                } else {
                    tracing::warn!(folder = %folder, "subfolder not found");
                    report.missing.push(folder.clone());
                }
            }
        }
    }
    inputs.retain(|p| !outputs.contains(p));

    let mut matched = Vec::new();
    let mut other = Vec::new();
    for path in inputs {
        let table = match read_table(&path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(file = %path.display(), "skipping unreadable CSV: {:#}", e);
                report.skipped.push((path, format!("{e:#}")));
                continue;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if opts.matches(&name) {
            matched.push(table);
        } else {
            other.push(table);
        }
    }

    if !matched.is_empty() {
        report.matched = Some(write_merged(&opts.root, &matched, &outputs[0], opts.add_metadata, now)?);
    }
    if !other.is_empty() {
        report.other = Some(write_merged(&opts.root, &other, &outputs[1], opts.add_metadata, now)?);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn splits_by_pattern_ignoring_case() {
        let tmp = tempfile::tempdir().unwrap();
        put(tmp.path(), "5/Truth_labels.csv", "id,label\n1,a\n");
        put(tmp.path(), "6/sub/truth.csv", "id,label\n2,b\n");
        put(tmp.path(), "6/notes.csv", "id,text\n3,hello\n");
        put(tmp.path(), "6/readme.txt", "not a csv");

        let report = merge_csv(&MergeOptions::new(tmp.path())).unwrap();

        let matched = report.matched.unwrap();
        assert_eq!(matched.path, tmp.path().join("merged_truth.csv"));
        assert_eq!((matched.files, matched.rows), (2, 2));
        assert_eq!(read(&matched.path), "id,label\n1,a\n2,b\n");

        let other = report.other.unwrap();
        assert_eq!(other.path, tmp.path().join("merged_other.csv"));
        assert_eq!(read(&other.path), "id,text\n3,hello\n");
    }

    #[test]
    fn case_sensitive_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        put(tmp.path(), "a/Truth.csv", "x\n1\n");
        put(tmp.path(), "a/truth.csv", "x\n2\n");
        let opts = MergeOptions {
            case_sensitive: true,
            ..MergeOptions::new(tmp.path())
        };
        let report = merge_csv(&opts).unwrap();
        assert_eq!(read(&report.matched.unwrap().path), "x\n2\n");
        assert_eq!(read(&report.other.unwrap().path), "x\n1\n");
    }

    #[test]
    fn columns_are_unioned_in_first_seen_order() {
        let tmp = tempfile::tempdir().unwrap();
        put(tmp.path(), "1/a.csv", "id,text\n1,one\n");
        put(tmp.path(), "2/b.csv", "id,score,text\n2,9,\"two, quoted\"\n");
        let report = merge_csv(&MergeOptions::new(tmp.path())).unwrap();
        let other = report.other.unwrap();
        assert_eq!(other.columns, vec!["id", "text", "score"]);
        assert_eq!(read(&other.path), "id,text,score\n1,one,\n2,\"two, quoted\",9\n");
        assert!(report.matched.is_none());
        assert!(!tmp.path().join("merged_truth.csv").exists());
    }

    #[test]
    fn previous_metadata_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let old = "id,source_file,merge_timestamp\n7,old.csv,2020-01-01\n";
        put(tmp.path(), "7/result.csv", old);

        let plain = merge_csv(&MergeOptions::new(tmp.path())).unwrap();
        assert_eq!(read(&plain.other.unwrap().path), "id\n7\n");

        let opts = MergeOptions {
            add_metadata: true,
            ..MergeOptions::new(tmp.path())
        };
        let with_meta = merge_csv(&opts).unwrap().other.unwrap();
        assert_eq!(
            with_meta.columns,
            vec!["id", "source_file", "source_path", "file_size", "merge_timestamp"]
        );
        let text = read(&with_meta.path);
        let row = text.lines().nth(1).unwrap();
        let expected = format!("7,result.csv,7/result.csv,{},", old.len());
        assert!(row.starts_with(&expected), "{row}");
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn only_selected_subfolders_are_read() {
        let tmp = tempfile::tempdir().unwrap();
        put(tmp.path(), "data/a.csv", "id\n1\n");
        put(tmp.path(), "results/b.csv", "id\n2\n");
        put(tmp.path(), "scratch/c.csv", "id\n3\n");
        let opts = MergeOptions {
            subfolders: Some(vec!["data".into(), "results".into(), "backup".into()]),
            ..MergeOptions::new(tmp.path())
        };
        let report = merge_csv(&opts).unwrap();
        assert_eq!(read(&report.other.unwrap().path), "id\n1\n2\n");
        assert_eq!(report.missing, vec!["backup"]);
    }

    #[test]
    fn outputs_are_not_merged_into_themselves() {
        let tmp = tempfile::tempdir().unwrap();
        put(tmp.path(), "1/a.csv", "id\n1\n");
        merge_csv(&MergeOptions::new(tmp.path())).unwrap();
        let again = merge_csv(&MergeOptions::new(tmp.path())).unwrap();
        let other = again.other.unwrap();
        assert_eq!((other.files, other.rows), (1, 1));
    }

    #[test]
    fn unreadable_inputs_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        put(tmp.path(), "1/empty.csv", "");
        put(tmp.path(), "1/ok.csv", "id\n1\n");
        let report = merge_csv(&MergeOptions::new(tmp.path())).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, tmp.path().join("1/empty.csv"));
        assert_eq!(report.other.unwrap().rows, 1);
    }

    #[test]
    fn timestamped_output_names() {
        let now = DateTime::parse_from_rfc3339("2024-01-31T12:00:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let opts = MergeOptions {
            timestamped: true,
            ..MergeOptions::new(".")
        };
        assert_eq!(
            opts.output_names(now),
            (
                "merged_truth_20240131_120005.csv".to_string(),
                "merged_other_20240131_120005.csv".to_string()
            )
        );
        assert_eq!(
            MergeOptions::new(".").output_names(now).0,
            "merged_truth.csv"
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(merge_csv(&MergeOptions::new(tmp.path().join("nope"))).is_err());
    }
}
