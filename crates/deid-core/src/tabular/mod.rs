//! CSV preparation around a run: split a large export into chunks (one per
//! folder, ready for `stage`) and merge collected result files back.

mod merge;
mod split;

pub use merge::{merge_csv, MergeOptions, MergeReport, MergedFile, METADATA_COLUMNS};
pub use split::{chunk_file_name, split_csv, ChunkInfo, SplitOptions};
