use std::{
    fmt::Write as _, path::{Path, PathBuf}
};

use crate::{batch::Batch, error::KernelsCacheError};

/// File name of a dumped batch.
///
/// Process id and builder instance keep caches that share one directory from
/// overwriting each other.
pub fn dump_file_name(instance: u64, cycle: u64, batch: usize) -> String {
    format!("kernels_cache_p{}_i{instance}_c{cycle}_b{batch}.cl", std::process::id())
}

/// Write a batch's combined source to `dir`, named by [`dump_file_name`].
///
/// Debug aid only; the file is never read back.
pub fn dump_batch_source(dir: &Path, instance: u64, cycle: u64, target: &str, batch: &Batch) -> Result<PathBuf, KernelsCacheError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| KernelsCacheError::Dump(format!("Failed to create source dump dir {}: {}", dir.display(), e)))?;

    let entry_points = batch.entry_points().collect::<Vec<_>>().join(", ");
    let mut text = String::with_capacity(batch.source_bytes() + 256);
    // Writing into a String cannot fail.
    let _ = writeln!(text, "// target: {target}");
    let _ = writeln!(text, "// build options: {}", batch.build_options());
    let _ = writeln!(text, "// entry points: {entry_points}\n");
    text.push_str(&batch.combined_source());

    let path = dir.join(dump_file_name(instance, cycle, batch.id()));
    std::fs::write(&path, text)
        .map_err(|e| KernelsCacheError::Dump(format!("Failed to write source dump {}: {}", path.display(), e)))?;
    Ok(path)
}

#[path = "dump.test.rs"]
mod tests;
