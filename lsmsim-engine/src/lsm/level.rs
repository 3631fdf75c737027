//! SST files and levels
//!
//! L0 is a tier: files may overlap in key space and are ordered by age,
//! newest first. L1 and deeper are sorted runs, modeled as non-overlapping;
//! file order within a level does not matter for the statistical model, so
//! [`Level`] keeps files sorted by id for deterministic iteration.

use lsmsim_core::{FileId, LevelIndex, VirtualTime};

/// An immutable on-disk table
#[derive(Debug, Clone, PartialEq)]
pub struct SstFile {
    /// Stable identifier, unique for the run's lifetime
    pub id: FileId,
    /// Size, MB
    pub size_mb: f64,
    /// The level this file currently resides in
    pub level: LevelIndex,
    /// Virtual time this file was created (by flush, compaction output, or
    /// trivial move)
    pub created_at: VirtualTime,
    /// Whether this file is a source or target of an active compaction job
    ///
    /// Once set, the file cannot appear as input to a second compaction
    /// until the owning job completes.
    pub being_compacted: bool,
}

/// A single level of the tree
///
/// `files` is kept sorted by [`SstFile::id`] so every consumer that
/// iterates "files not currently being compacted" does so in a stable,
/// reproducible order before sampling from the RNG.
#[derive(Debug, Clone, Default)]
pub struct Level {
    /// Files currently resident in this level
    pub files: Vec<SstFile>,
}

impl Level {
    /// Creates an empty level
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Inserts a file, maintaining id order
    pub fn insert(&mut self, file: SstFile) {
        let pos = self
            .files
            .binary_search_by_key(&file.id, |f| f.id)
            .unwrap_or_else(|p| p);
        self.files.insert(pos, file);
    }

    /// Removes and returns the files with the given ids
    pub fn remove(&mut self, ids: &[FileId]) -> Vec<SstFile> {
        let mut removed = Vec::with_capacity(ids.len());
        self.files.retain(|f| {
            if ids.contains(&f.id) {
                removed.push(f.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Sum of sizes of every file resident in this level
    ///
    /// Includes files currently being compacted: they still occupy disk
    /// space until the owning job completes and removes them. Scoring
    /// formulas subtract [`Level::compacting_size_mb`] separately where the
    /// "already being fixed" portion should not count toward urgency.
    pub fn total_size_mb(&self) -> f64 {
        self.files.iter().map(|f| f.size_mb).sum()
    }

    /// Sum of sizes of files in this level currently marked as being
    /// compacted
    pub fn compacting_size_mb(&self) -> f64 {
        self.files
            .iter()
            .filter(|f| f.being_compacted)
            .map(|f| f.size_mb)
            .sum()
    }

    /// Number of files resident in this level
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Ids of files not currently being compacted, in stable (id) order
    pub fn available_file_ids(&self) -> Vec<FileId> {
        self.files
            .iter()
            .filter(|f| !f.being_compacted)
            .map(|f| f.id)
            .collect()
    }

    /// Marks the given file ids as being compacted
    pub fn mark_compacting(&mut self, ids: &[FileId]) {
        for f in &mut self.files {
            if ids.contains(&f.id) {
                f.being_compacted = true;
            }
        }
    }

    /// Clears the being-compacted flag for the given file ids
    pub fn unmark_compacting(&mut self, ids: &[FileId]) {
        for f in &mut self.files {
            if ids.contains(&f.id) {
                f.being_compacted = false;
            }
        }
    }
}
