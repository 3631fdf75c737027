//! The LSM tree state machine
//!
//! Owns the mutable memtable, the immutable-memtable queue, and the L0
//! tier plus L1..L(N-1) leveled runs. All mutations here are infallible
//! given a validated configuration (validation happens once, at
//! construction, in [`lsmsim_core::SimulatorConfig::validate`]).

use super::level::{Level, SstFile};
use super::memtable::{ImmutableMemtable, Memtable};
use lsmsim_core::{CompactionStyle, FileId, LevelIndex, MemtableId, SimulatorConfig, VirtualTime};
use std::collections::VecDeque;

/// The structural parameters of a run, carved out of [`SimulatorConfig`]
///
/// These are exactly the fields that require a `reset()` to change (see
/// [`SimulatorConfig::requires_reset_from`]), so the LSM state can hold its
/// own stable copy rather than re-reading the live config on every access.
#[derive(Debug, Clone)]
pub struct LsmParams {
    /// Number of levels, `>= 2`
    pub num_levels: usize,
    /// Threshold (MB) at which the mutable memtable freezes
    pub memtable_flush_size_mb: f64,
    /// Maximum outstanding memtables including the mutable one
    pub max_write_buffer_number: usize,
    /// Number of L0 files that trigger compaction
    pub l0_compaction_trigger: usize,
    /// Base target size (MB) for level targets
    pub max_bytes_for_level_base_mb: f64,
    /// Size multiplier between consecutive levels
    pub level_multiplier: f64,
    /// Target size (MB) of a single output SST file at level 1
    pub target_file_size_mb: f64,
    /// Multiplier applied to `target_file_size_mb` per level depth
    pub target_file_size_multiplier: f64,
    /// Whether level targets are computed dynamically (leveled only)
    pub level_compaction_dynamic_level_bytes: bool,
    /// Combined dedup x compression ratio
    pub compaction_reduction_factor: f64,
    /// The configured compaction style (dynamic-level-bytes only applies
    /// under leveled compaction)
    pub compaction_style: CompactionStyle,
}

impl From<&SimulatorConfig> for LsmParams {
    fn from(cfg: &SimulatorConfig) -> Self {
        Self {
            num_levels: cfg.num_levels,
            memtable_flush_size_mb: cfg.memtable_flush_size_mb,
            max_write_buffer_number: cfg.max_write_buffer_number,
            l0_compaction_trigger: cfg.l0_compaction_trigger,
            max_bytes_for_level_base_mb: cfg.max_bytes_for_level_base_mb,
            level_multiplier: cfg.level_multiplier,
            target_file_size_mb: cfg.target_file_size_mb,
            target_file_size_multiplier: cfg.target_file_size_multiplier,
            level_compaction_dynamic_level_bytes: cfg.level_compaction_dynamic_level_bytes,
            compaction_reduction_factor: cfg.compaction_reduction_factor,
            compaction_style: cfg.compaction_style,
        }
    }
}

/// The full LSM tree: memtable, immutable queue, and levels
pub struct LsmState {
    params: LsmParams,
    mutable_memtable: Memtable,
    immutable_memtables: VecDeque<ImmutableMemtable>,
    levels: Vec<Level>,
    next_file_id: FileId,
    next_memtable_id: MemtableId,
    targets: Vec<f64>,
    base_level: LevelIndex,
}

impl LsmState {
    /// Creates a fresh, empty LSM state
    pub fn new(params: LsmParams, now: VirtualTime) -> Self {
        let num_levels = params.num_levels;
        let mut state = Self {
            params,
            mutable_memtable: Memtable::new(now),
            immutable_memtables: VecDeque::new(),
            levels: (0..num_levels).map(|_| Level::new()).collect(),
            next_file_id: 0,
            next_memtable_id: 0,
            targets: vec![0.0; num_levels],
            base_level: 1,
        };
        state.recompute_targets();
        state
    }

    /// Resets to a fresh, empty state, optionally with new structural
    /// parameters
    pub fn reset(&mut self, params: LsmParams, now: VirtualTime) {
        *self = Self::new(params, now);
    }

    /// Adds a write of `size_mb` to the mutable memtable
    ///
    /// If this crosses `memtable_flush_size_mb`, the memtable is frozen and
    /// appended to the immutable queue, a fresh mutable memtable replaces
    /// it, and the frozen memtable's id is returned.
    pub fn add_write(&mut self, size_mb: f64, now: VirtualTime) -> Option<MemtableId> {
        self.mutable_memtable.size_mb += size_mb;
        if self.mutable_memtable.size_mb >= self.params.memtable_flush_size_mb {
            let id = self.next_memtable_id;
            self.next_memtable_id += 1;
            self.immutable_memtables.push_back(ImmutableMemtable {
                id,
                size_mb: self.mutable_memtable.size_mb,
                created_at: self.mutable_memtable.created_at,
                frozen_at: now,
            });
            self.mutable_memtable = Memtable::new(now);
            Some(id)
        } else {
            None
        }
    }

    /// Flushes the immutable memtable identified by `memtable_id`, creating
    /// an L0 file
    ///
    /// Returns `None` if no immutable memtable with that id exists (the
    /// flush event was stale — should not happen in practice since flush
    /// events are not duplicated, but handlers treat it as a safe no-op per
    /// the event queue's no-cancellation design).
    pub fn flush_memtable(&mut self, memtable_id: MemtableId, now: VirtualTime) -> Option<SstFile> {
        let pos = self
            .immutable_memtables
            .iter()
            .position(|m| m.id == memtable_id)?;
        let imm = self.immutable_memtables.remove(pos)?;
        let output_mb = imm.size_mb * self.params.compaction_reduction_factor;
        let file = SstFile {
            id: self.next_file_id,
            size_mb: output_mb,
            level: 0,
            created_at: now,
            being_compacted: false,
        };
        self.next_file_id += 1;
        self.add_file(file.clone());
        Some(file)
    }

    /// `true` if the immutable queue is full and a new write must stall
    pub fn is_immutable_queue_full(&self) -> bool {
        self.immutable_memtables.len() >= self.params.max_write_buffer_number.saturating_sub(1)
    }

    /// Number of immutable memtables awaiting flush
    pub fn num_immutable(&self) -> usize {
        self.immutable_memtables.len()
    }

    /// Current size of the mutable memtable, MB
    pub fn mutable_memtable_size_mb(&self) -> f64 {
        self.mutable_memtable.size_mb
    }

    /// The frozen memtable at the front of the immutable queue, if any,
    /// without removing it
    pub fn oldest_immutable(&self) -> Option<&ImmutableMemtable> {
        self.immutable_memtables.front()
    }

    /// Size, MB, of the immutable memtable identified by `memtable_id`, if
    /// still awaiting flush
    pub fn immutable_memtable_size(&self, memtable_id: MemtableId) -> Option<f64> {
        self.immutable_memtables
            .iter()
            .find(|m| m.id == memtable_id)
            .map(|m| m.size_mb)
    }

    /// Number of configured levels
    pub fn num_levels(&self) -> usize {
        self.params.num_levels
    }

    /// Read-only access to a level
    pub fn level(&self, idx: LevelIndex) -> &Level {
        &self.levels[idx]
    }

    /// Mutable access to a level
    pub fn level_mut(&mut self, idx: LevelIndex) -> &mut Level {
        &mut self.levels[idx]
    }

    /// Inserts a new file into its level, and recomputes level targets
    pub fn add_file(&mut self, file: SstFile) {
        let level = file.level;
        self.levels[level].insert(file);
        self.recompute_targets();
    }

    /// Removes and returns files with the given ids from `level`, and
    /// recomputes level targets
    pub fn remove_files(&mut self, level: LevelIndex, ids: &[FileId]) -> Vec<SstFile> {
        let removed = self.levels[level].remove(ids);
        self.recompute_targets();
        removed
    }

    /// Marks files as being compacted (does not change level targets)
    pub fn mark_compacting(&mut self, level: LevelIndex, ids: &[FileId]) {
        self.levels[level].mark_compacting(ids);
    }

    /// Clears the being-compacted flag for files at `level`
    pub fn unmark_compacting(&mut self, level: LevelIndex, ids: &[FileId]) {
        self.levels[level].unmark_compacting(ids);
    }

    /// Allocates a fresh file id
    pub fn allocate_file_id(&mut self) -> FileId {
        let id = self.next_file_id;
        self.next_file_id += 1;
        id
    }

    /// The compaction score for `level`, per the engine's scoring formulas
    ///
    /// L0: `max(file_count / l0_trigger, total_size / max_bytes_for_level_base)`.
    /// Li>=1: `(total_size - compacting_size) / target_size_i`.
    pub fn score(&self, level: LevelIndex) -> f64 {
        if level == 0 {
            let l0 = &self.levels[0];
            let by_count = l0.file_count() as f64 / self.params.l0_compaction_trigger as f64;
            let by_size = l0.total_size_mb() / self.params.max_bytes_for_level_base_mb;
            by_count.max(by_size)
        } else {
            let lvl = &self.levels[level];
            let target = self.targets[level];
            if target <= 0.0 {
                return 0.0;
            }
            (lvl.total_size_mb() - lvl.compacting_size_mb()) / target
        }
    }

    /// The dynamic threshold a candidate compaction into `target_level`
    /// must clear, based on how sparsely populated that target level is:
    /// `2.0` if empty, `1.5` if 1-2 files, `1.0` otherwise.
    pub fn dynamic_threshold(&self, target_level: LevelIndex) -> f64 {
        match self.levels[target_level].file_count() {
            0 => 2.0,
            1 | 2 => 1.5,
            _ => 1.0,
        }
    }

    /// The current level size targets, index 0 is always `0.0` (L0 has no
    /// size target; it is count-driven)
    pub fn level_targets(&self) -> &[f64] {
        &self.targets
    }

    /// The base level: in dynamic-level-bytes mode, the shallowest level
    /// with a real (non-"unused") target; otherwise `1`
    pub fn base_level(&self) -> LevelIndex {
        self.base_level
    }

    /// `target_file_size_mb * target_file_size_multiplier ^ level`
    pub fn target_file_size_at(&self, level: LevelIndex) -> f64 {
        self.params.target_file_size_mb * self.params.target_file_size_multiplier.powi(level as i32)
    }

    fn recompute_targets(&mut self) {
        let (targets, base) = if self.params.level_compaction_dynamic_level_bytes
            && self.params.compaction_style == CompactionStyle::Leveled
        {
            self.compute_dynamic_targets()
        } else {
            self.compute_static_targets()
        };
        self.targets = targets;
        self.base_level = base;
    }

    fn compute_static_targets(&self) -> (Vec<f64>, LevelIndex) {
        let n = self.params.num_levels;
        let mut targets = vec![0.0; n];
        for lvl in 1..n {
            targets[lvl] = self.params.max_bytes_for_level_base_mb
                * self.params.level_multiplier.powi(lvl as i32 - 1);
        }
        (targets, 1)
    }

    fn compute_dynamic_targets(&self) -> (Vec<f64>, LevelIndex) {
        let n = self.params.num_levels;
        let base_mb = self.params.max_bytes_for_level_base_mb;
        let mult = self.params.level_multiplier;
        let mut targets = vec![0.0; n];

        let last = (1..n).rev().find(|&i| self.levels[i].total_size_mb() > 0.0);

        let Some(last) = last else {
            for lvl in 1..n {
                targets[lvl] = base_mb;
            }
            return (targets, 1);
        };

        targets[last] = self.levels[last].total_size_mb().max(base_mb);
        let mut shallowest_real = last;
        let mut i = last;
        while i > 1 {
            let candidate = targets[i] / mult;
            if candidate >= base_mb {
                targets[i - 1] = candidate;
                i -= 1;
                shallowest_real = i;
            } else {
                break;
            }
        }
        for lvl in 1..shallowest_real {
            targets[lvl] = base_mb;
        }
        (targets, shallowest_real)
    }
}
