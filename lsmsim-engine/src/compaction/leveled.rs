//! RocksDB-style leveled compaction
//!
//! At most one L0-originated job runs at a time. L0 files always go to
//! `base_level` (the shallowest level the dynamic-level-bytes algorithm
//! considers "real", or `1` under static targets). Every other level `Li`
//! with score `>= dynamic_threshold(Li + 1)` may spill into `Li+1`. When L0
//! is pinned but has accumulated at least `MIN_INTRA_L0_FILES` files (none
//! of them already being compacted), an intra-L0 job runs instead so L0
//! keeps draining even while the base-level job is in flight.

use super::{split_output_files, CompactionJob, CompactionResult, Compactor};
use crate::distributions::{file_count_selection, sample_distinct_indices, SimRng};
use crate::lsm::LsmState;
use lsmsim_core::{FileId, LevelIndex, SimulatorConfig};
use std::collections::HashSet;

/// Minimum number of available L0 files before an intra-L0 compaction is
/// considered, matching the reference engine (see spec Open Question #1;
/// chosen over profiling a different value since the reference default is
/// what operators tune against).
const MIN_INTRA_L0_FILES: usize = 4;

/// Leveled compaction's active-job bookkeeping and picking logic
#[derive(Debug)]
pub struct LeveledCompactor {
    active_from_levels: HashSet<LevelIndex>,
    l0_job_active: bool,
    active_jobs: usize,
    reduction_factor: f64,
}

impl LeveledCompactor {
    /// Creates a compactor with no active jobs
    pub fn new() -> Self {
        Self {
            active_from_levels: HashSet::new(),
            l0_job_active: false,
            active_jobs: 0,
            reduction_factor: 1.0,
        }
    }

    fn pick_l0_job(
        &self,
        state: &LsmState,
        config: &SimulatorConfig,
        rng: &mut SimRng,
    ) -> Option<CompactionJob> {
        let base_level = state.base_level();
        let available = state.level(0).available_file_ids();
        if available.is_empty() {
            return None;
        }
        let target_available = state.level(base_level).available_file_ids();
        let overlap_n = file_count_selection(
            target_available.len(),
            config.overlap_distribution,
            rng,
        );
        let target_ids: Vec<FileId> =
            sample_distinct_indices(rng, target_available.len(), overlap_n)
                .into_iter()
                .map(|i| target_available[i])
                .collect();

        let is_trivial_move = overlap_n == 0 && available.len() == 1;
        let input_mb = sum_sizes(state, 0, &available) + sum_sizes(state, base_level, &target_ids);

        Some(CompactionJob {
            from_level: 0,
            to_level: base_level,
            source_file_ids: available,
            target_file_ids: target_ids,
            is_intra_l0: false,
            is_trivial_move,
            input_mb,
            scheduled_start: None,
            completion_time: None,
        })
    }

    fn pick_intra_l0_job(&self, state: &LsmState) -> Option<CompactionJob> {
        let available = state.level(0).available_file_ids();
        if available.len() < MIN_INTRA_L0_FILES {
            return None;
        }
        let input_mb = sum_sizes(state, 0, &available);
        Some(CompactionJob {
            from_level: 0,
            to_level: 0,
            source_file_ids: available,
            target_file_ids: Vec::new(),
            is_intra_l0: true,
            is_trivial_move: false,
            input_mb,
            scheduled_start: None,
            completion_time: None,
        })
    }

    fn pick_deeper_job(
        &self,
        state: &LsmState,
        config: &SimulatorConfig,
        rng: &mut SimRng,
    ) -> Option<CompactionJob> {
        let base_level = state.base_level();
        let mut best: Option<(LevelIndex, f64)> = None;
        for from in base_level..state.num_levels().saturating_sub(1) {
            if self.active_from_levels.contains(&from) {
                continue;
            }
            let to = from + 1;
            let score = state.score(from);
            if score >= state.dynamic_threshold(to) {
                let better = match best {
                    None => true,
                    Some((best_from, best_score)) => {
                        score > best_score || (score == best_score && from < best_from)
                    }
                };
                if better {
                    best = Some((from, score));
                }
            }
        }
        let (from, _) = best?;
        let to = from + 1;

        let mut sources = state.level(from).available_file_ids();
        if sources.is_empty() {
            return None;
        }
        // Cap input size, keeping at least one source file, per
        // max_compaction_bytes_mb.
        let mut kept = Vec::new();
        let mut running = 0.0;
        for id in &sources {
            let size = file_size(state, from, *id);
            if !kept.is_empty() && running + size > config.max_compaction_bytes_mb {
                break;
            }
            running += size;
            kept.push(*id);
        }
        sources = kept;

        let target_available = state.level(to).available_file_ids();
        let overlap_n =
            file_count_selection(target_available.len(), config.overlap_distribution, rng);
        let target_ids: Vec<FileId> =
            sample_distinct_indices(rng, target_available.len(), overlap_n)
                .into_iter()
                .map(|i| target_available[i])
                .collect();

        let is_trivial_move = overlap_n == 0 && sources.len() == 1;
        let input_mb = sum_sizes(state, from, &sources) + sum_sizes(state, to, &target_ids);

        Some(CompactionJob {
            from_level: from,
            to_level: to,
            source_file_ids: sources,
            target_file_ids: target_ids,
            is_intra_l0: false,
            is_trivial_move,
            input_mb,
            scheduled_start: None,
            completion_time: None,
        })
    }
}

impl Compactor for LeveledCompactor {
    fn needs_compaction(&self, state: &LsmState, config: &SimulatorConfig) -> bool {
        if self.active_jobs >= config.max_background_jobs {
            return false;
        }
        if !self.l0_job_active && state.score(0) >= 1.0 {
            return true;
        }
        if !self.l0_job_active && state.level(0).available_file_ids().len() >= MIN_INTRA_L0_FILES {
            return true;
        }
        let base_level = state.base_level();
        (base_level..state.num_levels().saturating_sub(1)).any(|from| {
            !self.active_from_levels.contains(&from)
                && state.score(from) >= state.dynamic_threshold(from + 1)
        })
    }

    fn pick_compaction(
        &mut self,
        state: &mut LsmState,
        config: &SimulatorConfig,
        rng: &mut SimRng,
    ) -> Option<CompactionJob> {
        self.reduction_factor = config.compaction_reduction_factor;
        let job = if !self.l0_job_active && state.score(0) >= 1.0 {
            self.pick_l0_job(state, config, rng)
        } else if !self.l0_job_active
            && state.level(0).available_file_ids().len() >= MIN_INTRA_L0_FILES
        {
            self.pick_intra_l0_job(state)
        } else {
            self.pick_deeper_job(state, config, rng)
        }?;

        state.mark_compacting(job.from_level, &job.source_file_ids);
        if !job.target_file_ids.is_empty() {
            state.mark_compacting(job.to_level, &job.target_file_ids);
        }
        if job.from_level == 0 {
            self.l0_job_active = true;
        } else {
            self.active_from_levels.insert(job.from_level);
        }
        self.active_jobs += 1;
        Some(job)
    }

    fn execute_compaction(&mut self, state: &mut LsmState, job: &CompactionJob) -> CompactionResult {
        let removed_sources = state.remove_files(job.from_level, &job.source_file_ids);
        let removed_targets = if job.target_file_ids.is_empty() {
            Vec::new()
        } else {
            state.remove_files(job.to_level, &job.target_file_ids)
        };
        let input_mb: f64 = removed_sources.iter().map(|f| f.size_mb).sum::<f64>()
            + removed_targets.iter().map(|f| f.size_mb).sum::<f64>();

        let result = if job.is_trivial_move {
            let file = removed_sources.into_iter().next().expect("trivial move has one source");
            let now = file.created_at;
            let id = state.allocate_file_id();
            state.add_file(crate::lsm::SstFile {
                id,
                size_mb: file.size_mb,
                level: job.to_level,
                created_at: now,
                being_compacted: false,
            });
            CompactionResult {
                input_mb,
                output_mb: file.size_mb,
                num_output_files: 1,
                moved_mb: file.size_mb,
                deleted_mb: 0.0,
            }
        } else {
            let now = job.completion_time.unwrap_or(0.0);
            let output_mb = input_mb * self.reduction_factor;
            let target_size = state.target_file_size_at(job.to_level);
            let num_output_files = split_output_files(state, job.to_level, output_mb, target_size, now);
            CompactionResult {
                input_mb,
                output_mb,
                num_output_files,
                moved_mb: 0.0,
                deleted_mb: 0.0,
            }
        };

        if job.from_level == 0 {
            self.l0_job_active = false;
        } else {
            self.active_from_levels.remove(&job.from_level);
        }
        self.active_jobs = self.active_jobs.saturating_sub(1);
        result
    }

    fn on_job_canceled(&mut self, state: &mut LsmState, job: &CompactionJob) {
        state.unmark_compacting(job.from_level, &job.source_file_ids);
        if !job.target_file_ids.is_empty() {
            state.unmark_compacting(job.to_level, &job.target_file_ids);
        }
        if job.from_level == 0 {
            self.l0_job_active = false;
        } else {
            self.active_from_levels.remove(&job.from_level);
        }
        self.active_jobs = self.active_jobs.saturating_sub(1);
    }

    fn active_count(&self) -> usize {
        self.active_jobs
    }
}

fn file_size(state: &LsmState, level: LevelIndex, id: FileId) -> f64 {
    state
        .level(level)
        .files
        .iter()
        .find(|f| f.id == id)
        .map(|f| f.size_mb)
        .unwrap_or(0.0)
}

fn sum_sizes(state: &LsmState, level: LevelIndex, ids: &[FileId]) -> f64 {
    ids.iter().map(|id| file_size(state, level, *id)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsm::{LsmParams, SstFile};
    use lsmsim_core::CompactionStyle;

    fn params() -> LsmParams {
        LsmParams {
            num_levels: 4,
            memtable_flush_size_mb: 64.0,
            max_write_buffer_number: 4,
            l0_compaction_trigger: 4,
            max_bytes_for_level_base_mb: 256.0,
            level_multiplier: 10.0,
            target_file_size_mb: 64.0,
            target_file_size_multiplier: 1.0,
            level_compaction_dynamic_level_bytes: false,
            compaction_reduction_factor: 1.0,
            compaction_style: CompactionStyle::Leveled,
        }
    }

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            num_levels: 4,
            max_bytes_for_level_base_mb: 256.0,
            compaction_reduction_factor: 1.0,
            max_compaction_bytes_mb: 10_000.0,
            ..Default::default()
        }
    }

    #[test]
    fn needs_compaction_when_l0_over_trigger() {
        let mut state = LsmState::new(params(), 0.0);
        for i in 0..4 {
            state.add_file(SstFile {
                id: i,
                size_mb: 10.0,
                level: 0,
                created_at: 0.0,
                being_compacted: false,
            });
        }
        let compactor = LeveledCompactor::new();
        assert!(compactor.needs_compaction(&state, &config()));
    }

    #[test]
    fn pick_l0_job_reserves_files() {
        let mut state = LsmState::new(params(), 0.0);
        for i in 0..4 {
            state.add_file(SstFile {
                id: i,
                size_mb: 10.0,
                level: 0,
                created_at: 0.0,
                being_compacted: false,
            });
        }
        let mut compactor = LeveledCompactor::new();
        let mut rng = SimRng::from_seed(1);
        let job = compactor
            .pick_compaction(&mut state, &config(), &mut rng)
            .expect("job expected");
        assert_eq!(job.from_level, 0);
        assert_eq!(job.to_level, 1);
        assert_eq!(state.level(0).available_file_ids().len(), 0);
        assert_eq!(compactor.active_count(), 1);
    }

    #[test]
    fn execute_trivial_move_preserves_size() {
        let mut state = LsmState::new(params(), 0.0);
        state.add_file(SstFile {
            id: 0,
            size_mb: 10.0,
            level: 0,
            created_at: 0.0,
            being_compacted: false,
        });
        let mut compactor = LeveledCompactor::new();
        let mut rng = SimRng::from_seed(2);
        let job = compactor
            .pick_compaction(&mut state, &config(), &mut rng)
            .unwrap();
        assert!(job.is_trivial_move);
        let result = compactor.execute_compaction(&mut state, &job);
        assert_eq!(result.moved_mb, 10.0);
        assert_eq!(state.level(1).file_count(), 1);
    }

    #[test]
    fn intra_l0_triggers_when_many_small_files_and_base_pinned() {
        let mut state = LsmState::new(params(), 0.0);
        for i in 0..4 {
            state.add_file(SstFile {
                id: i,
                size_mb: 1.0,
                level: 0,
                created_at: 0.0,
                being_compacted: false,
            });
        }
        let mut compactor = LeveledCompactor::new();
        let mut rng = SimRng::from_seed(3);
        // First job takes the L0->base job.
        let job1 = compactor
            .pick_compaction(&mut state, &config(), &mut rng)
            .unwrap();
        assert!(!job1.is_intra_l0);
        // Add more L0 files while the first job is outstanding.
        for i in 4..8 {
            state.add_file(SstFile {
                id: i,
                size_mb: 1.0,
                level: 0,
                created_at: 0.0,
                being_compacted: false,
            });
        }
        let job2 = compactor
            .pick_compaction(&mut state, &config(), &mut rng)
            .unwrap();
        assert!(job2.is_intra_l0);
    }
}
