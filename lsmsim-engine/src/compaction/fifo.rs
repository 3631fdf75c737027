//! FIFO compaction
//!
//! All data lives in L0. When L0's total size exceeds a ceiling, the
//! oldest files are dropped outright — no rewriting, no output file. This
//! engine's configuration surface has no dedicated FIFO ceiling field, so
//! `max_bytes_for_level_base_mb` is reused as the deletion threshold. There
//! is likewise no TTL field, so only the size-based ceiling is modeled.

use super::{CompactionJob, CompactionResult, Compactor};
use crate::distributions::SimRng;
use crate::lsm::LsmState;
use lsmsim_core::{FileId, SimulatorConfig};
use std::collections::HashSet;

/// FIFO compaction's active-job bookkeeping
#[derive(Debug, Default)]
pub struct FifoCompactor {
    active_jobs: Vec<HashSet<FileId>>,
}

impl FifoCompactor {
    /// Creates a compactor with no active jobs
    pub fn new() -> Self {
        Self::default()
    }

    fn oldest_excess(&self, state: &LsmState, config: &SimulatorConfig) -> Option<Vec<FileId>> {
        let l0 = state.level(0);
        let total = l0.total_size_mb();
        if total <= config.max_bytes_for_level_base_mb {
            return None;
        }
        let mut excess = total - config.max_bytes_for_level_base_mb;
        let mut available: Vec<&crate::lsm::SstFile> = l0
            .files
            .iter()
            .filter(|f| !f.being_compacted)
            .collect();
        available.sort_by(|a, b| a.created_at.partial_cmp(&b.created_at).unwrap());

        let mut victims = Vec::new();
        for file in available {
            if excess <= 0.0 {
                break;
            }
            victims.push(file.id);
            excess -= file.size_mb;
        }
        if victims.is_empty() {
            None
        } else {
            Some(victims)
        }
    }
}

impl Compactor for FifoCompactor {
    fn needs_compaction(&self, state: &LsmState, config: &SimulatorConfig) -> bool {
        if self.active_jobs.len() >= config.max_background_jobs {
            return false;
        }
        self.oldest_excess(state, config).is_some()
    }

    fn pick_compaction(
        &mut self,
        state: &mut LsmState,
        config: &SimulatorConfig,
        _rng: &mut SimRng,
    ) -> Option<CompactionJob> {
        let victims = self.oldest_excess(state, config)?;
        let input_mb: f64 = victims
            .iter()
            .filter_map(|id| state.level(0).files.iter().find(|f| f.id == *id))
            .map(|f| f.size_mb)
            .sum();
        state.mark_compacting(0, &victims);
        self.active_jobs.push(victims.iter().copied().collect());
        Some(CompactionJob {
            from_level: 0,
            to_level: 0,
            source_file_ids: victims,
            target_file_ids: Vec::new(),
            is_intra_l0: true,
            is_trivial_move: false,
            input_mb,
            scheduled_start: None,
            completion_time: None,
        })
    }

    fn execute_compaction(&mut self, state: &mut LsmState, job: &CompactionJob) -> CompactionResult {
        let removed = state.remove_files(0, &job.source_file_ids);
        let deleted_mb: f64 = removed.iter().map(|f| f.size_mb).sum();
        let job_keys: HashSet<FileId> = job.source_file_ids.iter().copied().collect();
        self.active_jobs.retain(|reserved| reserved != &job_keys);
        CompactionResult {
            input_mb: deleted_mb,
            output_mb: 0.0,
            num_output_files: 0,
            moved_mb: 0.0,
            deleted_mb,
        }
    }

    fn on_job_canceled(&mut self, state: &mut LsmState, job: &CompactionJob) {
        state.unmark_compacting(0, &job.source_file_ids);
        let job_keys: HashSet<FileId> = job.source_file_ids.iter().copied().collect();
        self.active_jobs.retain(|reserved| reserved != &job_keys);
    }

    fn active_count(&self) -> usize {
        self.active_jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsm::{LsmParams, SstFile};
    use lsmsim_core::CompactionStyle;

    fn params() -> LsmParams {
        LsmParams {
            num_levels: 2,
            memtable_flush_size_mb: 64.0,
            max_write_buffer_number: 4,
            l0_compaction_trigger: 4,
            max_bytes_for_level_base_mb: 100.0,
            level_multiplier: 10.0,
            target_file_size_mb: 64.0,
            target_file_size_multiplier: 1.0,
            level_compaction_dynamic_level_bytes: false,
            compaction_reduction_factor: 1.0,
            compaction_style: CompactionStyle::Fifo,
        }
    }

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            compaction_style: CompactionStyle::Fifo,
            num_levels: 2,
            max_bytes_for_level_base_mb: 100.0,
            ..Default::default()
        }
    }

    #[test]
    fn deletes_oldest_files_past_ceiling() {
        let mut state = LsmState::new(params(), 0.0);
        for i in 0..5 {
            state.add_file(SstFile {
                id: i,
                size_mb: 30.0,
                level: 0,
                created_at: i as f64,
                being_compacted: false,
            });
        }
        let mut compactor = FifoCompactor::new();
        let mut rng = SimRng::from_seed(1);
        let job = compactor
            .pick_compaction(&mut state, &config(), &mut rng)
            .expect("ceiling exceeded");
        assert!(job.source_file_ids.contains(&0));
        let result = compactor.execute_compaction(&mut state, &job);
        assert!(result.deleted_mb > 0.0);
        assert_eq!(result.output_mb, 0.0);
    }

    #[test]
    fn no_job_under_ceiling() {
        let mut state = LsmState::new(params(), 0.0);
        state.add_file(SstFile {
            id: 0,
            size_mb: 10.0,
            level: 0,
            created_at: 0.0,
            being_compacted: false,
        });
        let compactor = FifoCompactor::new();
        assert!(!compactor.needs_compaction(&state, &config()));
    }
}
