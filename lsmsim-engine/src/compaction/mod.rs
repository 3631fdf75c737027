//! Compaction strategies
//!
//! The simulator models three compaction styles behind a common
//! [`Compactor`] contract: [`leveled::LeveledCompactor`],
//! [`universal::UniversalCompactor`], and [`fifo::FifoCompactor`]. None of
//! them track real key ranges; instead, when a job needs to know how many
//! files in a target level it overlaps, it samples the count from the
//! configured [`lsmsim_core::OverlapDistribution`] via
//! [`crate::distributions::file_count_selection`].

pub mod fifo;
pub mod leveled;
pub mod universal;

use crate::distributions::SimRng;
use crate::lsm::{LsmState, SstFile};
use lsmsim_core::{FileId, LevelIndex, SimulatorConfig, VirtualTime};

/// A single compaction job in flight
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionJob {
    /// Source level (files are removed from here on completion)
    pub from_level: LevelIndex,
    /// Destination level (output files land here)
    pub to_level: LevelIndex,
    /// Ids of files consumed as input, across `from_level` and, for
    /// non-trivial jobs, the overlapping portion of `to_level`
    pub source_file_ids: Vec<FileId>,
    /// Ids of files in `to_level` absorbed into the job alongside
    /// `from_level`'s files (empty for a trivial move or intra-L0 job)
    pub target_file_ids: Vec<FileId>,
    /// `true` for an L0-internal compaction that does not touch L1+
    pub is_intra_l0: bool,
    /// `true` when the job is a pure rename: no target-level overlap and a
    /// single source file, so no bytes are rewritten
    pub is_trivial_move: bool,
    /// Total input size, MB
    pub input_mb: f64,
    /// Virtual time the job's reserved disk window began
    pub scheduled_start: Option<VirtualTime>,
    /// Virtual time the job is due to complete
    pub completion_time: Option<VirtualTime>,
}

/// The outcome of executing a completed compaction job
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactionResult {
    /// Total input size consumed, MB
    pub input_mb: f64,
    /// Total output size produced, MB (0 for a pure deletion)
    pub output_mb: f64,
    /// Number of output files produced
    pub num_output_files: usize,
    /// Portion of `input_mb` that was a trivial move (not rewritten)
    pub moved_mb: f64,
    /// Portion of `input_mb` dropped outright (FIFO deletion)
    pub deleted_mb: f64,
}

/// Splits `output_mb` into `ceil(output_mb / target_file_size)` new files at
/// `level`, each sized `output_mb / num_output_files` except the last, which
/// absorbs the remainder; inserts them into `state` and returns how many
/// were created.
///
/// `target_file_size` of `0` or `output_mb` of `0` both degenerate to a
/// single (possibly zero-size) output file, since a job always produces at
/// least one output entry.
pub(crate) fn split_output_files(
    state: &mut LsmState,
    level: LevelIndex,
    output_mb: f64,
    target_file_size: f64,
    created_at: VirtualTime,
) -> usize {
    let num_files = if target_file_size > 0.0 && output_mb > 0.0 {
        (output_mb / target_file_size).ceil().max(1.0) as usize
    } else {
        1
    };
    let per_file = output_mb / num_files as f64;
    for i in 0..num_files {
        let size = if i == num_files - 1 {
            output_mb - per_file * (num_files as f64 - 1.0)
        } else {
            per_file
        };
        let id = state.allocate_file_id();
        state.add_file(SstFile {
            id,
            size_mb: size,
            level,
            created_at,
            being_compacted: false,
        });
    }
    num_files
}

/// Common behavior every compaction strategy implements
///
/// A strategy is asked, each compaction-check tick, whether it has capacity
/// and motivation to start a new job ([`Compactor::needs_compaction`]), to
/// pick one ([`Compactor::pick_compaction`]), and, once its reserved disk
/// window elapses, to apply its effect to the tree
/// ([`Compactor::execute_compaction`]).
pub trait Compactor {
    /// `true` if another job could usefully be started right now, given
    /// `max_background_jobs` and the current per-strategy active-job
    /// bookkeeping
    fn needs_compaction(&self, state: &LsmState, config: &SimulatorConfig) -> bool;

    /// Selects and reserves the next compaction job to run
    ///
    /// Marks the chosen input files as `being_compacted` in `state` and
    /// records the job in the strategy's internal active-job bookkeeping.
    /// Returns `None` if, on closer inspection (e.g. lost a race against
    /// another trigger), there is nothing eligible to compact.
    fn pick_compaction(
        &mut self,
        state: &mut LsmState,
        config: &SimulatorConfig,
        rng: &mut SimRng,
    ) -> Option<CompactionJob>;

    /// Applies a completed job's effect: removes input files, inserts
    /// output files (or records a deletion), and clears the job from
    /// active-job bookkeeping
    fn execute_compaction(&mut self, state: &mut LsmState, job: &CompactionJob) -> CompactionResult;

    /// Releases a job's reservation without applying its effect, clearing
    /// `being_compacted` on its source files
    ///
    /// Used when a run is reset mid-job.
    fn on_job_canceled(&mut self, state: &mut LsmState, job: &CompactionJob);

    /// Number of jobs this strategy currently considers active
    fn active_count(&self) -> usize;
}

/// The active compaction strategy, dispatching to one of the three
/// concrete implementations
pub enum CompactionEngine {
    /// RocksDB-style leveled compaction
    Leveled(leveled::LeveledCompactor),
    /// RocksDB-style universal (tiered) compaction
    Universal(universal::UniversalCompactor),
    /// FIFO compaction
    Fifo(fifo::FifoCompactor),
}

impl CompactionEngine {
    /// Builds the engine matching `config.compaction_style`
    pub fn new(config: &SimulatorConfig) -> Self {
        match config.compaction_style {
            lsmsim_core::CompactionStyle::Leveled => {
                Self::Leveled(leveled::LeveledCompactor::new())
            }
            lsmsim_core::CompactionStyle::Universal => {
                Self::Universal(universal::UniversalCompactor::new())
            }
            lsmsim_core::CompactionStyle::Fifo => Self::Fifo(fifo::FifoCompactor::new()),
        }
    }
}

impl Compactor for CompactionEngine {
    fn needs_compaction(&self, state: &LsmState, config: &SimulatorConfig) -> bool {
        match self {
            Self::Leveled(c) => c.needs_compaction(state, config),
            Self::Universal(c) => c.needs_compaction(state, config),
            Self::Fifo(c) => c.needs_compaction(state, config),
        }
    }

    fn pick_compaction(
        &mut self,
        state: &mut LsmState,
        config: &SimulatorConfig,
        rng: &mut SimRng,
    ) -> Option<CompactionJob> {
        match self {
            Self::Leveled(c) => c.pick_compaction(state, config, rng),
            Self::Universal(c) => c.pick_compaction(state, config, rng),
            Self::Fifo(c) => c.pick_compaction(state, config, rng),
        }
    }

    fn execute_compaction(&mut self, state: &mut LsmState, job: &CompactionJob) -> CompactionResult {
        match self {
            Self::Leveled(c) => c.execute_compaction(state, job),
            Self::Universal(c) => c.execute_compaction(state, job),
            Self::Fifo(c) => c.execute_compaction(state, job),
        }
    }

    fn on_job_canceled(&mut self, state: &mut LsmState, job: &CompactionJob) {
        match self {
            Self::Leveled(c) => c.on_job_canceled(state, job),
            Self::Universal(c) => c.on_job_canceled(state, job),
            Self::Fifo(c) => c.on_job_canceled(state, job),
        }
    }

    fn active_count(&self) -> usize {
        match self {
            Self::Leveled(c) => c.active_count(),
            Self::Universal(c) => c.active_count(),
            Self::Fifo(c) => c.active_count(),
        }
    }
}
