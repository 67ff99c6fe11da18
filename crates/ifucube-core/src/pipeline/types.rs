use std::path::PathBuf;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Loading,
    Sampling,
    Aligning,
    BuildingGrid,
    Weighting,
    Resampling,
    Writing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading frames"),
            Self::Sampling => write!(f, "Voxel sampling"),
            Self::Aligning => write!(f, "Aligning frames"),
            Self::BuildingGrid => write!(f, "Building grid"),
            Self::Weighting => write!(f, "Optimal weights"),
            Self::Resampling => write!(f, "Resampling"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Files written for one cube.
#[derive(Clone, Debug)]
pub struct CoaddOutput {
    pub cube: PathBuf,
    pub whitelight: Option<PathBuf>,
    pub residual: Option<PathBuf>,
    pub shape: (usize, usize, usize),
    pub empty_voxels: usize,
    pub frames: usize,
}

/// Thread-safe progress reporting for the pipeline.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage, if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    fn finish_stage(&self) {}
}

/// Progress reporter that ignores every event.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
