///! Explicit configuration structs replacing what the source kept as
///! build flags or an ambient argument parser. Threaded as `&CommConfig`
///! / `&AnalysisConfig` parameters into the entry points that need them,
///! rather than read from the environment or a CLI (CLI parsing is out
///! of scope for this crate).

/// Controls how collectives in [`crate::comm`] lower to MPI calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommConfig {
    /// Mirrors `USE_CUSTOM_ALLTOALLV`: when set, `sparse_all_to_all`
    /// posts `immediate_receive`/`immediate_send`/wait-all instead of
    /// calling into `MPI_Alltoallv` directly.
    pub use_custom_all_to_all_v: bool,
    /// Mirrors `BARRIER_IN_ALLTOALLV`: when set (and
    /// `use_custom_all_to_all_v` is also set), a barrier separates
    /// posting receives from posting sends.
    pub barrier_in_all_to_all_v: bool,
}

impl Default for CommConfig {
    fn default() -> Self {
        CommConfig {
            use_custom_all_to_all_v: false,
            barrier_in_all_to_all_v: false,
        }
    }
}

/// Options recognised by symbolic analysis / the (out-of-scope) external
/// partitioner. Kept here because symbolic analysis reads `cutoff`,
/// `sequential`, and `analytic` to decide how deep the distributed part
/// of the tree goes; the partitioner itself is not implemented by this
/// crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Run symbolic separator computation on a single process.
    pub sequential: bool,
    /// Maximum size of a leaf subdomain during separator recursion.
    pub cutoff: usize,
    /// Candidate distributed separators tried by the (external)
    /// partitioner.
    pub num_dist_seps: usize,
    /// Candidate sequential separators tried by the (external)
    /// partitioner.
    pub num_seq_seps: usize,
    /// Use an analytic (lexicographic) separator tree rather than a
    /// graph-based one.
    pub analytic: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            sequential: false,
            cutoff: 128,
            num_dist_seps: 1,
            num_seq_seps: 1,
            analytic: false,
        }
    }
}
