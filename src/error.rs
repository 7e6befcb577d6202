///! Error types shared by the sparse/distributed data structures and,
///! via `dsparse-mf`, by the multifrontal factorization and solve.

use thiserror::Error;

/// Everything that can go wrong in the solver, from malformed input to a
/// failed collective. There is no automatic retry; every variant is meant
/// to be fatal to the computation that raised it.
#[derive(Debug, Error)]
pub enum SolverError {
    /// A negative index, an out-of-range row/column, or operands that do
    /// not line up (mismatched grids, misaligned extents).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two things that were supposed to agree in size did not: composing
    /// maps of incompatible size, or a send/recv count mismatch caught by
    /// the verification pass that all-to-alls send counts against recv
    /// counts.
    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    /// A zero or near-zero diagonal was detected during factorization.
    /// Carries the global index of the offending pivot.
    #[error("singular matrix: zero or near-zero pivot at global index {global_index}")]
    SingularMatrix { global_index: usize },

    /// A solve was asked to handle a `FrontType` it does not implement,
    /// or block-LDL was asked to run with a `UNIT` diagonal (nonsensical:
    /// there is no diagonal to invert).
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// A collective returned an error. Always fatal.
    #[error("communication failure: {0}")]
    CommunicationFailure(String),

    /// `Insert` was called outside `StartAssembly`/`StopAssembly`, or
    /// `StopAssembly` was called without a prior `StartAssembly`.
    #[error("assembly state error: {0}")]
    AssemblyState(String),

    /// One of the above, annotated with the routine chain active when it
    /// was raised. Only ever constructed in debug builds; see
    /// [`crate::call_stack`].
    #[error("{source} (call stack: {stack})")]
    Faulted {
        #[source]
        source: Box<SolverError>,
        stack: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SolverError>;

impl SolverError {
    /// Attach the current debug call stack to an error, if one is active.
    /// A no-op (returns `self` unchanged) when no frames are on the stack
    /// or in release builds.
    pub fn with_call_stack(self) -> Self {
        #[cfg(debug_assertions)]
        {
            let stack = crate::call_stack::dump();
            if stack.is_empty() {
                return self;
            }
            return SolverError::Faulted {
                source: Box::new(self),
                stack,
            };
        }
        #[cfg(not(debug_assertions))]
        {
            self
        }
    }
}
