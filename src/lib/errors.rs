//! Custom error types for seqmap operations.

use thiserror::Error;

/// Result type alias for seqmap operations
pub type Result<T> = std::result::Result<T, SeqmapError>;

/// Error type for seqmap operations
#[derive(Error, Debug)]
pub enum SeqmapError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "FASTA", "FASTQ")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Scratch memory could not be reserved.
    #[error("Failed to allocate {bytes} bytes for {context}")]
    Allocation {
        /// Number of bytes requested
        bytes: usize,
        /// Which buffer and stage asked for the memory
        context: String,
    },

    /// The reference contained no usable sequence.
    #[error("Reference '{path}' contains no sequences")]
    EmptyReference {
        /// Path to the reference FASTA
        path: String,
    },

    /// A pipeline worker stopped because another worker failed or panicked.
    #[error("Pipeline aborted: {reason}")]
    PipelineAborted {
        /// Description of the failure that stopped the pipeline
        reason: String,
    },

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SeqmapError {
    /// Convenience constructor for [`SeqmapError::Allocation`].
    #[must_use]
    pub fn allocation(bytes: usize, context: impl Into<String>) -> Self {
        Self::Allocation { bytes, context: context.into() }
    }
}
