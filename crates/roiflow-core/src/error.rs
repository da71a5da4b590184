use crate::DType;
use thiserror::Error;

/// Errors raised by tensor glue and the pooling operators.
///
/// Every variant describes a caller-contract violation detected at entry to an
/// operation. Data-level anomalies inside a valid call (degenerate boxes, samples
/// outside the feature map, out-of-batch regions) are never reported through this
/// type; the kernels resolve them numerically.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("Shape mismatch in operation '{operation}': expected {expected}, got {got}")]
    ShapeMismatch {
        operation: String,
        expected: String,
        got: String,
        context: Option<ErrorContext>,
    },

    #[error("Element type mismatch in operation '{operation}': expected {expected}, got {got}")]
    DTypeMismatch {
        operation: String,
        expected: DType,
        got: DType,
        context: Option<ErrorContext>,
    },

    #[error("Invalid shape in operation '{operation}': {reason}")]
    InvalidShape {
        operation: String,
        reason: String,
        shape: Option<Vec<usize>>,
        context: Option<ErrorContext>,
    },

    #[error("Invalid argument in operation '{operation}': {reason}")]
    InvalidArgument {
        operation: String,
        reason: String,
        context: Option<ErrorContext>,
    },

    #[error("Invalid operation '{operation}': {reason}")]
    InvalidOperation {
        operation: String,
        reason: String,
        context: Option<ErrorContext>,
    },
}

/// Additional context information for errors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// Input tensor shapes
    pub input_shapes: Vec<Vec<usize>>,
    /// Input tensor data types
    pub input_dtypes: Vec<DType>,
    /// Output shape (if applicable)
    pub output_shape: Option<Vec<usize>>,
    /// Additional metadata
    pub metadata: Vec<(String, String)>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add input tensor information
    pub fn with_input_tensor(mut self, shape: &[usize], dtype: DType) -> Self {
        self.input_shapes.push(shape.to_vec());
        self.input_dtypes.push(dtype);
        self
    }

    /// Add output shape information
    pub fn with_output_shape(mut self, shape: &[usize]) -> Self {
        self.output_shape = Some(shape.to_vec());
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: &str, value: String) -> Self {
        self.metadata.push((key.to_string(), value));
        self
    }
}

impl TensorError {
    /// Create a shape mismatch error with context
    pub fn shape_mismatch(operation: &str, expected: &str, got: &str) -> Self {
        Self::ShapeMismatch {
            operation: operation.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
            context: None,
        }
    }

    /// Create an element type mismatch error
    pub fn dtype_mismatch(operation: &str, expected: DType, got: DType) -> Self {
        Self::DTypeMismatch {
            operation: operation.to_string(),
            expected,
            got,
            context: None,
        }
    }

    /// Create an invalid shape error with operation context
    pub fn invalid_shape(operation: &str, reason: &str, shape: &[usize]) -> Self {
        Self::InvalidShape {
            operation: operation.to_string(),
            reason: reason.to_string(),
            shape: Some(shape.to_vec()),
            context: None,
        }
    }

    /// Create an invalid shape error without a known operation
    pub fn invalid_shape_simple(reason: String) -> Self {
        Self::InvalidShape {
            operation: "unknown".to_string(),
            reason,
            shape: None,
            context: None,
        }
    }

    /// Create an invalid argument error with operation context
    pub fn invalid_argument_op(operation: &str, reason: &str) -> Self {
        Self::InvalidArgument {
            operation: operation.to_string(),
            reason: reason.to_string(),
            context: None,
        }
    }

    /// Create an invalid operation error with operation context
    pub fn invalid_operation_op(operation: &str, reason: &str) -> Self {
        Self::InvalidOperation {
            operation: operation.to_string(),
            reason: reason.to_string(),
            context: None,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        match &mut self {
            Self::ShapeMismatch { context: ctx, .. }
            | Self::DTypeMismatch { context: ctx, .. }
            | Self::InvalidShape { context: ctx, .. }
            | Self::InvalidArgument { context: ctx, .. }
            | Self::InvalidOperation { context: ctx, .. } => *ctx = Some(context),
        }
        self
    }

    /// Get the error context, if one was attached
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::ShapeMismatch { context, .. }
            | Self::DTypeMismatch { context, .. }
            | Self::InvalidShape { context, .. }
            | Self::InvalidArgument { context, .. }
            | Self::InvalidOperation { context, .. } => context.as_ref(),
        }
    }

    /// Name of the operation that rejected its inputs
    pub fn operation(&self) -> &str {
        match self {
            Self::ShapeMismatch { operation, .. }
            | Self::DTypeMismatch { operation, .. }
            | Self::InvalidShape { operation, .. }
            | Self::InvalidArgument { operation, .. }
            | Self::InvalidOperation { operation, .. } => operation,
        }
    }
}

pub type Result<T> = std::result::Result<T, TensorError>;
