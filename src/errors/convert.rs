use crate::descriptor::TypeDescriptor;

/// Constant-conversion failure. The injection point on whose behalf the
/// constant was requested is attached by the provisioning layer.
#[derive(thiserror::Error, Debug)]
pub enum ConvertErrorKind {
    #[error("Type {target} is not a supported constant conversion target")]
    UnsupportedTarget { target: TypeDescriptor },
    #[error("Error converting {value:?} to {target}: {reason}")]
    Parse {
        value: String,
        target: TypeDescriptor,
        reason: String,
    },
    #[error("Expected a single character, got {value:?}")]
    NotSingleChar { value: String },
    #[error("Constant {value:?} does not name a known type")]
    UnknownTypeName { value: String },
}
