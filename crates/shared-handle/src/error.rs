//! Recoverable handle errors.

use thiserror::Error;

/// Contract violations a caller can observe and handle.
///
/// Allocation failure and counter underflow are not listed: both abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandleError {
    /// The handle is empty and has no value to hand out.
    #[error("null access: handle holds no value")]
    NullAccess,

    /// Exclusive access was requested while other handles share the binding.
    #[error("binding is shared by {count} handles")]
    NotUnique { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            HandleError::NullAccess.to_string(),
            "null access: handle holds no value"
        );
        assert_eq!(
            HandleError::NotUnique { count: 3 }.to_string(),
            "binding is shared by 3 handles"
        );
    }
}
