//! Small helper macros shared across the workspace.
//!

/// Build a `PathBuf` out of a series of path segments.
///
#[macro_export]
macro_rules! makepath {
    ($($item:expr),+) => {
        [
        $(std::path::PathBuf::from($item),)+
        ]
        .iter()
        .collect::<std::path::PathBuf>()
    };
}
