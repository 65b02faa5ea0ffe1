/// Errors that can occur while compiling or assembling a filter program.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// A relative jump does not fit the 8-bit skip field. The aggregate
    /// channel-set length is too large for a single program; use fewer or
    /// shorter channels.
    #[error("jump at instruction {at} skips {distance} instructions (max 255)")]
    SkipOutOfRange { at: usize, distance: usize },

    /// A symbolic jump survived to assembly. Programs must be backpatched
    /// before they are assembled or executed.
    #[error("unresolved symbolic jump at instruction {at}")]
    UnresolvedSkip { at: usize },

    /// A load width other than 1, 2 or 4 bytes.
    #[error("invalid load size: {size} bytes")]
    BadLoadSize { size: u32 },
}

pub type Result<T> = std::result::Result<T, FilterError>;
