//! Configuration options for compiling and listing verb programs.

use crate::program::FormatVersion;

/// Configuration options for compilation.
///
/// These options control which bytecode format is emitted and whether the
/// experimental reduce-ref pass runs.
///
/// # Example
///
/// ```
/// use moocode_core::api::CompilationOptions;
/// use moocode_core::program::FormatVersion;
///
/// let options = CompilationOptions {
///     version: FormatVersion::BreakCont,
///     ..CompilationOptions::default()
/// };
/// assert!(!options.reduce_ref);
/// ```
#[derive(Debug, Clone)]
pub struct CompilationOptions {
    /// Format version the program is generated for. Constructs the version
    /// does not support are rejected as internal errors.
    ///
    /// Default: [`FormatVersion::CURRENT`]
    pub version: FormatVersion,

    /// Rewrite the last push of a variable before it is overwritten into a
    /// push-and-clear opcode. The flag is recorded on the program.
    ///
    /// Default: false
    pub reduce_ref: bool,

    /// Source line of the first statement in the verb body.
    ///
    /// Default: 1
    pub first_lineno: u32,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self {
            version: FormatVersion::CURRENT,
            reduce_ref: false,
            first_lineno: 1,
        }
    }
}

/// Configuration options for rendering source listings.
///
/// # Example
///
/// ```
/// use moocode_core::api::UnparseOptions;
///
/// let options = UnparseOptions {
///     indent: 4,
///     fully_parenthesize: true,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct UnparseOptions {
    /// Spaces per nesting level.
    ///
    /// Default: 2
    pub indent: usize,

    /// Parenthesize every compound subexpression instead of only where
    /// precedence requires it.
    ///
    /// Default: false
    pub fully_parenthesize: bool,
}

impl Default for UnparseOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            fully_parenthesize: false,
        }
    }
}
