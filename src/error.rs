use thiserror::Error;

macro_rules! lowlevel_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::LowLevel {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::LowLevel {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Rewriting distinguishes two very different kinds of failure. A rule that finds its
/// pattern does not fully apply simply returns `Ok(false)` and is never an error. Everything
/// in this enum is either a broken structural invariant that cannot be repaired locally, or a
/// problem with the configuration protocol.
///
/// # Error Categories
///
/// ## Structural Errors
/// - [`Error::LowLevel`] - An IR invariant a rewrite relies on does not hold
/// - [`Error::Context`] - A structural error annotated at a checkpoint (rule, call site)
/// - [`Error::RecursionLimit`] - Maximum recursion depth exceeded while walking the graph
///
/// ## Configuration Errors
/// - [`Error::Parse`] - A malformed option command or parameter
/// - [`Error::UnknownAction`] - An action or rule path that does not resolve
///
/// # Examples
///
/// ```rust
/// use pcodeopt::Error;
/// use pcodeopt::engine::{options::OptionDatabase, database::ActionDatabase};
///
/// let mut actions = ActionDatabase::new();
/// actions.universal_action();
/// let mut options = OptionDatabase::new(&mut actions);
/// match options.set("maxrestarts", "", "", "") {
///     Err(Error::Parse(message)) => println!("bad option: {}", message),
///     Err(e) => println!("other error: {}", e),
///     Ok(msg) => println!("{}", msg),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A low-level structural invariant was violated.
    ///
    /// Raised when a rewrite encounters a graph shape it depends on but which cannot hold in
    /// a well-formed function, e.g. a copy that defines its own input or a segment operation
    /// without a segment definition. The whole analysis of the current function is aborted.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the violated invariant
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("LowLevel - {file}:{line}: {message}")]
    LowLevel {
        /// The message to be printed for the LowLevel error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A structural error with additional context attached while unwinding.
    ///
    /// Context is appended at a small number of well-known checkpoints: the rule dispatch
    /// loop (rule name and operation sequence number) and sub-call resolution (the callee's
    /// name and call-site address).
    #[error("{context}: {source}")]
    Context {
        /// Description of where the error passed through
        context: String,
        /// The underlying error
        source: Box<Error>,
    },

    /// Failed to parse a configuration command.
    ///
    /// Covers missing parameters, unknown option names and values that are not
    /// valid for the option (e.g. a non-numeric restart bound).
    #[error("Parse error: {0}")]
    Parse(String),

    /// A named action, rule or profile does not exist.
    #[error("Unknown action or rule - {0}")]
    UnknownAction(String),

    /// Recursion limit reached.
    ///
    /// Graph walks (copy chains, mask propagation) are bounded to guard against
    /// cyclic or pathologically deep dataflow.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Wraps this error with a context string.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping all [`Error::Context`] layers.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns `true` if the innermost error is a structural [`Error::LowLevel`] error.
    #[must_use]
    pub fn is_lowlevel(&self) -> bool {
        matches!(self.root(), Error::LowLevel { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowlevel_macro_records_location() {
        let err = lowlevel_error!("bad {} op", "copy");
        match err {
            Error::LowLevel { message, file, line } => {
                assert_eq!(message, "bad copy op");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            _ => panic!("expected LowLevel"),
        }
    }

    #[test]
    fn test_context_chain() {
        let err = lowlevel_error!("boom")
            .context("rule trivialarith at 0x1000:3")
            .context("action oppool1");
        assert!(err.is_lowlevel());
        let text = err.to_string();
        assert!(text.starts_with("action oppool1: rule trivialarith"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn test_parse_is_not_lowlevel() {
        let err = Error::Parse("missing".into());
        assert!(!err.is_lowlevel());
    }
}
