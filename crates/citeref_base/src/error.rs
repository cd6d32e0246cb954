use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use tracing_error::{SpanTrace, SpanTraceStatus};

/* 📖 # Why a custom error type and not use anyhow/eyre/thiserror etc?

- Better control over error handling
- No dependencies to compile and integrate
- More transparency into error handling logic
- API error codes can be derived directly from the error kind
 */

/// Error variants that can occur in citeref operations.
/// Each variant represents a specific error category with its associated context.
#[derive(Debug)]
pub enum ErrorKind {
    /// File system operation failed
    FileError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reference storage is switched off in the site configuration
    FeatureDisabled,

    /// The continuation parameter is not a canonical integer
    InvalidContinuation { value: String },

    /// Input could not be parsed (config files, data files, query parameters)
    Parse { what: String, message: String },

    /// Catch-all for other errors with a message
    Message { message: String },
}

/* 📖 # Why separate ErrorKind and CiterefError?
ErrorKind holds the structural variant that callers pattern match on, for example
to turn `FeatureDisabled` into the `citestoragedisabled` API error code.
CiterefError wraps it with a context stack, an optional cause and the span trace
captured when the error was created.
*/

/// Error type wrapping ErrorKind with context, cause and span trace.
pub struct CiterefError {
    kind: ErrorKind,
    context: Vec<String>,
    cause: Option<Box<CiterefError>>,
    span_trace: SpanTrace,
}

impl CiterefError {
    /// Creates a new error from an ErrorKind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
            cause: None,
            span_trace: SpanTrace::capture(),
        }
    }

    /// Creates a plain message error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message {
            message: message.into(),
        })
    }

    /// Creates a parse error for the named input.
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse {
            what: what.into(),
            message: message.into(),
        })
    }

    /// Attaches context to an error.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Records another error as the cause of this one.
    pub fn caused_by(mut self, cause: CiterefError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns a reference to the underlying ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the attached context strings, oldest first.
    pub fn get_context(&self) -> &[String] {
        &self.context
    }

    /// Returns the recorded cause, if any.
    pub fn cause(&self) -> Option<&CiterefError> {
        self.cause.as_deref()
    }

    /// Returns the span trace captured at construction.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// Stable machine-readable code used in API error responses.
    pub fn code(&self) -> &'static str {
        match &self.kind {
            ErrorKind::FeatureDisabled => "citestoragedisabled",
            ErrorKind::InvalidContinuation { .. } => "badcontinue",
            ErrorKind::Parse { .. } => "badvalue",
            ErrorKind::FileError { .. } | ErrorKind::Message { .. } => "internal_api_error",
        }
    }

    /// Returns the innermost error in the chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    fn fmt_kind(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::FileError { path, source } => {
                write!(f, "File error at {}: {}", path.display(), source)
            }
            ErrorKind::FeatureDisabled => {
                write!(f, "Cite extension reference storage is not enabled")
            }
            ErrorKind::InvalidContinuation { value } => {
                write!(
                    f,
                    "Invalid continue param '{}'. You should pass the original value returned by the previous query",
                    value
                )
            }
            ErrorKind::Parse { what, message } => write!(f, "Failed to parse {}: {}", what, message),
            ErrorKind::Message { message } => write!(f, "{}", message),
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: &str) -> fmt::Result {
        let mut entries: Vec<String> = self.context.clone();
        if let Some(cause) = &self.cause {
            entries.push(format!("cause: {}", cause.kind_string()));
        }
        let count = entries.len();
        for (i, entry) in entries.iter().enumerate() {
            let last = i + 1 == count;
            writeln!(f, "{}{} {}", indent, if last { "└─" } else { "├─" }, entry)?;
            if last {
                if let Some(cause) = &self.cause {
                    cause.fmt_tree(f, &format!("{}   ", indent))?;
                }
            }
        }
        Ok(())
    }

    fn kind_string(&self) -> String {
        struct KindDisplay<'a>(&'a CiterefError);
        impl fmt::Display for KindDisplay<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt_kind(f)
            }
        }
        KindDisplay(self).to_string()
    }
}

impl From<ErrorKind> for CiterefError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl StdError for CiterefError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::FileError { source, .. } => Some(source),
            _ => self.cause.as_deref().map(|c| c as &(dyn StdError + 'static)),
        }
    }
}

impl fmt::Display for CiterefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ctx in &self.context {
            write!(f, "{}: ", ctx)?;
        }
        self.fmt_kind(f)
    }
}

/* 📖 # Why a tree-shaped Debug output?
Errors are usually printed with `{:?}` at the top of the binary. A tree with the
message first, then context and causes, then the span trace reads better in a
terminal than the derived struct dump.
*/
impl fmt::Debug for CiterefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_kind(f)?;
        writeln!(f)?;
        self.fmt_tree(f, "")?;
        if self.span_trace.status() == SpanTraceStatus::CAPTURED {
            writeln!(f, "Trace: {}", self.span_trace)?;
        }
        Ok(())
    }
}

/// Standard result type for citeref operations.
pub type CiterefResult<T> = std::result::Result<T, Box<CiterefError>>;

/// Extension trait for attaching context to Results.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    fn context(self, context: impl Into<String>) -> CiterefResult<T>;

    /// Attaches context using lazy evaluation.
    /// Context is only evaluated if the result is an error.
    fn with_context<F>(self, f: F) -> CiterefResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for CiterefResult<T> {
    fn context(self, context: impl Into<String>) -> CiterefResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> CiterefResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}

/// Build a boxed message error from a format string.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        Box::new($crate::CiterefError::message(format!($($arg)*)))
    };
}

/// Return early with a boxed message error.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::err!($($arg)*))
    };
}
