use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(i3wire::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(i3wire::config::invalid))]
    Invalid { message: String },

    #[error("Missing value for `{field}`")]
    #[diagnostic(code(i3wire::config::missing_value))]
    MissingValue { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
