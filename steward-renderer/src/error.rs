use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// An embedded or override template failed to parse.
    #[error("failed to load templates: {0}")]
    Load(#[from] tera::Error),

    #[error("failed to render {template}: {source}")]
    Render {
        template: &'static str,
        #[source]
        source: tera::Error,
    },

    /// Reading an override from the vault's templates directory failed.
    #[error("template override io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
