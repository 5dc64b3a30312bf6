use lakeschema_core::adapter::AdapterError;
use lakeschema_core::pipeline::PipelineError;
use lakeschema_core::registry::RegistryError;

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Failed to read input file: {path}"))]
    ReadInput {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display(
        "No record objects found in {path}. \
         Expected a JSON object, a JSON array of objects, or JSONL."
    ))]
    NoRecords { path: String },

    #[snafu(display("Failed to build a schema from the input sample: {source}"))]
    BuildSchema { source: AdapterError },

    #[snafu(display(
        "Failed to open registry at {path}. \
         Ensure the file is a valid lakeschema registry document."
    ))]
    OpenRegistry {
        path: String,
        source: RegistryError,
    },

    #[snafu(display("Submission failed: {source}"))]
    Submit { source: PipelineError },

    #[snafu(display("Entity '{entity}' is not registered"))]
    UnknownEntity { entity: String },

    #[snafu(display("Failed to render output: {source}"))]
    RenderOutput { source: serde_json::Error },
}
