//! hf-hub: collaborators of the broker core
//!
//! | Trait | Implementation | Endpoint |
//! |-------|----------------|----------|
//! | [`HubApi`] | [`HuggingFaceClient`] | `https://huggingface.co/api` |
//! | [`InferenceApi`] | [`HuggingFaceClient`] | `https://api-inference.huggingface.co/models` |
//! | [`RepoWriter`] | [`HuggingFaceClient`] | `https://huggingface.co/api/repos` |
//! | [`ModelRuntime`] | [`SnapshotRuntime`] | snapshot files under `model_dir` |
//!
//! ```bash
//! HF_TOKEN=hf_xxx   # enables repository writes and authenticated reads
//! ```

pub mod error;
pub mod huggingface;
pub mod provider;
pub mod runtime;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{HubError, RuntimeError};
pub use huggingface::HuggingFaceClient;
pub use provider::{
    BoxedModel, DownloadRequest, GenerationParams, HubApi, InferenceApi, LoadedModel,
    ModelRuntime, RepoWriter, SearchQuery, UploadRequest,
};
pub use runtime::{HostedModel, SnapshotRuntime};
