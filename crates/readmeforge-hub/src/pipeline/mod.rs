//! README generation pipeline.
//!
//! Lists a repository, asks the model which files matter, summarizes them,
//! and synthesizes a README. Every LLM call goes through a [`Completer`],
//! normally the [`FallbackController`](crate::providers::FallbackController).

pub mod files;
pub mod prompts;
pub mod stages;

use std::path::Path;

use tracing::info;

use readmeforge_core::config::PipelineSettings;
use readmeforge_core::error::{ForgeError, Result};
use readmeforge_core::message::ChatMessage;
use readmeforge_core::provider::Completer;
use readmeforge_core::retry::RequestOptions;

pub use stages::ReadmeSource;

const CONNECTION_PROMPT: &str = "Hello, please respond with 'OK'";
const CONNECTION_MAX_TOKENS: u32 = 10;

/// Everything a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub readme: String,
    pub source: ReadmeSource,
    pub selected: Vec<String>,
    pub summaries: Vec<String>,
}

pub struct ReadmePipeline {
    settings: PipelineSettings,
    options: RequestOptions,
}

impl ReadmePipeline {
    pub fn new(settings: PipelineSettings, options: RequestOptions) -> Self {
        Self { settings, options }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Check the backend answers at all before spending requests on the repo.
    pub async fn check_connection(&self, completer: &dyn Completer) -> Result<String> {
        let reply = completer
            .complete(
                &[ChatMessage::user(CONNECTION_PROMPT)],
                self.options.with_max_tokens(CONNECTION_MAX_TOKENS),
            )
            .await?;
        info!("API connection successful: {}", reply.trim());
        Ok(reply)
    }

    /// Run all stages against `root`. Does not write anything.
    pub async fn run(&self, completer: &dyn Completer, root: &Path) -> Result<PipelineOutput> {
        self.check_connection(completer).await?;

        let tree = files::list_files(root, &self.settings)?;
        if tree.is_empty() {
            return Err(ForgeError::Other(format!(
                "No files found under {}",
                root.display()
            )));
        }

        let selected = stages::select_files(completer, &tree, &self.settings, self.options).await;
        let summaries =
            stages::summarize_files(completer, root, &selected, &self.settings, self.options).await;
        let (readme, source) =
            stages::generate_readme(completer, &summaries, &self.settings, self.options).await;

        if readme.trim().is_empty() {
            return Err(ForgeError::Other("Generated README is empty".into()));
        }

        info!(?source, files = selected.len(), "README generated");
        Ok(PipelineOutput {
            readme,
            source,
            selected,
            summaries,
        })
    }

    /// Run the pipeline and write the README into `root`.
    pub async fn run_and_write(
        &self,
        completer: &dyn Completer,
        root: &Path,
    ) -> Result<PipelineOutput> {
        let output = self.run(completer, root).await?;
        files::write_readme(root, &self.settings.output_file, &output.readme)?;
        Ok(output)
    }
}
