//! Local file output for the `create` action.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use frederick_template::RenderedBundle;
use tracing::{debug, info};

use crate::deployer::{DeployAction, DeployOutcome, StackDeployer};
use crate::error::{DeployError, DeployResult};

/// Name of the manifest written next to the documents.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Writes every document of a bundle into a directory.
#[derive(Debug, Clone)]
pub struct FileDeployer {
    output_dir: PathBuf,
}

impl FileDeployer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the documents and manifest, returning the written paths.
    ///
    /// Fails before writing anything if two documents, or a document and the
    /// manifest, share a file name.
    pub fn write_bundle(&self, bundle: &RenderedBundle) -> DeployResult<Vec<PathBuf>> {
        let mut names = HashSet::from([MANIFEST_FILE]);
        for document in bundle.documents() {
            if !names.insert(document.file_name.as_str()) {
                return Err(DeployError::DuplicateFile(document.file_name.clone()));
            }
        }

        fs::create_dir_all(&self.output_dir)?;

        let mut written = Vec::new();
        for document in bundle.documents() {
            let path = self.output_dir.join(&document.file_name);
            debug!("Writing {} to {}", document.name, path.display());
            fs::write(&path, &document.body)?;
            written.push(path);
        }

        let manifest = self.output_dir.join(MANIFEST_FILE);
        fs::write(&manifest, bundle.manifest_json()?)?;
        written.push(manifest);

        Ok(written)
    }
}

#[async_trait]
impl StackDeployer for FileDeployer {
    fn name(&self) -> &str {
        "file"
    }

    async fn apply(
        &self,
        bundle: &RenderedBundle,
        action: DeployAction,
    ) -> DeployResult<DeployOutcome> {
        if action != DeployAction::Create {
            return Err(DeployError::UnsupportedAction {
                deployer: self.name().to_string(),
                action: action.to_string(),
            });
        }

        let mut outcome =
            DeployOutcome::begin(action, self.output_dir.display().to_string());
        let written = self.write_bundle(bundle)?;
        outcome.documents = written.iter().map(|p| p.display().to_string()).collect();

        info!(
            "Wrote {} documents for {} to {}",
            bundle.documents().count(),
            bundle.environment,
            self.output_dir.display()
        );

        Ok(outcome.finish())
    }
}
