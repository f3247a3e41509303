use std::io;
use std::path::Path;
use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum ActivateError {
    #[error("failed to run {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("{program} failed with {status}")]
    Failed { program: String, status: ExitStatus },
}

/// Commits a downloaded image so that it is booted next
#[async_trait]
pub trait ImageActivator: Send + Sync {
    async fn activate(&self, image: &Path) -> Result<(), ActivateError>;
}

/// Leaves images where they are
#[derive(Debug, Default)]
pub struct NoopActivator;

#[async_trait]
impl ImageActivator for NoopActivator {
    async fn activate(&self, image: &Path) -> Result<(), ActivateError> {
        info!(image = %image.display(), "no activation configured, image left in place");
        Ok(())
    }
}

/// Runs a program with the image path as last argument
#[derive(Debug, Clone)]
pub struct CommandActivator {
    program: String,
    args: Vec<String>,
}

impl CommandActivator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a command line split on whitespace, `None` if it is blank
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_owned);
        let program = words.next()?;
        Some(Self::new(program, words.collect()))
    }
}

#[async_trait]
impl ImageActivator for CommandActivator {
    #[instrument(skip_all, fields(program = %self.program))]
    async fn activate(&self, image: &Path) -> Result<(), ActivateError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .status()
            .await
            .map_err(|source| ActivateError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ActivateError::Failed {
                program: self.program.clone(),
                status,
            });
        }
        info!(image = %image.display(), "image activated");
        Ok(())
    }
}
