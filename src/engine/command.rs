//! External command test engine
//!
//! Runs a configured command line over the loaded test files. The command may
//! contain a `{}` placeholder; in batch mode it is replaced by all loaded files,
//! in per-file mode by a single file. Without a placeholder the files are
//! appended to the command.

use super::TestEngine;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

/// Placeholder replaced by the file list
pub const FILE_PLACEHOLDER: &str = "{}";

/// How loaded files are handed to the command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStrategy {
    /// One invocation with every loaded file
    #[default]
    Batch,
    /// One invocation per loaded file
    PerFile,
}

/// Engine that shells out to an external test command
#[derive(Debug, Clone)]
pub struct CommandEngine {
    command: Vec<String>,
    strategy: ExecutionStrategy,
    files: Vec<String>,
}

impl CommandEngine {
    pub fn new(command: Vec<String>, strategy: ExecutionStrategy) -> Self {
        Self {
            command,
            strategy,
            files: Vec::new(),
        }
    }

    /// Files registered so far, in load order
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Build the argv for one invocation over `files`.
    pub fn build_argv(&self, files: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.command.len() + files.len());
        let mut substituted = false;

        for arg in &self.command {
            if arg == FILE_PLACEHOLDER {
                argv.extend(files.iter().cloned());
                substituted = true;
            } else {
                argv.push(arg.clone());
            }
        }

        if !substituted {
            argv.extend(files.iter().cloned());
        }

        argv
    }

    fn invoke(&self, files: &[String]) -> Result<bool> {
        let argv = self.build_argv(files);
        let (program, args) = argv
            .split_first()
            .context("Test command is empty")?;

        debug!("Running {:?}", argv);

        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("Failed to run test command: {}", program))?;

        if !status.success() {
            warn!("Test command exited with {} for {} file(s)", status, files.len());
        }

        Ok(status.success())
    }
}

impl TestEngine for CommandEngine {
    fn load(&mut self, item: &str) -> Result<()> {
        if !Path::new(item).exists() {
            anyhow::bail!("Test file not found: {}", item);
        }

        debug!("Load {}", item);
        self.files.push(item.to_string());
        Ok(())
    }

    fn run_all(&mut self) -> Result<bool> {
        if self.files.is_empty() {
            info!("No test files loaded, nothing to run");
            return Ok(true);
        }

        info!("Running {} test file(s)", self.files.len());

        match self.strategy {
            ExecutionStrategy::Batch => self.invoke(&self.files),
            ExecutionStrategy::PerFile => {
                let mut passed = true;
                for file in &self.files {
                    // Keep going after a failure so every file gets reported
                    passed &= self.invoke(std::slice::from_ref(file))?;
                }
                Ok(passed)
            }
        }
    }

    fn loaded(&self) -> usize {
        self.files.len()
    }
}
