//! Schema sources
//!
//! Describes where candidate message types come from: a `.proto` file that is
//! compiled at startup, or a pre-built `FileDescriptorSet` (`protoc -o`).

use std::path::{Path, PathBuf};

use prost_reflect::DescriptorPool;

use crate::error::{Result, SchemaLoadError};

/// Fully-qualified names of the reference Solana block schema, in the order
/// the cascade tries them.
pub const DEFAULT_MESSAGE_TYPES: [&str; 3] = [
    "solana.storage.ConfirmedBlock.ConfirmedBlock",
    "solana.storage.ConfirmedBlock.ConfirmedTransaction",
    "solana.storage.ConfirmedBlock.Transaction",
];

/// Location and selection of binary schema definitions.
#[derive(Debug, Clone)]
pub struct SchemaSource {
    /// `.proto` file, or a serialized descriptor set (`.bin`, `.binpb`, `.pb`, `.desc`).
    pub path: PathBuf,
    /// Extra directories searched for `import`s. The schema file's own
    /// directory is always searched first.
    pub include_paths: Vec<PathBuf>,
    /// Fully-qualified message names to expose, in priority order.
    pub message_types: Vec<String>,
}

impl SchemaSource {
    /// Source exposing the reference message types from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            include_paths: Vec::new(),
            message_types: DEFAULT_MESSAGE_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_message_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    /// Whether the source is a compiled descriptor set rather than `.proto` text.
    pub fn is_descriptor_set(&self) -> bool {
        matches!(
            self.path.extension().and_then(|e| e.to_str()),
            Some("bin" | "binpb" | "pb" | "desc")
        )
    }

    /// Build the descriptor pool for this source.
    pub fn load_pool(&self) -> Result<DescriptorPool> {
        if !self.path.exists() {
            return Err(SchemaLoadError::SourceNotFound(
                self.path.display().to_string(),
            ));
        }

        if self.is_descriptor_set() {
            let bytes = std::fs::read(&self.path)?;
            return DescriptorPool::decode(bytes.as_slice())
                .map_err(|e| SchemaLoadError::InvalidDescriptor(e.to_string()));
        }

        self.compile_proto()
    }

    fn compile_proto(&self) -> Result<DescriptorPool> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| SchemaLoadError::SourceNotFound(self.path.display().to_string()))?;

        let mut includes = vec![parent.to_path_buf()];
        includes.extend(self.include_paths.iter().cloned());

        let file_set = protox::compile([Path::new(file_name)], includes)
            .map_err(|e| SchemaLoadError::CompileError(e.to_string()))?;

        DescriptorPool::from_file_descriptor_set(file_set)
            .map_err(|e| SchemaLoadError::InvalidDescriptor(e.to_string()))
    }
}
