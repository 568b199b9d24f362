//! The gateway's file tools.
//!
//! The tool set is closed: [`ToolKind`] lists every tool, and a name outside
//! it is answered with `Unknown tool: <name>`. Each tool needs one scope on
//! top of the connection's admission scopes, and every path argument goes
//! through the [`PathSandbox`] before the filesystem is touched.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gate::AuthorizationContext;
use crate::oauth::ScopePolicy;
use crate::protocol::{
    FileEntry, FileKind, Manifest, SERVER_NAME, SERVER_VERSION, ToolDescriptor, ToolResult,
};
use crate::sandbox::{PathSandbox, SandboxError};

/// Scope required by `read-file`.
pub const SCOPE_FILE_READ: &str = "file.read";

/// Scope required by `list-files`.
pub const SCOPE_FILE_LIST: &str = "file.list";

/// Arguments of `list-files`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListFilesInput {
    /// Directory to list, relative to the sandbox root.
    pub directory: String,
}

/// Arguments of `read-file`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileInput {
    /// File to read, relative to the sandbox root.
    pub file_path: String,
}

/// Every tool the gateway offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListFiles,
    ReadFile,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::ListFiles, ToolKind::ReadFile];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListFiles => "list-files",
            ToolKind::ReadFile => "read-file",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::ListFiles => "List files and directories in a directory",
            ToolKind::ReadFile => "Read the contents of a text file",
        }
    }

    pub fn required_scope(self) -> &'static str {
        match self {
            ToolKind::ListFiles => SCOPE_FILE_LIST,
            ToolKind::ReadFile => SCOPE_FILE_READ,
        }
    }

    pub fn input_schema(self) -> Value {
        let schema = match self {
            ToolKind::ListFiles => schemars::schema_for!(ListFilesInput),
            ToolKind::ReadFile => schemars::schema_for!(ReadFileInput),
        };
        serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
    }

    pub fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            required_scope: self.required_scope().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// The manifest sent in reply to `initialize`.
pub fn manifest() -> Manifest {
    Manifest {
        name: SERVER_NAME.to_string(),
        version: SERVER_VERSION.to_string(),
        description: "Scope-gated read-only access to a sandboxed directory".to_string(),
        tools: ToolKind::ALL.into_iter().map(ToolKind::descriptor).collect(),
    }
}

/// Tool dispatcher bound to one sandbox.
#[derive(Debug, Clone)]
pub struct FileTools {
    sandbox: PathSandbox,
    policy: ScopePolicy,
}

impl FileTools {
    pub fn new(sandbox: PathSandbox) -> Self {
        let policy = ToolKind::ALL
            .into_iter()
            .fold(ScopePolicy::new(), |policy, kind| {
                policy.tool_scope(kind.name(), kind.required_scope())
            });
        Self { sandbox, policy }
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Run a tool call on behalf of an admitted connection.
    ///
    /// Every failure, including unknown tools, missing scopes and sandbox
    /// escapes, comes back as a failure result; none ends the connection.
    pub async fn call(
        &self,
        name: &str,
        arguments: Value,
        context: &AuthorizationContext,
    ) -> ToolResult {
        let Some(kind) = ToolKind::from_name(name) else {
            return ToolResult::failure(format!("Unknown tool: {}", name));
        };

        if let Err(e) = self.policy.check_tool(kind.name(), &context.scopes) {
            tracing::warn!(tool = name, subject = %context.subject, error = %e, "Tool call denied");
            return ToolResult::failure(format!("Forbidden: {}", e));
        }

        let result = match kind {
            ToolKind::ListFiles => match parse::<ListFilesInput>(arguments) {
                Ok(input) => self.list_files(&input.directory).await,
                Err(result) => return result,
            },
            ToolKind::ReadFile => match parse::<ReadFileInput>(arguments) {
                Ok(input) => self.read_file(&input.file_path).await,
                Err(result) => return result,
            },
        };

        match result {
            Ok(result) => result,
            Err(e) => {
                if matches!(e, SandboxError::PathEscape { .. }) {
                    tracing::warn!(tool = name, subject = %context.subject, error = %e, "Path escape attempt");
                } else {
                    tracing::debug!(tool = name, error = %e, "Tool call failed");
                }
                ToolResult::failure(e.to_string())
            }
        }
    }

    async fn list_files(&self, directory: &str) -> Result<ToolResult, SandboxError> {
        let shown = self.sandbox.relative(&self.sandbox.resolve(directory)?).to_path_buf();
        let real = self.sandbox.resolve_existing(directory).await?;

        let mut entries = tokio::fs::read_dir(&real).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let kind = if entry.file_type().await?.is_dir() {
                FileKind::Directory
            } else {
                FileKind::File
            };
            files.push(FileEntry {
                path: shown.join(&name).to_string_lossy().into_owned(),
                name,
                kind,
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!(path = %real.display(), count = files.len(), "Listed directory");
        Ok(ToolResult::files(files))
    }

    async fn read_file(&self, file_path: &str) -> Result<ToolResult, SandboxError> {
        let real = self.sandbox.resolve_existing(file_path).await?;
        let content = tokio::fs::read_to_string(&real).await?;
        tracing::debug!(path = %real.display(), bytes = content.len(), "Read file");
        Ok(ToolResult::content(content, file_path))
    }
}

fn parse<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolResult> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolResult::failure(format!("Invalid arguments: {}", e)))
}
