// What the chat host hands the plugin on every turn.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::types::LLMMessage;

/// A file the host has stored on disk on behalf of the user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedFile {
    /// Host-assigned identifier; files without one are never deduplicated.
    pub id: Option<String>,
    pub path: PathBuf,
    pub display_name: String,
}

impl UploadedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = display_name_of(&path);
        Self {
            id: None,
            path,
            display_name,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Parse a host file descriptor.
    ///
    /// Accepts the nested form `{"id", "file": {"path" | "url", "name"}}` as
    /// well as a flat `{"id", "path", "name"}` object.
    pub fn from_host_json(value: &Value) -> Option<Self> {
        let inner = value.get("file").unwrap_or(value);
        let path = ["path", "url"]
            .iter()
            .find_map(|k| inner.get(*k).and_then(Value::as_str))
            .or_else(|| value.get("path").and_then(Value::as_str))?;
        let path = PathBuf::from(path);

        let display_name = inner
            .get("name")
            .or_else(|| value.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| display_name_of(&path));

        Some(Self {
            id: value.get("id").and_then(Value::as_str).map(str::to_string),
            path,
            display_name,
        })
    }
}

fn display_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The host side of a single plugin invocation.
pub trait ChatTurn {
    /// Every file attached to the conversation so far, new or not.
    fn files(&self) -> &[UploadedFile];

    fn latest_user_message(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub files: Vec<UploadedFile>,
    pub messages: Vec<LLMMessage>,
}

impl TurnInput {
    /// Build a turn from a host request body (`{"messages": [...]}`) and an
    /// optional list of file descriptors. Malformed entries are skipped.
    pub fn from_host_payload(body: &Value, files: Option<&Value>) -> Self {
        let messages = body
            .get("messages")
            .and_then(Value::as_array)
            .map(|msgs| {
                msgs.iter()
                    .filter_map(|m| {
                        let role = m.get("role").and_then(Value::as_str)?;
                        let content = m.get("content").and_then(Value::as_str)?;
                        Some(LLMMessage::new(role, content))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let files = files
            .and_then(Value::as_array)
            .map(|fs| fs.iter().filter_map(UploadedFile::from_host_json).collect())
            .unwrap_or_default();

        Self { files, messages }
    }
}

impl ChatTurn for TurnInput {
    fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    fn latest_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}
