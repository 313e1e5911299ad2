use serde::{Deserialize, Serialize};

/// Direction of a transform run: binary CAT62 to structured JSON, or back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    #[default]
    Decode,
    Encode,
}

impl TransformMode {
    /// File extensions a picker should advertise for this mode. Advisory
    /// only; any selected file is accepted as-is.
    pub fn advertised_extensions(self) -> &'static [&'static str] {
        match self {
            TransformMode::Decode => &["bin", "ast"],
            TransformMode::Encode => &["json"],
        }
    }

    pub fn artifact_filename(self) -> &'static str {
        match self {
            TransformMode::Decode => "decoded_output.json",
            TransformMode::Encode => "encoded_cat62.ast",
        }
    }

    pub fn artifact_content_type(self) -> &'static str {
        match self {
            TransformMode::Decode => "application/json",
            TransformMode::Encode => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

/// An input file staged for processing, held entirely in memory.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Output of a completed transform, ready to be saved or offered for
/// download under `filename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ResultArtifact {
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}
