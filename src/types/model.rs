use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A completion model identifier.
///
/// Settings only ever select a known model.  Storage written by a different build may name a model
/// this build does not list; it parses as `Custom` and the store replaces it with the default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// One of the models offered in the model picker.
    Known(KnownModel),

    /// Any other model identifier.
    Custom(String),
}

/// The models offered in the model picker.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// Llama 3.1 8B Instruct (FP8).
    #[default]
    #[serde(rename = "Meta-Llama-3-1-8B-Instruct-FP8")]
    Llama31_8BInstructFp8,

    /// Llama 3.1 405B Instruct (FP8).
    #[serde(rename = "Meta-Llama-3-1-405B-Instruct-FP8")]
    Llama31_405BInstructFp8,

    /// Llama 3.2 3B Instruct.
    #[serde(rename = "Meta-Llama-3-2-3B-Instruct")]
    Llama32_3BInstruct,

    /// Nvidia's Nemotron tune of Llama 3.1 70B.
    #[serde(rename = "nvidia-Llama-3-1-Nemotron-70B-Instruct-HF")]
    NemotronLlama31_70BInstruct,
}

impl KnownModel {
    /// Every known model, in picker order.
    pub const ALL: [KnownModel; 4] = [
        KnownModel::Llama31_8BInstructFp8,
        KnownModel::Llama31_405BInstructFp8,
        KnownModel::Llama32_3BInstruct,
        KnownModel::NemotronLlama31_70BInstruct,
    ];

    /// The wire identifier sent as `model`.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownModel::Llama31_8BInstructFp8 => "Meta-Llama-3-1-8B-Instruct-FP8",
            KnownModel::Llama31_405BInstructFp8 => "Meta-Llama-3-1-405B-Instruct-FP8",
            KnownModel::Llama32_3BInstruct => "Meta-Llama-3-2-3B-Instruct",
            KnownModel::NemotronLlama31_70BInstruct => "nvidia-Llama-3-1-Nemotron-70B-Instruct-HF",
        }
    }
}

impl Model {
    /// The wire identifier sent as `model`.
    pub fn as_str(&self) -> &str {
        match self {
            Model::Known(known) => known.as_str(),
            Model::Custom(custom) => custom,
        }
    }

    /// The size label shown in the status line, e.g. `8B` for the 8B Llama.
    ///
    /// This is the second-to-last dash-separated component of the identifier.
    pub fn short_label(&self) -> &str {
        let parts: Vec<&str> = self.as_str().split('-').collect();
        if parts.len() >= 2 {
            parts[parts.len() - 2]
        } else {
            self.as_str()
        }
    }

    /// The label shown in the model list, e.g. `1 8B Instruct FP8`.
    ///
    /// This is the last four dash-separated components joined by spaces.
    pub fn menu_label(&self) -> String {
        let parts: Vec<&str> = self.as_str().split('-').collect();
        let start = parts.len().saturating_sub(4);
        parts[start..].join(" ")
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Known(KnownModel::default())
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KnownModel {
    type Err = String;

    /// Parses a model by exact identifier, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KnownModel::ALL
            .iter()
            .copied()
            .find(|model| model.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown model: {s}"))
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<String> for Model {
    fn from(model: String) -> Self {
        match model.parse::<KnownModel>() {
            Ok(known) => Model::Known(known),
            Err(_) => Model::Custom(model),
        }
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        Model::from(model.to_string())
    }
}
