use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Quantized,
    Merge,
    Adapter,
    Finetune,
}

impl EdgeType {
    pub fn abbr(self) -> &'static str {
        match self {
            EdgeType::Quantized => "QN",
            EdgeType::Merge => "MR",
            EdgeType::Adapter => "AD",
            EdgeType::Finetune => "FT",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EdgeType::Quantized => "quantized",
            EdgeType::Merge => "merge",
            EdgeType::Adapter => "adapter",
            EdgeType::Finetune => "finetune",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an absent or unrecognised edge label resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum UnlabeledEdges {
    /// Treat as a fine-tune (`FT`).
    #[default]
    Finetune,
    /// Leave untyped; no abbreviation is rendered.
    None,
}

impl UnlabeledEdges {
    pub fn resolve(self, classified: Option<EdgeType>) -> Option<EdgeType> {
        match (classified, self) {
            (Some(t), _) => Some(t),
            (None, UnlabeledEdges::Finetune) => Some(EdgeType::Finetune),
            (None, UnlabeledEdges::None) => None,
        }
    }
}

/// Classifies a free-text edge label. Rules are checked in priority order,
/// so "quant-merge" is quantized. Returns `None` when nothing matches.
pub fn classify(label: Option<&str>) -> Option<EdgeType> {
    let s = label?.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    let stripped: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect();

    if s.contains("quant") || s.contains("gguf") {
        Some(EdgeType::Quantized)
    } else if s.contains("merge") {
        Some(EdgeType::Merge)
    } else if ["adapter", "lora"].iter().any(|k| s.contains(k)) {
        Some(EdgeType::Adapter)
    } else if ["finetune", "fine-tune", "fine tune", "sft"]
        .iter()
        .any(|k| s.contains(k))
        || stripped.contains("finetuned")
        || s == "dpo"
    {
        Some(EdgeType::Finetune)
    } else {
        None
    }
}
