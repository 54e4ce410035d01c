use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered steps of the OCR + indexing pipeline.
///
/// The discriminant is the stage's position in [`Stage::ALL`], so ordering
/// between stages is the pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Uploading = 0,
    Preprocessing = 1,
    Ocr = 2,
    PdfGeneration = 3,
    Embedding = 4,
    Done = 5,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Uploading,
        Stage::Preprocessing,
        Stage::Ocr,
        Stage::PdfGeneration,
        Stage::Embedding,
        Stage::Done,
    ];

    /// The last stage the local simulation may reach on its own.
    pub const LAST_SIMULATED: Stage = Stage::Embedding;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Stage> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Uploading => "Uploading",
            Stage::Preprocessing => "Preprocessing",
            Stage::Ocr => "OCR",
            Stage::PdfGeneration => "PDF Generation",
            Stage::Embedding => "Embedding",
            Stage::Done => "Done",
        }
    }

    /// Looks up a step name as reported by the pipeline.
    ///
    /// Matching ignores case, whitespace, `_` and `-`, so both
    /// `"PDF Generation"` and `"PdfGeneration"` resolve to the same stage.
    pub fn from_step_name(name: &str) -> Option<Stage> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|stage| normalize(stage.label()) == wanted)
    }

    pub fn next(self) -> Option<Stage> {
        Self::from_index(self.index() + 1)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
