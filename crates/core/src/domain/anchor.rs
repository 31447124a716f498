use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of individual targets for the trimmed mean.
pub const MIN_TRIMMED_TARGETS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMethod {
    Trimmed,
    Fallback,
    None,
}

impl AnchorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorMethod::Trimmed => "trimmed",
            AnchorMethod::Fallback => "fallback",
            AnchorMethod::None => "none",
        }
    }
}

impl fmt::Display for AnchorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conservative fair-value reference derived from analyst targets.
///
/// `value == 0.0` exactly when `method == AnchorMethod::None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub value: f64,
    pub method: AnchorMethod,
}

impl Anchor {
    pub fn none() -> Self {
        Self {
            value: 0.0,
            method: AnchorMethod::None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.method != AnchorMethod::None
    }
}

/// Analyst price targets for one symbol. `consensus` is only fetched when
/// there are fewer than [`MIN_TRIMMED_TARGETS`] individual targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystTargetSet {
    pub symbol: String,
    pub individual_targets: Vec<f64>,
    pub consensus: Option<f64>,
}

impl AnalystTargetSet {
    pub fn anchor(&self, haircut_rate: f64) -> Anchor {
        calculate_anchor(&self.individual_targets, self.consensus, haircut_rate)
    }

    pub fn target_count(&self) -> usize {
        self.individual_targets.len()
    }
}

/// Trimmed-and-haircut anchor.
///
/// With at least three targets, exactly one minimum and one maximum are
/// dropped (duplicates are not coalesced) and the mean of the rest is
/// discounted. Otherwise the consensus is discounted, if there is one.
pub fn calculate_anchor(targets: &[f64], consensus: Option<f64>, haircut_rate: f64) -> Anchor {
    let keep = 1.0 - haircut_rate;

    if targets.len() >= MIN_TRIMMED_TARGETS {
        let mut sorted = targets.to_vec();
        sorted.sort_by(f64::total_cmp);
        let trimmed = &sorted[1..sorted.len() - 1];
        let mean = trimmed.iter().sum::<f64>() / trimmed.len() as f64;
        return Anchor {
            value: mean * keep,
            method: AnchorMethod::Trimmed,
        };
    }

    match consensus {
        Some(c) => Anchor {
            value: c * keep,
            method: AnchorMethod::Fallback,
        },
        None => Anchor::none(),
    }
}
