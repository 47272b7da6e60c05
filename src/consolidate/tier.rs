use std::fmt;

/// Upper bound (exclusive) of the `Tiny` tier, in world units of box diagonal.
pub const TINY_CUTOFF: f32 = 0.025;
/// Upper bound (exclusive) of the `Small` tier.
pub const SMALL_CUTOFF: f32 = 0.05;

/// Size class of an original mesh, by bounding-box diagonal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SizeTier {
    Tiny,
    Small,
    Large,
}

impl SizeTier {
    /// Processing order during consolidation.
    pub const ALL: [SizeTier; 3] = [SizeTier::Tiny, SizeTier::Small, SizeTier::Large];

    /// NaN fails both comparisons and lands in `Large`.
    pub fn classify(size: f32) -> Self {
        if size < TINY_CUTOFF {
            Self::Tiny
        } else if size < SMALL_CUTOFF {
            Self::Small
        } else {
            Self::Large
        }
    }

    pub fn slot(self) -> usize {
        match self {
            Self::Tiny => 0,
            Self::Small => 1,
            Self::Large => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Small => "small",
            Self::Large => "large",
        }
    }

    /// Saturation and lightness of the display tint. Tiny fragments are washed out.
    pub fn tint_saturation_lightness(self) -> (f32, f32) {
        match self {
            Self::Tiny => (0.15, 0.55),
            Self::Small => (0.35, 0.6),
            Self::Large => (0.55, 0.65),
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}
