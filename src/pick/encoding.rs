//! Object index <-> RGB color packing.
//!
//! Index `i` occupies the low 24 bits of a color: `R = (i >> 16) & 0xFF`,
//! `G = (i >> 8) & 0xFF`, `B = i & 0xFF`. Black decodes to [`NO_OBJECT`], which is why
//! object indices start at 1.

use std::fmt;
use std::num::NonZeroU32;

/// Decoded value of a pixel that no object covered.
pub const NO_OBJECT: u32 = 0;

/// Largest index the 24-bit packing can represent.
pub const MAX_OBJECT_INDEX: u32 = (1 << 24) - 1;

/// 8-bit RGB triple carrying an encoded index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl IndexColor {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };

    pub fn from_rgba(rgba: [u8; 4]) -> Self {
        Self {
            r: rgba[0],
            g: rgba[1],
            b: rgba[2],
        }
    }

    /// Vertex-buffer / read-back form with an opaque alpha.
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0xFF]
    }

    /// Normalized form for shader inputs.
    pub fn to_unorm(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

/// Packs the low 24 bits of `index`.
pub fn encode(index: u32) -> IndexColor {
    IndexColor {
        r: ((index >> 16) & 0xFF) as u8,
        g: ((index >> 8) & 0xFF) as u8,
        b: (index & 0xFF) as u8,
    }
}

pub fn decode(color: IndexColor) -> u32 {
    ((color.r as u32) << 16) | ((color.g as u32) << 8) | color.b as u32
}

/// Index of one original object within a consolidation run.
///
/// Always in `1..=MAX_OBJECT_INDEX`, so encoding one can never produce the background color.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct ObjectIndex(NonZeroU32);

impl ObjectIndex {
    pub const FIRST: Self = match NonZeroU32::new(1) {
        Some(value) => Self(value),
        None => unreachable!(),
    };

    pub fn new(value: u32) -> Option<Self> {
        if value > MAX_OBJECT_INDEX {
            return None;
        }
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Following index, or `None` once the 24-bit space is exhausted.
    pub fn next(self) -> Option<Self> {
        Self::new(self.get() + 1)
    }

    pub fn color(self) -> IndexColor {
        encode(self.get())
    }

    /// Decodes a read-back pixel; black and out-of-range values yield `None`.
    pub fn from_color(color: IndexColor) -> Option<Self> {
        Self::new(decode(color))
    }
}

impl From<ObjectIndex> for u32 {
    fn from(index: ObjectIndex) -> Self {
        index.get()
    }
}

impl TryFrom<u32> for ObjectIndex {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("object index {value} outside 1..={MAX_OBJECT_INDEX}"))
    }
}

impl fmt::Display for ObjectIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_over_full_range() {
        for i in 0..=MAX_OBJECT_INDEX {
            assert_eq!(decode(encode(i)), i);
        }
    }

    #[test]
    fn channel_layout() {
        assert_eq!(
            encode(0x12_34_56),
            IndexColor {
                r: 0x12,
                g: 0x34,
                b: 0x56
            }
        );
        assert_eq!(encode(0x01_00_00_01), encode(1));
    }

    #[test]
    fn black_is_no_object() {
        assert_eq!(decode(IndexColor::BLACK), NO_OBJECT);
        assert_eq!(ObjectIndex::from_color(IndexColor::BLACK), None);
    }

    #[test]
    fn object_index_range() {
        assert!(ObjectIndex::new(0).is_none());
        assert!(ObjectIndex::new(MAX_OBJECT_INDEX + 1).is_none());
        let last = ObjectIndex::new(MAX_OBJECT_INDEX).unwrap();
        assert_eq!(last.next(), None);
        assert_eq!(ObjectIndex::FIRST.get(), 1);
        assert_ne!(ObjectIndex::FIRST.color(), IndexColor::BLACK);
    }

    #[test]
    fn unorm_and_rgba_agree() {
        let color = encode(0x00_80_FF);
        let unorm = color.to_unorm();
        assert_eq!(unorm[0], 0.0);
        assert!((unorm[1] - 128.0 / 255.0).abs() < 1e-7);
        assert_eq!(unorm[2], 1.0);
        assert_eq!(IndexColor::from_rgba(color.to_rgba()), color);
    }
}
