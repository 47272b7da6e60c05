use crate::pick::encoding::ObjectIndex;
use crate::scene::ObjectId;

use super::tier::SizeTier;

/// What a pick resolves to: the original object behind an encoded index.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectInfo {
    pub index: ObjectIndex,
    pub original_id: ObjectId,
    pub name: String,
    pub tier: SizeTier,
    pub bounding_center: [f32; 3],
    pub bounding_size: f32,
}

/// Dense index -> object table. Entry `i` holds object index `i + 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupTable {
    entries: Vec<ObjectInfo>,
}

impl LookupTable {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Appends the entry for the next index; indices must arrive in order.
    pub(crate) fn push(&mut self, info: ObjectInfo) {
        debug_assert_eq!(info.index.get() as usize, self.entries.len() + 1);
        self.entries.push(info);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: ObjectIndex) -> Option<&ObjectInfo> {
        self.entries.get(index.get() as usize - 1)
    }

    /// Looks up a raw decoded value; 0 and unknown values resolve to nothing.
    pub fn resolve(&self, raw: u32) -> Option<&ObjectInfo> {
        ObjectIndex::new(raw).and_then(|index| self.get(index))
    }

    pub fn find_by_id(&self, id: &ObjectId) -> Option<&ObjectInfo> {
        self.entries.iter().find(|info| &info.original_id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectInfo> {
        self.entries.iter()
    }
}
