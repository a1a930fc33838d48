//! Block identifiers and the static block registry.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Unique identifier for a block type.
///
/// Block ID 0 is reserved for air (empty space). Stored as one byte per
/// voxel, both in memory and in save files.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct BlockId(pub u8);

impl BlockId {
    /// Air block (empty space)
    pub const AIR: Self = Self(0);
    pub const GRASS: Self = Self(1);
    pub const DIRT: Self = Self(2);
    pub const STONE: Self = Self(3);
    pub const SAND: Self = Self(4);
    /// Water block (not solid, transparent)
    pub const WATER: Self = Self(5);
    pub const COAL_ORE: Self = Self(6);
    pub const IRON_ORE: Self = Self(7);
    pub const GOLD_ORE: Self = Self(8);
    pub const DIAMOND_ORE: Self = Self(9);
    /// Tree trunk
    pub const WOOD: Self = Self(10);
    pub const PLANKS: Self = Self(11);
    pub const GLASS: Self = Self(12);
    pub const BRICK: Self = Self(13);
    pub const COBBLESTONE: Self = Self(14);
    pub const LEAVES: Self = Self(15);
    pub const SNOW: Self = Self(16);
    pub const ICE: Self = Self(17);
    pub const GRAVEL: Self = Self(18);
    /// Bottom layer of every column
    pub const BEDROCK: Self = Self(19);
    pub const LAVA: Self = Self(20);

    /// Number of registered block types.
    pub const COUNT: usize = 21;

    /// Returns true if this block is air (empty)
    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }

    /// Registry entry for this block. Unknown ids resolve to air.
    #[inline]
    pub fn info(self) -> &'static BlockInfo {
        lookup(self)
    }

    /// Returns true if this block blocks movement and ray picks
    #[inline]
    pub fn is_solid(self) -> bool {
        self.info().is_solid
    }

    /// Returns true if faces behind this block stay visible
    #[inline]
    pub fn is_transparent(self) -> bool {
        self.info().is_transparent
    }

    /// Find a block by its registry name.
    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .position(|info| info.name == name)
            .map(|index| Self(index as u8))
    }
}

/// Static properties of a block type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockInfo {
    /// Registry name (lowercase, snake case)
    pub name: &'static str,
    /// Base color (RGB, 0.0-1.0)
    pub color: [f32; 3],
    /// Blocks movement and ray picks
    pub is_solid: bool,
    /// Does not hide the faces of adjacent blocks
    pub is_transparent: bool,
}

impl BlockInfo {
    const fn opaque(name: &'static str, color: [f32; 3]) -> Self {
        Self {
            name,
            color,
            is_solid: true,
            is_transparent: false,
        }
    }

    const fn see_through(name: &'static str, color: [f32; 3], is_solid: bool) -> Self {
        Self {
            name,
            color,
            is_solid,
            is_transparent: true,
        }
    }
}

/// Block registry, indexed by `BlockId`.
pub static REGISTRY: [BlockInfo; BlockId::COUNT] = [
    BlockInfo::see_through("air", [0.0, 0.0, 0.0], false),
    BlockInfo::opaque("grass", [0.4, 0.8, 0.2]),
    BlockInfo::opaque("dirt", [0.6, 0.4, 0.2]),
    BlockInfo::opaque("stone", [0.5, 0.5, 0.5]),
    BlockInfo::opaque("sand", [0.9, 0.9, 0.6]),
    BlockInfo::see_through("water", [0.2, 0.4, 0.8], false),
    BlockInfo::opaque("coal_ore", [0.2, 0.2, 0.2]),
    BlockInfo::opaque("iron_ore", [0.7, 0.5, 0.4]),
    BlockInfo::opaque("gold_ore", [0.9, 0.8, 0.2]),
    BlockInfo::opaque("diamond_ore", [0.3, 0.8, 0.9]),
    BlockInfo::opaque("wood", [0.6, 0.4, 0.2]),
    BlockInfo::opaque("planks", [0.8, 0.6, 0.3]),
    BlockInfo::see_through("glass", [0.8, 0.9, 1.0], true),
    BlockInfo::opaque("brick", [0.7, 0.3, 0.2]),
    BlockInfo::opaque("cobblestone", [0.6, 0.6, 0.6]),
    BlockInfo::see_through("leaves", [0.2, 0.6, 0.2], true),
    BlockInfo::opaque("snow", [0.95, 0.95, 1.0]),
    BlockInfo::see_through("ice", [0.7, 0.85, 1.0], true),
    BlockInfo::opaque("gravel", [0.5, 0.5, 0.5]),
    BlockInfo::opaque("bedrock", [0.2, 0.2, 0.2]),
    BlockInfo::see_through("lava", [1.0, 0.3, 0.0], false),
];

/// Look up a block's registry entry. Unknown ids resolve to air.
#[inline]
pub fn lookup(id: BlockId) -> &'static BlockInfo {
    REGISTRY.get(usize::from(id.0)).unwrap_or(&REGISTRY[0])
}
