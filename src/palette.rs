use serde::{Deserialize, Serialize};

/// Every material a map cell can hold. Terrain biomes come first, then the
/// decorations the later passes stamp on top of them.
///
/// Rendering treats a cell as an HSV triple: the material supplies hue and
/// saturation, the cell's height supplies the value channel. Each variant
/// maps to a unique (hue, saturation) pair so exported maps stay visually
/// unambiguous, but classification is always enum equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Grass,
    Water,
    Desert,
    Savanna,
    Jungle,
    Mycelium,
    Beach,
    Plant,
    Cactus,
    BrownMushroom,
    RedMushroom,
    House,
    Road,
    Bridge,
}

impl Material {
    /// Palette in declaration order; `m as usize` indexes into this.
    pub const ALL: [Material; 14] = [
        Material::Grass,
        Material::Water,
        Material::Desert,
        Material::Savanna,
        Material::Jungle,
        Material::Mycelium,
        Material::Beach,
        Material::Plant,
        Material::Cactus,
        Material::BrownMushroom,
        Material::RedMushroom,
        Material::House,
        Material::Road,
        Material::Bridge,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Hue in degrees, unique per material.
    pub fn hue(self) -> u16 {
        match self {
            Material::Grass => 133,
            Material::Water => 206,
            Material::Desert => 46,
            Material::Savanna => 75,
            Material::Jungle => 160,
            Material::Mycelium => 267,
            Material::Beach => 62,
            Material::Plant => 100,
            Material::Cactus => 95,
            Material::BrownMushroom => 25,
            Material::RedMushroom => 356,
            Material::House => 0,
            Material::Road => 1,
            Material::Bridge => 17,
        }
    }

    /// Saturation in percent.
    pub fn saturation(self) -> u8 {
        match self {
            Material::Grass => 100,
            Material::Water => 100,
            Material::Desert => 34,
            Material::Savanna => 60,
            Material::Jungle => 79,
            Material::Mycelium => 26,
            Material::Beach => 55,
            Material::Plant => 100,
            Material::Cactus => 85,
            Material::BrownMushroom => 70,
            Material::RedMushroom => 84,
            Material::House => 100,
            Material::Road => 0,
            Material::Bridge => 64,
        }
    }
}

/// Per-material tally for neighbor-majority queries. One counter per palette
/// entry, built fresh on the stack for each query.
#[derive(Debug, Default)]
pub struct MaterialCounts {
    counts: [u32; Material::COUNT],
}

impl MaterialCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, material: Material) {
        self.counts[material as usize] += 1;
    }

    pub fn count(&self, material: Material) -> u32 {
        self.counts[material as usize]
    }

    /// Drop a material from the tally, e.g. to pick a land-only majority.
    pub fn clear(&mut self, material: Material) {
        self.counts[material as usize] = 0;
    }

    /// The material with the highest count; ties resolve to the earliest
    /// palette entry.
    pub fn dominant(&self) -> (Material, u32) {
        let mut best = (Material::ALL[0], self.counts[0]);
        for material in Material::ALL {
            let count = self.counts[material as usize];
            if count > best.1 {
                best = (material, count);
            }
        }
        best
    }
}
