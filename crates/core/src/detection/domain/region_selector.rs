use std::fmt;
use std::str::FromStr;

use crate::shared::region::Region;

/// Which detected face, if any, the capture loop crops to before display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CropPolicy {
    /// Always render the full frame.
    Off,
    /// The first rectangle in detector order.
    #[default]
    First,
    /// The rectangle with the greatest area; earlier rectangles win ties.
    Largest,
}

impl CropPolicy {
    pub fn select(self, regions: &[Region]) -> Option<Region> {
        match self {
            CropPolicy::Off => None,
            CropPolicy::First => regions.first().copied(),
            CropPolicy::Largest => regions
                .iter()
                .copied()
                .reduce(|best, r| if r.area() > best.area() { r } else { best }),
        }
    }
}

impl FromStr for CropPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(CropPolicy::Off),
            "first" => Ok(CropPolicy::First),
            "largest" => Ok(CropPolicy::Largest),
            other => Err(format!(
                "Crop policy must be one of: off, first, largest, got '{other}'"
            )),
        }
    }
}

impl fmt::Display for CropPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CropPolicy::Off => "off",
            CropPolicy::First => "first",
            CropPolicy::Largest => "largest",
        };
        f.write_str(name)
    }
}
