//! Per-tier price table

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::CatalogError;

/// Content tier; every item in a tier costs the same
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[serde(alias = "knowledge")]
    Basic,
    Intervention,
    Proprietary,
    Trajectory,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::Basic,
        Tier::Intervention,
        Tier::Proprietary,
        Tier::Trajectory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Intervention => "intervention",
            Tier::Proprietary => "proprietary",
            Tier::Trajectory => "trajectory",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "knowledge" => Ok(Tier::Basic),
            "intervention" => Ok(Tier::Intervention),
            "proprietary" => Ok(Tier::Proprietary),
            "trajectory" => Ok(Tier::Trajectory),
            other => Err(CatalogError::InvalidPriceSpec(format!("unknown tier '{}'", other))),
        }
    }
}

/// Prices in satoshis, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceTable {
    pub basic: u64,
    pub intervention: u64,
    pub proprietary: u64,
    pub trajectory: u64,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            basic: 50,
            intervention: 75,
            proprietary: 100,
            trajectory: 150,
        }
    }
}

impl PriceTable {
    pub fn price(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Basic => self.basic,
            Tier::Intervention => self.intervention,
            Tier::Proprietary => self.proprietary,
            Tier::Trajectory => self.trajectory,
        }
    }

    fn slot(&mut self, tier: Tier) -> &mut u64 {
        match tier {
            Tier::Basic => &mut self.basic,
            Tier::Intervention => &mut self.intervention,
            Tier::Proprietary => &mut self.proprietary,
            Tier::Trajectory => &mut self.trajectory,
        }
    }

    /// Apply a `tier=price` override, e.g. `basic=60`
    pub fn apply_override(&mut self, spec: &str) -> Result<(), CatalogError> {
        let (tier, price) = spec
            .split_once('=')
            .ok_or_else(|| CatalogError::InvalidPriceSpec(format!("expected tier=price, got '{}'", spec)))?;
        let tier: Tier = tier.parse()?;
        let price: u64 = price
            .trim()
            .parse()
            .map_err(|_| CatalogError::InvalidPriceSpec(format!("invalid price '{}'", price.trim())))?;
        *self.slot(tier) = price;
        Ok(())
    }

    /// Every tier must cost something; a zero price would hand out content for free
    pub fn validate(&self) -> Result<(), CatalogError> {
        for tier in Tier::ALL {
            if self.price(tier) == 0 {
                return Err(CatalogError::InvalidPrice(tier));
            }
        }
        Ok(())
    }
}
