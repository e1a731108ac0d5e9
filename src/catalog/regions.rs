//! Static mapping of ERP locations to customer-facing regions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ERP locations whose stock is shown in the portal
pub const ALLOWED_WAREHOUSES: [&str; 5] = ["B-CPT", "B-VDB", "S-BFN", "S-CPT", "S-POM"];

/// A warehouse region as customers see it
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Jhb,
    Cpt,
    Bfn,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Jhb, Region::Cpt, Region::Bfn];

    pub fn code(self) -> &'static str {
        match self {
            Region::Jhb => "JHB",
            Region::Cpt => "CPT",
            Region::Bfn => "BFN",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Region::Jhb => "Johannesburg",
            Region::Cpt => "Cape Town",
            Region::Bfn => "Bloemfontein",
        }
    }

    /// ERP locations grouped into this region. The first one is where
    /// quotes for the region are raised.
    pub fn locations(self) -> &'static [&'static str] {
        match self {
            Region::Jhb => &["B-VDB", "S-POM"],
            Region::Cpt => &["B-CPT", "S-CPT"],
            Region::Bfn => &["S-BFN"],
        }
    }

    pub fn primary_location(self) -> &'static str {
        self.locations()[0]
    }

    /// Region for an ERP location code; `None` for locations not shown in the portal
    pub fn for_location(location: &str) -> Option<Region> {
        let location = location.trim();
        Region::ALL
            .into_iter()
            .find(|region| region.locations().contains(&location))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|region| region.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown region: {}", s))
    }
}
