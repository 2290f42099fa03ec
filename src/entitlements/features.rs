use std::str::FromStr;

use super::PlanType;

const PLAN_TIERS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureType {
    UnlimitedAccounts,
    UnlimitedShortcuts,
    UnlimitedCollections,
    CustomBranding,
    AdvancedAnalytics,
}

// Columns are indexed by PlanType::tier_index: [FREE, PRO].
const FEATURE_MATRIX: &[(FeatureType, [bool; PLAN_TIERS])] = &[
    (FeatureType::UnlimitedAccounts, [false, true]),
    (FeatureType::UnlimitedShortcuts, [false, true]),
    (FeatureType::UnlimitedCollections, [false, true]),
    (FeatureType::CustomBranding, [false, true]),
    (FeatureType::AdvancedAnalytics, [false, true]),
];

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::UnlimitedAccounts => "unlimited_accounts",
            FeatureType::UnlimitedShortcuts => "unlimited_shortcuts",
            FeatureType::UnlimitedCollections => "unlimited_collections",
            FeatureType::CustomBranding => "custom_branding",
            FeatureType::AdvancedAnalytics => "advanced_analytics",
        }
    }

    pub fn all() -> impl Iterator<Item = FeatureType> {
        FEATURE_MATRIX.iter().map(|(feature, _)| *feature)
    }
}

impl FromStr for FeatureType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureType::all().find(|f| f.as_str() == s).ok_or(())
    }
}

/// Whether `feature` is unlocked on `plan`. Features missing from the matrix are off.
pub fn is_enabled(feature: FeatureType, plan: PlanType) -> bool {
    FEATURE_MATRIX
        .iter()
        .find(|(f, _)| *f == feature)
        .map(|(_, tiers)| tiers[plan.tier_index()])
        .unwrap_or(false)
}
