//! Bounded numeric value objects accepted by the backend

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Number of NPCs a new game starts with (2..=6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct NpcCount(u8);

impl NpcCount {
    pub const MIN: u8 = 2;
    pub const MAX: u8 = 6;

    pub fn new(count: u8) -> Result<Self, DomainError> {
        if !(Self::MIN..=Self::MAX).contains(&count) {
            return Err(DomainError::validation(format!(
                "NPC count must be between {} and {}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(count))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for NpcCount {
    fn default() -> Self {
        Self(4)
    }
}

impl TryFrom<u8> for NpcCount {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NpcCount> for u8 {
    fn from(count: NpcCount) -> u8 {
        count.0
    }
}

/// Fear points spent to create a rule (50..=1000)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RuleCost(u32);

impl RuleCost {
    pub const MIN: u32 = 50;
    pub const MAX: u32 = 1000;

    pub fn new(cost: u32) -> Result<Self, DomainError> {
        if !(Self::MIN..=Self::MAX).contains(&cost) {
            return Err(DomainError::validation(format!(
                "Rule cost must be between {} and {}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(cost))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Whether the director can pay for this rule.
    pub fn affordable_with(&self, fear_points: i64) -> bool {
        fear_points >= i64::from(self.0)
    }
}

impl TryFrom<u32> for RuleCost {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RuleCost> for u32 {
    fn from(cost: RuleCost) -> u32 {
        cost.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npc_count_bounds() {
        assert!(NpcCount::new(1).is_err());
        assert_eq!(NpcCount::new(2).map(|c| c.get()), Ok(2));
        assert_eq!(NpcCount::new(6).map(|c| c.get()), Ok(6));
        assert!(NpcCount::new(7).is_err());
        assert_eq!(NpcCount::default().get(), 4);
    }

    #[test]
    fn npc_count_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<NpcCount>("9").is_err());
        assert_eq!(
            serde_json::from_str::<NpcCount>("3").map(|c| c.get()).ok(),
            Some(3)
        );
    }

    #[test]
    fn rule_cost_bounds_and_affordability() {
        assert!(RuleCost::new(49).is_err());
        assert!(RuleCost::new(1001).is_err());

        let cost = RuleCost::new(150).expect("valid");
        assert!(cost.affordable_with(150));
        assert!(!cost.affordable_with(149));
    }
}
