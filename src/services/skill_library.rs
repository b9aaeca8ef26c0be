//! Built-in skill catalog.
//!
//! Skills are declarative records loaded once at startup; the engine
//! interprets them. Keep the bodies short: navigation to the standing
//! tile is the executor's job, so most farming skills are just
//! face-then-act.

use std::collections::HashMap;

use crate::domain::models::action::PrimitiveAction;
use crate::domain::models::locations::SEED_SHOP;
use crate::domain::models::skill::{
    FailureKind, Precondition, PrimitiveTemplate, RecoveryHint, SkillCategory, SkillDef,
    SuccessCriterion, ToolKind,
};

/// Process-wide, immutable skill catalog.
#[derive(Debug, Clone)]
pub struct SkillLibrary {
    skills: HashMap<String, SkillDef>,
}

impl SkillLibrary {
    /// The built-in catalog.
    pub fn builtin() -> Self {
        let mut skills = HashMap::new();
        for skill in builtin_skills() {
            skills.insert(skill.name.clone(), skill);
        }
        Self { skills }
    }

    /// Look up a skill by name.
    pub fn get(&self, name: &str) -> Option<&SkillDef> {
        self.skills.get(name)
    }

    /// Whether a name is a known skill.
    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    /// All skill names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.skills.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for SkillLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_skills() -> Vec<SkillDef> {
    vec![
        SkillDef {
            name: "till_soil".to_string(),
            category: SkillCategory::Farming,
            preconditions: vec![
                Precondition::ToolPresent {
                    tool: ToolKind::Hoe,
                },
                Precondition::AdjacentToTarget,
            ],
            required_tool: Some(ToolKind::Hoe),
            actions: vec![
                PrimitiveTemplate::FaceTarget,
                PrimitiveTemplate::UseToolOnTarget,
            ],
            success: vec![SuccessCriterion::Tilled],
            on_failure: vec![
                (FailureKind::Blocked, RecoveryHint::ClearObstacle),
                (FailureKind::Phantom, RecoveryHint::SkipTarget),
            ],
        },
        SkillDef {
            name: "water_crop".to_string(),
            category: SkillCategory::Farming,
            preconditions: vec![
                Precondition::ToolPresent {
                    tool: ToolKind::WateringCan,
                },
                Precondition::WaterInCan { min: 1 },
                Precondition::AdjacentToTarget,
            ],
            required_tool: Some(ToolKind::WateringCan),
            actions: vec![
                PrimitiveTemplate::FaceTarget,
                PrimitiveTemplate::UseToolOnTarget,
            ],
            success: vec![SuccessCriterion::Watered],
            on_failure: vec![
                (FailureKind::Blocked, RecoveryHint::RefillWater),
                (FailureKind::Phantom, RecoveryHint::SkipTarget),
            ],
        },
        SkillDef {
            name: "plant_seed".to_string(),
            category: SkillCategory::Farming,
            preconditions: vec![Precondition::SeedsPresent, Precondition::AdjacentToTarget],
            required_tool: None,
            actions: vec![
                PrimitiveTemplate::SelectContextItem,
                PrimitiveTemplate::FaceTarget,
                PrimitiveTemplate::PlaceOnTarget,
            ],
            success: vec![SuccessCriterion::Planted],
            on_failure: vec![(FailureKind::Phantom, RecoveryHint::SkipTarget)],
        },
        SkillDef {
            name: "harvest_crop".to_string(),
            category: SkillCategory::Farming,
            preconditions: vec![Precondition::AdjacentToTarget],
            required_tool: None,
            actions: vec![PrimitiveTemplate::HarvestTarget],
            success: vec![SuccessCriterion::Harvested],
            on_failure: vec![(FailureKind::Phantom, RecoveryHint::SkipTarget)],
        },
        // required_tool is resolved per-blocker by the caller via the
        // context override
        SkillDef {
            name: "clear_debris".to_string(),
            category: SkillCategory::Farming,
            preconditions: vec![Precondition::AdjacentToTarget],
            required_tool: None,
            actions: vec![
                PrimitiveTemplate::FaceTarget,
                PrimitiveTemplate::UseToolOnTarget,
            ],
            success: vec![SuccessCriterion::Cleared],
            on_failure: vec![(FailureKind::Phantom, RecoveryHint::SkipTarget)],
        },
        SkillDef {
            name: "refill_watering_can".to_string(),
            category: SkillCategory::Maintenance,
            preconditions: vec![
                Precondition::ToolPresent {
                    tool: ToolKind::WateringCan,
                },
                Precondition::AdjacentToTarget,
            ],
            required_tool: Some(ToolKind::WateringCan),
            actions: vec![
                PrimitiveTemplate::FaceTarget,
                PrimitiveTemplate::UseToolOnTarget,
            ],
            success: vec![SuccessCriterion::CanRefilled],
            on_failure: vec![(FailureKind::Phantom, RecoveryHint::SkipTarget)],
        },
        SkillDef {
            name: "ship_item".to_string(),
            category: SkillCategory::Commerce,
            preconditions: vec![Precondition::ShippablePresent],
            required_tool: None,
            actions: vec![PrimitiveTemplate::ShipContextSlot],
            success: vec![SuccessCriterion::ContextItemDelta { delta: -1 }],
            on_failure: vec![(FailureKind::Phantom, RecoveryHint::SkipTarget)],
        },
        SkillDef {
            name: "buy_seeds".to_string(),
            category: SkillCategory::Commerce,
            preconditions: vec![
                Precondition::InLocation {
                    location: SEED_SHOP.to_string(),
                },
                Precondition::ShopOpen {
                    location: SEED_SHOP.to_string(),
                },
            ],
            required_tool: None,
            actions: vec![
                PrimitiveTemplate::BuyContextItem,
                PrimitiveTemplate::Fixed {
                    action: PrimitiveAction::DismissMenu,
                },
            ],
            success: vec![SuccessCriterion::ContextItemDelta { delta: 1 }],
            on_failure: vec![],
        },
        SkillDef {
            name: "warp_to".to_string(),
            category: SkillCategory::Movement,
            preconditions: vec![],
            required_tool: None,
            actions: vec![PrimitiveTemplate::WarpToContext],
            success: vec![SuccessCriterion::ContextLocation],
            on_failure: vec![],
        },
        SkillDef {
            name: "go_to_bed".to_string(),
            category: SkillCategory::Maintenance,
            preconditions: vec![],
            required_tool: None,
            actions: vec![PrimitiveTemplate::Fixed {
                action: PrimitiveAction::GoToBed,
            }],
            success: vec![],
            on_failure: vec![],
        },
        SkillDef {
            name: "eat_food".to_string(),
            category: SkillCategory::Maintenance,
            preconditions: vec![Precondition::ItemPresent],
            required_tool: None,
            actions: vec![PrimitiveTemplate::EatContextSlot],
            success: vec![SuccessCriterion::ContextItemDelta { delta: -1 }],
            on_failure: vec![],
        },
        SkillDef {
            name: "dismiss_menu".to_string(),
            category: SkillCategory::Maintenance,
            preconditions: vec![],
            required_tool: None,
            actions: vec![PrimitiveTemplate::Fixed {
                action: PrimitiveAction::DismissMenu,
            }],
            success: vec![SuccessCriterion::MenuClosed],
            on_failure: vec![],
        },
        SkillDef {
            name: "attack".to_string(),
            category: SkillCategory::Combat,
            preconditions: vec![Precondition::ToolPresent {
                tool: ToolKind::Weapon,
            }],
            required_tool: Some(ToolKind::Weapon),
            actions: vec![PrimitiveTemplate::SwingAtTarget],
            success: vec![],
            on_failure: vec![],
        },
        SkillDef {
            name: "use_ladder".to_string(),
            category: SkillCategory::Combat,
            preconditions: vec![],
            required_tool: None,
            actions: vec![PrimitiveTemplate::Fixed {
                action: PrimitiveAction::UseLadder,
            }],
            success: vec![],
            on_failure: vec![],
        },
        SkillDef {
            name: "store_item".to_string(),
            category: SkillCategory::Inventory,
            preconditions: vec![Precondition::AdjacentToTarget],
            required_tool: None,
            actions: vec![
                PrimitiveTemplate::OpenChestToward,
                PrimitiveTemplate::DepositContextSlot,
                PrimitiveTemplate::Fixed {
                    action: PrimitiveAction::DismissMenu,
                },
            ],
            success: vec![SuccessCriterion::ContextItemDelta { delta: -1 }],
            on_failure: vec![],
        },
    ]
}
