//! Combat rules.
//!
//! A fight moves Idle -> Active -> Resolved -> Idle. This module owns the
//! Active sub-state: the enemy roster, the round counter, and attack
//! resolution.
//!
//! Attack resolution:
//! - roll a d20 (advantage keeps the higher of two, disadvantage the lower)
//! - a natural 1 always misses, a natural 20 always hits and is critical
//! - otherwise the attack hits when the roll meets or beats the target's AC
//! - a hit rolls the damage notation (dice doubled on a critical) and takes
//!   it off the target's HP, floored at zero

use crate::dice::{Advantage, DiceComponent, DiceExpression, RollResult};
use crate::error::EngineError;
use crate::npc::Npc;
use crate::world::NpcId;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Hit dice rolled for a creature kind when it joins a fight.
pub fn hit_dice_for(kind: &str) -> &'static str {
    match kind.to_lowercase().as_str() {
        "bat" => "1d4+1",
        "kobold" => "2d6",
        "goblin" => "2d6+1",
        "slime" => "3d6",
        "skeleton" => "2d8+4",
        "bandit" => "2d8+2",
        _ => "2d8",
    }
}

/// One hostile combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    /// Same id as the NPC record it was spawned as.
    pub id: NpcId,
    pub name: String,
    pub kind: String,
    pub hp: i32,
    pub max_hp: i32,
    pub armor_class: u8,
}

impl Enemy {
    /// Roll hit points for `npc` and enter it into the fight.
    pub fn from_npc<R: Rng>(npc: &Npc, rng: &mut R) -> Result<Self, EngineError> {
        let max_hp = DiceExpression::parse(hit_dice_for(&npc.kind))?
            .roll_with_rng(rng)
            .total
            .max(1);
        Ok(Self {
            id: npc.id.clone(),
            name: npc.name.clone(),
            kind: npc.kind.clone(),
            hp: max_hp,
            max_hp,
            armor_class: npc.armor_class,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

/// The Active combat sub-state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    pub active: bool,
    pub round: u32,
    pub enemies: Vec<Enemy>,
}

/// Why a fight left the Active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatEndReason {
    /// Every enemy reached zero HP.
    Victory,
    /// Ended on request while enemies still stood.
    Ended,
}

/// What `combat_status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CombatStatus {
    Idle { message: String },
    Active { combat: CombatState },
}

impl CombatStatus {
    pub fn idle() -> Self {
        CombatStatus::Idle {
            message: "No active combat.".to_string(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, CombatStatus::Active { .. })
    }
}

/// Everything an attack decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub weapon: String,
    pub target_id: NpcId,
    pub target_name: String,
    pub target_ac: u8,
    pub advantage: Advantage,
    pub attack_roll: RollResult,
    pub hit: bool,
    pub critical: bool,
    pub damage_roll: Option<RollResult>,
    pub damage: i32,
    pub target_hp: i32,
    pub target_max_hp: i32,
    pub defeated: bool,
    /// All enemies are down; the fight is over.
    pub resolved: bool,
    pub message: String,
}

/// Whether `attack_roll` hits armor class `ac`.
pub fn attack_hits(attack_roll: &RollResult, ac: u8) -> bool {
    if attack_roll.is_fumble() {
        return false;
    }
    attack_roll.is_critical() || attack_roll.meets(i32::from(ac))
}

fn attack_die() -> DiceExpression {
    DiceExpression {
        components: vec![DiceComponent {
            count: 1,
            sides: 20,
            keep_highest: None,
            keep_lowest: None,
        }],
        modifier: 0,
        original: "1d20".to_string(),
    }
}

impl CombatState {
    /// A fresh fight at round 1.
    pub fn new(enemies: Vec<Enemy>) -> Self {
        Self {
            active: true,
            round: 1,
            enemies,
        }
    }

    /// Reinforcements join the current fight.
    pub fn add_enemies(&mut self, enemies: impl IntoIterator<Item = Enemy>) {
        self.enemies.extend(enemies);
    }

    pub fn alive(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.iter().filter(|e| e.is_alive())
    }

    pub fn all_defeated(&self) -> bool {
        self.enemies.iter().all(|e| !e.is_alive())
    }

    pub fn enemy(&self, id: &NpcId) -> Option<&Enemy> {
        self.enemies.iter().find(|e| &e.id == id)
    }

    /// Drop enemies at zero HP from the roster, returning them.
    pub fn prune_defeated(&mut self) -> Vec<Enemy> {
        let (alive, fallen): (Vec<_>, Vec<_>) =
            self.enemies.drain(..).partition(|e| e.is_alive());
        self.enemies = alive;
        fallen
    }

    /// Index of the enemy to strike: the named one, or the first still
    /// standing.
    pub fn select_target(&self, target: Option<&NpcId>) -> Result<usize, EngineError> {
        match target {
            Some(id) => {
                let idx = self
                    .enemies
                    .iter()
                    .position(|e| &e.id == id)
                    .ok_or_else(|| {
                        EngineError::NotFound(format!("No enemy '{id}' in this fight"))
                    })?;
                if !self.enemies[idx].is_alive() {
                    return Err(EngineError::InvalidArgument(format!(
                        "{} is already down",
                        self.enemies[idx].name
                    )));
                }
                Ok(idx)
            }
            None => self
                .enemies
                .iter()
                .position(Enemy::is_alive)
                .ok_or_else(|| EngineError::InvalidState("No enemies left standing".to_string())),
        }
    }

    /// Roll the attack die and resolve a strike against the target.
    pub fn resolve_attack<R: Rng>(
        &mut self,
        weapon: &str,
        damage: &DiceExpression,
        advantage: Advantage,
        target: Option<&NpcId>,
        rng: &mut R,
    ) -> Result<AttackOutcome, EngineError> {
        if !self.active {
            return Err(EngineError::InvalidState(
                "No active combat. Generate an encounter first.".to_string(),
            ));
        }
        let idx = self.select_target(target)?;
        let attack_roll = attack_die().roll_with_advantage_rng(advantage, rng);
        Ok(self.apply_attack(idx, weapon, advantage, attack_roll, damage, rng))
    }

    /// Apply an already-rolled attack die to the enemy at `idx`.
    pub(crate) fn apply_attack<R: Rng>(
        &mut self,
        idx: usize,
        weapon: &str,
        advantage: Advantage,
        attack_roll: RollResult,
        damage: &DiceExpression,
        rng: &mut R,
    ) -> AttackOutcome {
        let target_ac = self.enemies[idx].armor_class;
        let hit = attack_hits(&attack_roll, target_ac);
        let critical = hit && attack_roll.is_critical();

        let damage_roll = hit.then(|| {
            if critical {
                damage.with_doubled_dice().roll_with_rng(rng)
            } else {
                damage.roll_with_rng(rng)
            }
        });
        let dealt = damage_roll.as_ref().map_or(0, |r| r.total.max(0));

        let enemy = &mut self.enemies[idx];
        enemy.hp = (enemy.hp - dealt).max(0);
        let defeated = hit && !enemy.is_alive();
        let (target_id, target_name, target_hp, target_max_hp) =
            (enemy.id.clone(), enemy.name.clone(), enemy.hp, enemy.max_hp);

        let resolved = self.all_defeated();
        if resolved {
            self.active = false;
        } else {
            self.round += 1;
        }

        let weapon = if weapon.trim().is_empty() {
            "attack".to_string()
        } else {
            weapon.trim().to_string()
        };
        let face = attack_roll.kept_face().unwrap_or_default();
        let mut message = format!(
            "You strike at {target_name} with {weapon}: rolled {face} vs AC {target_ac}"
        );
        match advantage {
            Advantage::Advantage => message.push_str(" (advantage)"),
            Advantage::Disadvantage => message.push_str(" (disadvantage)"),
            Advantage::Normal => {}
        }
        message.push('.');
        match (&damage_roll, critical) {
            (Some(roll), true) => message.push_str(&format!(
                "\nCritical hit! {} damage ({}).",
                dealt,
                roll.dice_display()
            )),
            (Some(roll), false) => {
                message.push_str(&format!("\nHit for {} damage ({}).", dealt, roll.dice_display()))
            }
            (None, _) if attack_roll.is_fumble() => {
                message.push_str("\nNatural 1. The blow goes wide.")
            }
            (None, _) => message.push_str("\nMiss."),
        }
        message.push_str(&format!("\n{target_name} HP {target_hp}/{target_max_hp}."));
        if defeated {
            message.push_str(&format!("\n{target_name} falls."));
        }
        if resolved {
            message.push_str("\nThe battle is won.");
        }

        AttackOutcome {
            weapon,
            target_id,
            target_name,
            target_ac,
            advantage,
            attack_roll,
            hit,
            critical,
            damage_roll,
            damage: dealt,
            target_hp,
            target_max_hp,
            defeated,
            resolved,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ComponentResult;
    use crate::world::humanize;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn enemy(id: &str, hp: i32, ac: u8) -> Enemy {
        Enemy {
            id: NpcId::from(id),
            name: humanize(id),
            kind: "goblin".to_string(),
            hp,
            max_hp: hp,
            armor_class: ac,
        }
    }

    fn d20(face: u32) -> RollResult {
        RollResult {
            notation: "1d20".to_string(),
            component_results: vec![ComponentResult {
                sides: 20,
                rolls: vec![face],
                kept: vec![face],
                subtotal: face,
            }],
            modifier: 0,
            total: face as i32,
            natural_20: face == 20,
            natural_1: face == 1,
        }
    }

    fn two_d6() -> DiceExpression {
        DiceExpression::parse("2d6").unwrap()
    }

    #[test]
    fn test_roll_equal_to_ac_hits() {
        let mut combat = CombatState::new(vec![enemy("gob", 100, 13)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = combat.apply_attack(0, "sword", Advantage::Normal, d20(13), &two_d6(), &mut rng);
        assert!(outcome.hit);
        assert!(!outcome.critical);
        let roll = outcome.damage_roll.unwrap();
        assert_eq!(roll.rolls().len(), 2);
        assert_eq!(outcome.target_hp, 100 - roll.total);
    }

    #[test]
    fn test_roll_below_ac_misses() {
        let mut combat = CombatState::new(vec![enemy("gob", 100, 13)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = combat.apply_attack(0, "sword", Advantage::Normal, d20(12), &two_d6(), &mut rng);
        assert!(!outcome.hit);
        assert!(outcome.damage_roll.is_none());
        assert_eq!(outcome.target_hp, 100);
        assert_eq!(combat.round, 2);
    }

    #[test]
    fn test_natural_20_always_hits_and_doubles_dice() {
        let mut combat = CombatState::new(vec![enemy("gob", 200, 25)]);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let outcome = combat.apply_attack(0, "axe", Advantage::Normal, d20(20), &two_d6(), &mut rng);
        assert!(outcome.hit);
        assert!(outcome.critical);
        let roll = outcome.damage_roll.unwrap();
        let faces = roll.rolls();
        assert_eq!(faces.len(), 4);
        assert!(faces.iter().all(|f| (1..=6).contains(f)));
        assert_eq!(outcome.damage, faces.iter().sum::<u32>() as i32);
        assert_eq!(outcome.target_hp, 200 - outcome.damage);
        assert!(combat.active);
        assert!(outcome.message.contains("Critical hit!"));
    }

    #[test]
    fn test_natural_1_always_misses() {
        let mut combat = CombatState::new(vec![enemy("gob", 10, 1)]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let outcome = combat.apply_attack(0, "dagger", Advantage::Normal, d20(1), &two_d6(), &mut rng);
        assert!(!outcome.hit);
        assert_eq!(outcome.target_hp, 10);
        assert!(outcome.message.contains("Natural 1"));
    }

    #[test]
    fn test_hp_floors_at_zero_and_resolves() {
        let mut combat = CombatState::new(vec![enemy("gob", 1, 10)]);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let damage = DiceExpression::parse("3d6+10").unwrap();
        let outcome = combat.apply_attack(0, "maul", Advantage::Normal, d20(15), &damage, &mut rng);
        assert_eq!(outcome.target_hp, 0);
        assert!(outcome.defeated);
        assert!(outcome.resolved);
        assert!(!combat.active);
        assert_eq!(combat.round, 1);
    }

    #[test]
    fn test_combat_stays_active_while_enemies_stand() {
        let mut combat = CombatState::new(vec![enemy("a", 1, 10), enemy("b", 50, 10)]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let damage = DiceExpression::parse("1d4+5").unwrap();
        let outcome = combat.apply_attack(0, "spear", Advantage::Normal, d20(18), &damage, &mut rng);
        assert!(outcome.defeated);
        assert!(!outcome.resolved);
        assert!(combat.active);
        assert_eq!(combat.select_target(None).unwrap(), 1);
    }

    #[test]
    fn test_select_target() {
        let mut combat = CombatState::new(vec![enemy("a", 0, 10), enemy("b", 5, 10)]);
        assert_eq!(combat.select_target(None).unwrap(), 1);
        assert_eq!(combat.select_target(Some(&NpcId::from("b"))).unwrap(), 1);
        assert!(matches!(
            combat.select_target(Some(&NpcId::from("a"))),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            combat.select_target(Some(&NpcId::from("zzz"))),
            Err(EngineError::NotFound(_))
        ));

        combat.enemies[1].hp = 0;
        assert!(matches!(
            combat.select_target(None),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_prune_defeated() {
        let mut combat = CombatState::new(vec![enemy("a", 0, 10), enemy("b", 5, 10)]);
        let fallen = combat.prune_defeated();
        assert_eq!(fallen.len(), 1);
        assert_eq!(combat.enemies.len(), 1);
        assert_eq!(combat.enemies[0].id, NpcId::from("b"));
    }

    #[test]
    fn test_resolve_attack_requires_active() {
        let mut combat = CombatState::new(vec![enemy("a", 5, 10)]);
        combat.active = false;
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let err = combat
            .resolve_attack("sword", &two_d6(), Advantage::Normal, None, &mut rng)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn test_resolve_attack_with_advantage_rolls_twice() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let mut combat = CombatState::new(vec![enemy("a", 1000, 12)]);
            let outcome = combat
                .resolve_attack("bow", &two_d6(), Advantage::Advantage, None, &mut rng)
                .unwrap();
            let c = &outcome.attack_roll.component_results[0];
            assert_eq!(c.rolls.len(), 2);
            assert_eq!(c.kept[0], c.rolls[0].max(c.rolls[1]));
            assert_eq!(outcome.hit, attack_hits(&outcome.attack_roll, 12));
        }
    }

    #[test]
    fn test_enemy_from_npc_hp() {
        let npc = Npc {
            id: NpcId::from("npc_bat_000001"),
            name: "Bat".to_string(),
            kind: "bat".to_string(),
            armor_class: 12,
            position: crate::world::Position::ORIGIN,
            disposition: crate::world::Disposition::Hostile,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for _ in 0..50 {
            let e = Enemy::from_npc(&npc, &mut rng).unwrap();
            assert!((2..=5).contains(&e.max_hp));
            assert_eq!(e.hp, e.max_hp);
            assert_eq!(e.armor_class, 12);
        }
    }
}
