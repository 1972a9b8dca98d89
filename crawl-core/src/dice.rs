//! Dice rolling.
//!
//! Supports `NdM` notation (`dM` implies one die), flat modifiers
//! (`2d6+3`), keep highest/lowest (`4d6kh3`), and single-die
//! advantage/disadvantage rolls.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest number of dice a single component may roll.
pub const MAX_DICE: u32 = 100;

/// Largest die size accepted.
pub const MAX_SIDES: u32 = 1000;

/// Largest flat modifier, in either direction.
pub const MAX_MODIFIER: i32 = 10_000;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation '{0}': use NdM, e.g. '2d20'")]
    InvalidNotation(String),
    #[error("Invalid die size {0}: sides must be between 1 and {MAX_SIDES}")]
    InvalidDieSize(u32),
    #[error("Invalid dice count {0}: count must be between 1 and {MAX_DICE}")]
    InvalidCount(u32),
    #[error("Modifier out of range in '{0}': must be within {MAX_MODIFIER} of zero")]
    ModifierOutOfRange(String),
    #[error("No dice specified")]
    NoDice,
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
    #[error("Advantage uses a single die: use 'd20', not '{0}'")]
    NotSingleDie(String),
}

/// Advantage state for a single-die roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Build from a pair of caller flags. Both set is rejected: the two
    /// modes are mutually exclusive.
    pub fn from_flags(advantage: bool, disadvantage: bool) -> Option<Advantage> {
        match (advantage, disadvantage) {
            (false, false) => Some(Advantage::Normal),
            (true, false) => Some(Advantage::Advantage),
            (false, true) => Some(Advantage::Disadvantage),
            (true, true) => None,
        }
    }

    /// Pick the kept value out of two raw rolls.
    fn keep(self, first: u32, second: u32) -> u32 {
        match self {
            Advantage::Normal => first,
            Advantage::Advantage => first.max(second),
            Advantage::Disadvantage => first.min(second),
        }
    }
}

/// A single die component of a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub sides: u32,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
}

/// A complete dice expression (e.g., 2d6+3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if current.is_empty() && !(components.is_empty() && modifier == 0) {
                        return Err(DiceError::InvalidNotation(notation.clone()));
                    }
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if current.is_empty() {
            // Trailing operator, e.g. "1d6+"
            return Err(DiceError::InvalidNotation(notation));
        }
        Self::parse_component(&current, sign, &mut components, &mut modifier)?;

        if components.is_empty() {
            return Err(DiceError::NoDice);
        }
        let total_dice = components
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(c.count));
        if total_dice > MAX_DICE {
            return Err(DiceError::InvalidCount(total_dice));
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let invalid = || DiceError::InvalidNotation(s.to_string());

        let Some(d_pos) = s.find('d') else {
            let value: i32 = s.parse().map_err(|_| invalid())?;
            let current = *modifier;
            *modifier = value
                .checked_mul(sign)
                .and_then(|v| current.checked_add(v))
                .filter(|m| m.abs() <= MAX_MODIFIER)
                .ok_or_else(|| DiceError::ModifierOutOfRange(s.to_string()))?;
            return Ok(());
        };

        // Negative dice ("-1d4") are not supported.
        if sign < 0 {
            return Err(invalid());
        }

        let count_str = &s[..d_pos];
        let rest = &s[d_pos + 1..];

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str.parse().map_err(|_| invalid())?
        };

        let (sides_str, keep_highest, keep_lowest) = if let Some(kh_pos) = rest.find("kh") {
            let keep: u32 = rest[kh_pos + 2..].parse().map_err(|_| invalid())?;
            (&rest[..kh_pos], Some(keep), None)
        } else if let Some(kl_pos) = rest.find("kl") {
            let keep: u32 = rest[kl_pos + 2..].parse().map_err(|_| invalid())?;
            (&rest[..kl_pos], None, Some(keep))
        } else {
            (rest, None, None)
        };

        let sides: u32 = sides_str.parse().map_err(|_| invalid())?;

        if count == 0 || count > MAX_DICE {
            return Err(DiceError::InvalidCount(count));
        }
        if sides == 0 || sides > MAX_SIDES {
            return Err(DiceError::InvalidDieSize(sides));
        }
        if let Some(keep) = keep_highest.or(keep_lowest) {
            if keep == 0 || keep > count {
                return Err(DiceError::InvalidKeepCount {
                    keep,
                    count,
                    notation: s.to_string(),
                });
            }
        }

        components.push(DiceComponent {
            count,
            sides,
            keep_highest,
            keep_lowest,
        });
        Ok(())
    }

    /// Total number of dice rolled across all components.
    pub fn dice_count(&self) -> u32 {
        self.components.iter().map(|c| c.count).sum()
    }

    /// The same expression with every component's dice count doubled and the
    /// modifier unchanged. Used for critical hit damage.
    pub fn with_doubled_dice(&self) -> DiceExpression {
        let components = self
            .components
            .iter()
            .map(|c| DiceComponent {
                count: c.count * 2,
                sides: c.sides,
                keep_highest: c.keep_highest.map(|k| k * 2),
                keep_lowest: c.keep_lowest.map(|k| k * 2),
            })
            .collect();
        DiceExpression {
            components,
            modifier: self.modifier,
            original: self.original.clone(),
        }
    }

    /// Roll the dice expression and return the result.
    pub fn roll(&self) -> RollResult {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> RollResult {
        let mut component_results = Vec::with_capacity(self.components.len());

        for component in &self.components {
            let rolls: Vec<u32> = (0..component.count)
                .map(|_| rng.gen_range(1..=component.sides))
                .collect();

            let mut kept = rolls.clone();
            if let Some(keep) = component.keep_highest {
                kept.sort_by(|a, b| b.cmp(a));
                kept.truncate(keep as usize);
            } else if let Some(keep) = component.keep_lowest {
                kept.sort();
                kept.truncate(keep as usize);
            }

            let subtotal: u32 = kept.iter().sum();
            component_results.push(ComponentResult {
                sides: component.sides,
                rolls,
                kept,
                subtotal,
            });
        }

        let dice_total: i32 = component_results.iter().map(|c| c.subtotal as i32).sum();
        let natural = natural_d20(&component_results);

        RollResult {
            notation: self.original.clone(),
            component_results,
            modifier: self.modifier,
            total: dice_total + self.modifier,
            natural_20: natural == Some(20),
            natural_1: natural == Some(1),
        }
    }

    /// Roll with advantage/disadvantage. Only a single-die expression is
    /// rolled twice; anything else rolls normally.
    pub fn roll_with_advantage(&self, advantage: Advantage) -> RollResult {
        self.roll_with_advantage_rng(advantage, &mut rand::thread_rng())
    }

    pub fn roll_with_advantage_rng<R: Rng>(
        &self,
        advantage: Advantage,
        rng: &mut R,
    ) -> RollResult {
        let Some(sides) = self.single_die_sides() else {
            return self.roll_with_rng(rng);
        };
        if advantage == Advantage::Normal {
            return self.roll_with_rng(rng);
        }

        let first = rng.gen_range(1..=sides);
        let second = rng.gen_range(1..=sides);
        let chosen = advantage.keep(first, second);

        let component_results = vec![ComponentResult {
            sides,
            rolls: vec![first, second],
            kept: vec![chosen],
            subtotal: chosen,
        }];
        let natural = natural_d20(&component_results);

        RollResult {
            notation: self.original.clone(),
            component_results,
            modifier: self.modifier,
            total: chosen as i32 + self.modifier,
            natural_20: natural == Some(20),
            natural_1: natural == Some(1),
        }
    }

    fn single_die_sides(&self) -> Option<u32> {
        match self.components.as_slice() {
            [c] if c.count == 1 => Some(c.sides),
            _ => None,
        }
    }
}

/// The kept face of a lone d20, if the roll was one.
fn natural_d20(components: &[ComponentResult]) -> Option<u32> {
    match components {
        [c] if c.sides == 20 && c.kept.len() == 1 => c.kept.first().copied(),
        _ => None,
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling a single dice component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub sides: u32,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub subtotal: u32,
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub notation: String,
    pub component_results: Vec<ComponentResult>,
    pub modifier: i32,
    pub total: i32,
    pub natural_20: bool,
    pub natural_1: bool,
}

impl RollResult {
    /// Every raw die face, in roll order.
    pub fn rolls(&self) -> Vec<u32> {
        self.component_results
            .iter()
            .flat_map(|c| c.rolls.iter().copied())
            .collect()
    }

    /// The face kept from a single-die roll (the d20 for attacks).
    pub fn kept_face(&self) -> Option<u32> {
        match self.component_results.as_slice() {
            [c] if c.kept.len() == 1 => c.kept.first().copied(),
            _ => None,
        }
    }

    /// Format the individual dice results for display. Dropped dice are
    /// shown in parentheses.
    pub fn dice_display(&self) -> String {
        let dice_parts: Vec<String> = self
            .component_results
            .iter()
            .map(|c| {
                let mut remaining = c.kept.clone();
                let shown: Vec<String> = c
                    .rolls
                    .iter()
                    .map(|roll| match remaining.iter().position(|k| k == roll) {
                        Some(i) => {
                            remaining.swap_remove(i);
                            roll.to_string()
                        }
                        None => format!("({roll})"),
                    })
                    .collect();
                format!("[{}]", shown.join(", "))
            })
            .collect();

        let dice_str = dice_parts.join(" + ");
        match self.modifier {
            0 => dice_str,
            m if m > 0 => format!("{dice_str} + {m}"),
            m => format!("{dice_str} - {}", m.abs()),
        }
    }

    /// Check if the roll meets or exceeds a target number.
    pub fn meets(&self, target: i32) -> bool {
        self.total >= target
    }

    /// Natural 20 on a lone d20.
    pub fn is_critical(&self) -> bool {
        self.natural_20
    }

    /// Natural 1 on a lone d20.
    pub fn is_fumble(&self) -> bool {
        self.natural_1
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// A single die rolled twice with one face kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvantageRoll {
    pub notation: String,
    pub sides: u32,
    pub advantage: Advantage,
    pub rolls: [u32; 2],
    pub result: u32,
    pub is_critical_success: bool,
    pub is_critical_fail: bool,
    pub message: String,
}

/// Convenience function to roll dice from a notation string.
pub fn roll(notation: &str) -> Result<RollResult, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll())
}

/// Roll a single die (`dM` or `1dM`) twice and keep the higher face.
pub fn roll_with_advantage(notation: &str) -> Result<AdvantageRoll, DiceError> {
    roll_single_twice(notation, Advantage::Advantage, &mut rand::thread_rng())
}

/// Roll a single die (`dM` or `1dM`) twice and keep the lower face.
pub fn roll_with_disadvantage(notation: &str) -> Result<AdvantageRoll, DiceError> {
    roll_single_twice(notation, Advantage::Disadvantage, &mut rand::thread_rng())
}

/// Shared body of the advantage/disadvantage helpers. Modifiers and
/// multi-die notations are rejected; critical flags only apply to a d20.
pub fn roll_single_twice<R: Rng>(
    notation: &str,
    advantage: Advantage,
    rng: &mut R,
) -> Result<AdvantageRoll, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    let sides = match expr.components.as_slice() {
        [c] if c.count == 1
            && c.keep_highest.is_none()
            && c.keep_lowest.is_none()
            && expr.modifier == 0 =>
        {
            c.sides
        }
        _ => return Err(DiceError::NotSingleDie(expr.original)),
    };

    let first = rng.gen_range(1..=sides);
    let second = rng.gen_range(1..=sides);
    let result = match advantage {
        Advantage::Normal => first,
        other => other.keep(first, second),
    };

    let is_critical_success = sides == 20 && result == 20;
    let is_critical_fail = sides == 20 && result == 1;
    let message = if is_critical_success {
        "Critical success"
    } else if is_critical_fail {
        "Critical fail"
    } else {
        ""
    };

    Ok(AdvantageRoll {
        notation: format!("d{sides}"),
        sides,
        advantage,
        rolls: [first, second],
        result,
        is_critical_success,
        is_critical_fail,
        message: message.to_string(),
    })
}
