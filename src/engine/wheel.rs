//! The weighted selection wheel.
//!
//! The winner is committed by a random draw *before* the spin animation starts;
//! the animation's target angle is then derived from the committed winner. That
//! ordering keeps the visual outcome consistent with the draw and opens a
//! fixed-length animation window in which slow generation work can run.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::state::game::WheelSlice;

/// Fixed duration of the spin animation window.
pub const SPIN_DURATION: Duration = Duration::from_secs(9);

/// Full rotations added to the target angle, lower bound.
const MIN_FULL_TURNS: u32 = 5;
/// Full rotations added to the target angle, upper bound.
const MAX_FULL_TURNS: u32 = 7;

/// Committed draw plus the animation angle derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelDraw {
    /// Index of the winning slice.
    pub winner_index: usize,
    /// The winning slice itself.
    pub winner: WheelSlice,
    /// Target rotation in degrees (winner mid-angle plus full turns).
    pub rotation: f32,
}

/// Weighted-random selection wheel with a seedable generator.
#[derive(Debug)]
pub struct SelectionWheel {
    rng: StdRng,
}

impl SelectionWheel {
    /// Wheel seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministically seeded wheel for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Commit to a winner and compute the animation target in one step.
    ///
    /// Returns `None` for an empty slice set; the caller skips the wheel and
    /// falls back to a default label.
    pub fn draw(&mut self, slices: &[WheelSlice]) -> Option<WheelDraw> {
        let winner_index = self.commit_winner(slices)?;
        let rotation = self.target_rotation(winner_index, slices.len());
        Some(WheelDraw {
            winner_index,
            winner: slices[winner_index].clone(),
            rotation,
        })
    }

    /// Cumulative-weight random draw over the slices.
    ///
    /// Draws `r` in `[0, Σweight)` and walks the slices subtracting weights;
    /// the last slice backstops floating-point edge cases. A single slice wins
    /// with probability 1.
    pub fn commit_winner(&mut self, slices: &[WheelSlice]) -> Option<usize> {
        if slices.is_empty() {
            return None;
        }
        if slices.len() == 1 {
            return Some(0);
        }

        let total: f32 = slices.iter().map(|slice| slice.weight.max(0.0)).sum();
        if total <= 0.0 {
            // Degenerate weights; fall back to a uniform pick.
            return Some(self.rng.random_range(0..slices.len()));
        }

        let mut remainder = self.rng.random_range(0.0..total);
        for (index, slice) in slices.iter().enumerate() {
            remainder -= slice.weight.max(0.0);
            if remainder <= 0.0 {
                return Some(index);
            }
        }
        Some(slices.len() - 1)
    }

    /// Target rotation for the winning slice: its mid-angle plus 5 to 7 full
    /// turns for visual variety.
    pub fn target_rotation(&mut self, winner_index: usize, slice_count: usize) -> f32 {
        let arc = 360.0 / slice_count.max(1) as f32;
        let mid_angle = winner_index as f32 * arc + arc / 2.0;
        let turns = self.rng.random_range(MIN_FULL_TURNS..=MAX_FULL_TURNS);
        turns as f32 * 360.0 + mid_angle
    }
}

impl Default for SelectionWheel {
    fn default() -> Self {
        Self::new()
    }
}
