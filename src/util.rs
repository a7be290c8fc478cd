use std::collections::hash_map::DefaultHasher;
use std::f32::consts::TAU;
use std::hash::{Hash, Hasher};

use eframe::egui::{Vec2, vec2};

/// Radius of the ring new neighbours are placed on around their parent.
pub const CHILD_ORBIT: f32 = 50.0;

/// Deterministic pair in `[-1, 1]` derived from an id.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

/// Slot `index` of `count` evenly spaced points on a ring around `center`.
pub fn orbit_position(center: Vec2, index: usize, count: usize, radius: f32) -> Vec2 {
    let count = count.max(1) as f32;
    let angle = (TAU * index as f32 - std::f32::consts::FRAC_PI_6) / count;
    center + vec2(angle.cos(), angle.sin()) * radius
}

/// Seed placement: a ring sized to the seed count, jittered per id so that
/// coincident seeds never start on the same point.
pub fn seed_position(center: Vec2, id: &str, index: usize, count: usize) -> Vec2 {
    if count <= 1 {
        return center;
    }
    let radius = (count as f32).sqrt() * 60.0;
    let (jx, jy) = stable_pair(id);
    orbit_position(center, index, count, radius) + vec2(jx, jy) * 8.0
}

pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut shortened = text
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}
