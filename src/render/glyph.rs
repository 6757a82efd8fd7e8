//! Step glyphs and the proportional route bar

use crate::models::RouteStep;

/// Fill characters shared by all runs of one bar
pub const BAR_BUDGET: usize = 25;
pub const BAR_FILL: &str = "─";
pub const BAR_START: &str = "📍";
pub const BAR_END: &str = "─🏁";
/// Bar used when the route has no measurable distance
pub const BAR_PLACEHOLDER: &str = "📍────🏁";

const DEFAULT_GLYPH: &str = "🔹";

/// Keyword table, first match wins
const GLYPHS: &[(&[&str], &str)] = &[
    (&["起点", "出发"], "📍"),
    (&["左转"], "↩️"),
    (&["右转"], "↪️"),
    (&["直行"], "⬆️"),
    (&["隧道"], "🚇"),
    (&["环岛"], "🔄"),
    (&["掉头"], "🔃"),
    (&["地铁", "轨道交通"], "🚇"),
    (&["公交"], "🚌"),
    (&["到达", "终点"], "🏁"),
];

/// Glyph for a step instruction
#[must_use]
pub fn step_glyph(instruction: &str) -> &'static str {
    GLYPHS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| instruction.contains(k)))
        .map_or(DEFAULT_GLYPH, |(_, glyph)| glyph)
}

/// Single-line bar whose runs are proportional to each step's share of the distance
///
/// Every step but the last gets `floor(share * BAR_BUDGET)` fill characters, at least
/// one when its distance is non-zero, followed by its glyph. When the minimum pushes
/// the total past the budget, the longest runs give characters back.
#[must_use]
pub fn visual_bar(steps: &[RouteStep]) -> String {
    let total: u64 = steps.iter().map(|s| u64::from(s.distance_meters)).sum();
    if total == 0 {
        return BAR_PLACEHOLDER.to_string();
    }

    let leading = &steps[..steps.len() - 1];
    let runs = allocate_runs(leading, total);

    let mut bar = String::from(BAR_START);
    for (step, run) in leading.iter().zip(runs) {
        bar.push_str(&BAR_FILL.repeat(run));
        bar.push_str(step_glyph(&step.instruction));
    }
    bar.push_str(BAR_END);
    bar
}

fn allocate_runs(steps: &[RouteStep], total: u64) -> Vec<usize> {
    let mut runs: Vec<usize> = steps
        .iter()
        .map(|s| {
            let ratio = s.distance_meters as f64 / total as f64;
            let run = (ratio * BAR_BUDGET as f64).floor() as usize;
            if run == 0 && s.distance_meters > 0 { 1 } else { run }
        })
        .collect();

    let mut overflow = runs.iter().sum::<usize>().saturating_sub(BAR_BUDGET);
    while overflow > 0 {
        let Some(longest) = runs
            .iter_mut()
            .filter(|r| **r > 1)
            .max_by_key(|r| **r)
        else {
            break;
        };
        *longest -= 1;
        overflow -= 1;
    }
    runs
}
