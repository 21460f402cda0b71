use log::debug;

use crate::config::*;

/// Scales the raw scores so that they sum to the target.
///
/// Each value is scaled proportionally and rounded on its own. The rounding drift
/// (`target - sum`) is then added entirely to the largest value (ties: first in
/// vertex order). The output always sums to `target`, but it may leave the score
/// range: see [normalize_in_range] for the variant used by the scoring pipeline.
pub fn normalize_to_target(raw: &[i32; 3], target: i32) -> Result<ScoreTriple, ScoringError> {
    let mut scaled = scale(raw, target)?;
    let drift = target - scaled.iter().sum::<i32>();
    if drift != 0 {
        let max_idx = largest_first(&scaled)[0];
        scaled[max_idx] += drift;
    }
    Ok(ScoreTriple(scaled))
}

/// Scales the raw scores so that they sum to the target, staying within the range of
/// the rules.
///
/// Scaled values are first clamped into the range. The drift goes to the largest
/// value; the part of it that would push this value out of the range is carried to
/// the next largest value, and so on. When no value leaves the range, the result is
/// the same as [normalize_to_target].
pub fn normalize_in_range(
    raw: &[i32; 3],
    rules: &ScoringRules,
) -> Result<ScoreTriple, ScoringError> {
    let unreachable = ScoringError::UnreachableTarget {
        target: rules.target_total,
        min: rules.min_score,
        max: rules.max_score,
    };
    if rules.min_score > rules.max_score || !rules.target_is_reachable() {
        return Err(unreachable);
    }

    let mut scaled = scale(raw, rules.target_total)?;
    for v in scaled.iter_mut() {
        *v = (*v).clamp(rules.min_score, rules.max_score);
    }
    // Sums of three scores may not fit in an i32.
    let (min, max) = (rules.min_score as i64, rules.max_score as i64);
    let mut drift = rules.target_total as i64 - scaled.iter().map(|v| *v as i64).sum::<i64>();
    for idx in largest_first(&scaled) {
        if drift == 0 {
            break;
        }
        let adjusted = (scaled[idx] as i64 + drift).clamp(min, max);
        drift -= adjusted - scaled[idx] as i64;
        scaled[idx] = adjusted as i32;
    }
    debug!(
        "normalize_in_range: raw: {:?} normalized: {:?} remaining drift: {:?}",
        raw, scaled, drift
    );
    if drift != 0 {
        return Err(unreachable);
    }
    Ok(ScoreTriple(scaled))
}

fn scale(raw: &[i32; 3], target: i32) -> Result<[i32; 3], ScoringError> {
    let total: i64 = raw.iter().map(|v| *v as i64).sum();
    if total <= 0 || raw.iter().any(|v| *v < 0) {
        return Err(ScoringError::DegenerateScores(*raw));
    }
    let mut res = [0; 3];
    for (idx, v) in raw.iter().enumerate() {
        res[idx] = ((*v as f64) * (target as f64) / (total as f64)).round() as i32;
    }
    Ok(res)
}

// Indexes sorted by decreasing value. The sort is stable, so ties keep the vertex order.
fn largest_first(values: &[i32; 3]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*b].cmp(&values[*a]));
    order
}
