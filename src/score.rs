use crate::types::display::Bias;

/// Map a raw score onto the five display buckets relative to `scale`.
///
/// `t = (score - min) / (max - min)` is bucketed at fixed thresholds,
/// inclusive on their upper bound, evaluated in ascending order with the
/// first match winning. A zero-width scale would divide by zero; it falls
/// back to the neutral bucket `0`.
pub fn normalize_score(score: f64, scale: [f64; 2]) -> i8 {
    let [min, max] = scale;
    if max == min {
        return 0;
    }
    let t = (score - min) / (max - min);
    if t <= 0.1 {
        -2
    } else if t <= 0.3 {
        -1
    } else if t <= 0.7 {
        0
    } else if t <= 0.9 {
        1
    } else {
        2
    }
}

/// Classify a total score into the five bias levels.
///
/// Thresholds are absolute, fixed by the scoring convention around the
/// [-24, 24] total range; they are never derived from a response's own
/// scale field.
pub fn classify_bias(total: f64) -> Bias {
    if total >= 15.0 {
        Bias::VeryBullish
    } else if total >= 8.0 {
        Bias::Bullish
    } else if total >= -7.0 {
        Bias::Neutral
    } else if total >= -15.0 {
        Bias::Bearish
    } else {
        Bias::VeryBearish
    }
}
