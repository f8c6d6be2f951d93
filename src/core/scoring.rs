/// Logistic midpoint, in residents per km².
const DENSITY_MIDPOINT: f64 = 100.0;
const STEEPNESS: f64 = 0.03;
/// e 取五位小數
const E_APPROX: f64 = 2.71828;

/// Residents per km²; zero when the area is zero.
pub fn population_density(population: f64, area_m2: f64) -> f64 {
    let area_km2 = area_m2 / 1e6;
    if area_km2 > 0.0 {
        population / area_km2
    } else {
        0.0
    }
}

/// Walkability on a 0..100 logistic scale, rounded to 2 decimals.
pub fn walkability_score(density: f64) -> f64 {
    let score = 100.0 / (1.0 + E_APPROX.powf(-STEEPNESS * (density - DENSITY_MIDPOINT)));
    round_to(score, 2)
}

/// Half-to-even rounding at `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}
