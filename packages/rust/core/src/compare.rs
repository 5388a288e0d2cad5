//! Projected-vs-actual lineup comparison and canned recommendations.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use lineuprelay_shared::{ActualResult, LineupPlayer, name_key};

/// A matched player counts as accurate when within this many points.
pub const ACCURACY_TOLERANCE: f64 = 5.0;

/// Per-player projection error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerError {
    pub name: String,
    pub projected: f64,
    pub actual: f64,
    /// `actual - projected`.
    pub error: f64,
    pub abs_error: f64,
}

/// Accuracy statistics for one lineup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub matched: usize,
    /// Lineup players without a usable actual score.
    pub unmatched: Vec<String>,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    /// Mean of `actual - projected`; positive means projections ran low.
    pub bias: f64,
    pub projected_total: f64,
    pub actual_total: f64,
    pub point_differential: f64,
    pub accuracy_rate: f64,
    /// Sorted by absolute error, largest first.
    pub players: Vec<PlayerError>,
}

impl Comparison {
    /// The `n` largest misses.
    pub fn biggest_misses(&self, n: usize) -> &[PlayerError] {
        &self.players[..n.min(self.players.len())]
    }
}

/// Join a projected lineup with actual scores by normalized name.
///
/// Only players with both a projection and an actual score are counted. When
/// an actual name appears twice the first score wins.
pub fn compare_lineup(lineup: &[LineupPlayer], actuals: &[ActualResult]) -> Comparison {
    let mut by_name: HashMap<String, f64> = HashMap::new();
    for result in actuals {
        if let Some(points) = result.actual_points {
            by_name.entry(name_key(&result.name)).or_insert(points);
        }
    }

    let mut players = Vec::new();
    let mut unmatched = Vec::new();
    for player in lineup {
        match (player.projection, by_name.get(&name_key(&player.name))) {
            (Some(projected), Some(&actual)) => {
                let error = actual - projected;
                players.push(PlayerError {
                    name: player.name.clone(),
                    projected,
                    actual,
                    error,
                    abs_error: error.abs(),
                });
            }
            _ => unmatched.push(player.name.clone()),
        }
    }

    players.sort_by(|a, b| b.abs_error.total_cmp(&a.abs_error));

    let matched = players.len();
    let projected_total: f64 = players.iter().map(|p| p.projected).sum();
    let actual_total: f64 = players.iter().map(|p| p.actual).sum();

    let (mae, mse, bias, accuracy_rate) = if matched == 0 {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        let n = matched as f64;
        let within = players
            .iter()
            .filter(|p| p.abs_error <= ACCURACY_TOLERANCE)
            .count();
        (
            players.iter().map(|p| p.abs_error).sum::<f64>() / n,
            players.iter().map(|p| p.error * p.error).sum::<f64>() / n,
            players.iter().map(|p| p.error).sum::<f64>() / n,
            within as f64 / n,
        )
    };

    Comparison {
        matched,
        unmatched,
        mae,
        mse,
        rmse: mse.sqrt(),
        bias,
        projected_total,
        actual_total,
        point_differential: actual_total - projected_total,
        accuracy_rate,
        players,
    }
}

/// Threshold-based advice for a comparison.
pub fn recommend(comparison: &Comparison) -> Vec<String> {
    if comparison.matched == 0 {
        return vec!["Provide actual points for lineup players to evaluate accuracy".into()];
    }

    let mut out = Vec::new();

    out.push(if comparison.mae <= 3.0 {
        format!(
            "Projections are well calibrated (MAE {:.2}); keep current weights",
            comparison.mae
        )
    } else if comparison.mae <= 6.0 {
        format!(
            "Moderate projection error (MAE {:.2}); review matchup and pace inputs",
            comparison.mae
        )
    } else {
        format!(
            "Large projection error (MAE {:.2}); revisit salary-proxy weighting",
            comparison.mae
        )
    });

    if comparison.bias > 2.0 {
        out.push(format!(
            "Projections are too conservative: players beat them by {:.1} points on average",
            comparison.bias
        ));
    } else if comparison.bias < -2.0 {
        out.push(format!(
            "Projections are too optimistic: players fell short by {:.1} points on average",
            -comparison.bias
        ));
    }

    if let Some(miss) = comparison.players.first().filter(|p| p.abs_error > 10.0) {
        out.push(format!(
            "Biggest miss: {} ({:+.1} points vs projection)",
            miss.name, miss.error
        ));
    }

    out
}

/// How our lineup stacked up against the slate winner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinnerAnalysis {
    /// Players in both lineups.
    pub overlap: Vec<String>,
    /// Winner's players we did not roster.
    pub missed: Vec<String>,
    pub winner_total: f64,
    pub our_total: f64,
    /// `winner_total - our_total`.
    pub point_gap: f64,
}

/// Compare our scored lineup with the winning one.
pub fn compare_winner(ours: &[ActualResult], winner: &[ActualResult]) -> WinnerAnalysis {
    let our_keys: HashSet<String> = ours.iter().map(|r| name_key(&r.name)).collect();

    let (overlap, missed): (Vec<&ActualResult>, Vec<&ActualResult>) = winner
        .iter()
        .partition(|r| our_keys.contains(&name_key(&r.name)));

    let total = |rows: &[ActualResult]| rows.iter().filter_map(|r| r.actual_points).sum::<f64>();
    let winner_total = total(winner);
    let our_total = total(ours);

    WinnerAnalysis {
        overlap: overlap.into_iter().map(|r| r.name.clone()).collect(),
        missed: missed.into_iter().map(|r| r.name.clone()).collect(),
        winner_total,
        our_total,
        point_gap: winner_total - our_total,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn player(name: &str, projection: f64) -> LineupPlayer {
        LineupPlayer::from_value(&json!({"name": name, "projection": projection})).unwrap()
    }

    fn actual(name: &str, points: Option<f64>) -> ActualResult {
        ActualResult {
            name: name.into(),
            actual_points: points,
        }
    }

    #[test]
    fn computes_error_statistics() {
        let lineup = [player("A", 10.0), player("B", 20.0)];
        let actuals = [actual("a", Some(12.0)), actual("B ", Some(17.0))];

        let c = compare_lineup(&lineup, &actuals);
        assert_eq!(c.matched, 2);
        assert!((c.mae - 2.5).abs() < 1e-9);
        assert!((c.mse - 6.5).abs() < 1e-9);
        assert!((c.bias + 0.5).abs() < 1e-9);
        assert!((c.point_differential + 1.0).abs() < 1e-9);
        assert_eq!(c.accuracy_rate, 1.0);
        assert_eq!(c.players[0].name, "B");
    }

    #[test]
    fn unmatched_players_do_not_count() {
        let lineup = [player("A", 10.0), player("Missing", 30.0), player("Null", 5.0)];
        let actuals = [actual("A", Some(22.0)), actual("Null", None)];

        let c = compare_lineup(&lineup, &actuals);
        assert_eq!(c.matched, 1);
        assert_eq!(c.unmatched, vec!["Missing".to_string(), "Null".to_string()]);
        assert_eq!(c.accuracy_rate, 0.0);
        assert!((c.mae - 12.0).abs() < 1e-9);
    }

    #[test]
    fn empty_comparison_prompts_for_actuals() {
        let c = compare_lineup(&[player("A", 10.0)], &[]);
        assert_eq!(c.matched, 0);
        assert_eq!(c.mae, 0.0);
        let recs = recommend(&c);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].starts_with("Provide actual points"));
    }

    #[test]
    fn recommendations_follow_thresholds() {
        let calibrated = compare_lineup(&[player("A", 10.0)], &[actual("A", Some(11.0))]);
        assert!(recommend(&calibrated)[0].contains("well calibrated"));

        let conservative = compare_lineup(&[player("A", 10.0)], &[actual("A", Some(24.0))]);
        let recs = recommend(&conservative);
        assert!(recs[0].contains("salary-proxy"));
        assert!(recs.iter().any(|r| r.contains("too conservative")));
        assert!(recs.iter().any(|r| r.contains("Biggest miss: A")));

        let optimistic = compare_lineup(&[player("A", 10.0)], &[actual("A", Some(5.0))]);
        let recs = recommend(&optimistic);
        assert!(recs[0].contains("Moderate"));
        assert!(recs.iter().any(|r| r.contains("too optimistic")));
    }

    #[test]
    fn winner_analysis_reports_overlap_and_gap() {
        let ours = [actual("Steph Curry", Some(50.0)), actual("Role Player", Some(10.0))];
        let winner = [actual("steph curry", Some(50.0)), actual("Star", Some(70.0))];

        let w = compare_winner(&ours, &winner);
        assert_eq!(w.overlap, vec!["steph curry".to_string()]);
        assert_eq!(w.missed, vec!["Star".to_string()]);
        assert!((w.point_gap - 60.0).abs() < 1e-9);
    }
}
