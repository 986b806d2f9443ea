//! Composite OOS scoring and tiered shortlist generation.
//!
//! OOS-first and deliberately simple: hard filters knock out anything that
//! did not hold up out of sample (on either side's drawdown), the survivors
//! are ranked by `w_exp * exp + w_pf * ln(pf) - w_dd * dd`, and two tiers are
//! cut by OOS trade count — tier 2 excludes tickers already in tier 1.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::compare::PairRow;

/// Tier thresholds and score weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Tier 1 ("funded"): strict OOS trade count.
    pub tier1_min_trades: usize,
    /// Tier 2 ("challenge"): relaxed trade count, excluding tier 1 tickers.
    pub tier2_min_trades: usize,

    pub min_pf_oos: f64,
    pub min_expectancy_oos: f64,
    /// Cap applied to the OOS and the IS daily drawdown alike.
    pub dd_cap: f64,

    pub weight_expectancy: f64,
    pub weight_pf: f64,
    pub weight_dd: f64,

    pub min_score: f64,
    pub max_tickers: usize,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            tier1_min_trades: 15,
            tier2_min_trades: 10,
            min_pf_oos: 1.2,
            min_expectancy_oos: 0.0,
            dd_cap: 0.012,
            weight_expectancy: 0.55,
            weight_pf: 0.30,
            weight_dd: 0.15,
            min_score: 0.0,
            max_tickers: 20,
        }
    }
}

/// A shortlisted pair with its composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRow {
    #[serde(flatten)]
    pub pair: PairRow,
    pub oos_score: f64,
}

/// Why a ticker made neither tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejection {
    pub ticker: String,
    pub penalty: f64,
    pub reason: String,
}

/// The three shortlist tables plus the per-ticker rejection reasons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieredShortlists {
    pub tier1: Vec<ScoredRow>,
    pub tier2: Vec<ScoredRow>,
    /// tier1 ∪ tier2, re-ranked by score.
    pub tradable: Vec<ScoredRow>,
    pub rejections: Vec<Rejection>,
}

/// Composite OOS score: `w_exp * exp + w_pf * ln(max(pf, ε)) - w_dd * dd`.
pub fn oos_score(row: &PairRow, cfg: &TierConfig) -> f64 {
    cfg.weight_expectancy * row.oos_expectancy
        + cfg.weight_pf * row.oos_pf.max(1e-9).ln()
        - cfg.weight_dd * row.oos_dd
}

/// First tier gate a row fails under `min_trades`, if any.
fn gate_failure(row: &PairRow, min_trades: usize, cfg: &TierConfig) -> Option<String> {
    if row.oos_trades < min_trades {
        return Some(format!("oos_trades {} < {}", row.oos_trades, min_trades));
    }
    if row.oos_pf < cfg.min_pf_oos {
        return Some(format!("oos_pf {:.2} < {:.2}", row.oos_pf, cfg.min_pf_oos));
    }
    if row.oos_expectancy <= cfg.min_expectancy_oos {
        return Some(format!(
            "oos_expectancy {:.3} <= {:.2}",
            row.oos_expectancy, cfg.min_expectancy_oos
        ));
    }
    if row.oos_dd > cfg.dd_cap {
        return Some(format!(
            "oos_dd {:.2}% > {:.2}%",
            row.oos_dd * 100.0,
            cfg.dd_cap * 100.0
        ));
    }
    if row.is_dd > cfg.dd_cap {
        return Some(format!(
            "is_dd {:.2}% > {:.2}%",
            row.is_dd * 100.0,
            cfg.dd_cap * 100.0
        ));
    }
    None
}

fn sort_by_score(rows: &mut [ScoredRow]) {
    rows.sort_by(|a, b| {
        b.oos_score
            .partial_cmp(&a.oos_score)
            .unwrap_or(Ordering::Equal)
    });
}

fn shortlist_for_tier(
    pairs: &[PairRow],
    min_trades: usize,
    cfg: &TierConfig,
    exclude: &[String],
) -> Vec<ScoredRow> {
    let mut rows: Vec<ScoredRow> = pairs
        .iter()
        .filter(|p| !exclude.contains(&p.ticker))
        .filter(|p| gate_failure(p, min_trades, cfg).is_none())
        .map(|p| ScoredRow {
            pair: p.clone(),
            oos_score: oos_score(p, cfg),
        })
        .filter(|s| cfg.min_score <= 0.0 || s.oos_score >= cfg.min_score)
        .collect();

    sort_by_score(&mut rows);
    rows.truncate(cfg.max_tickers);
    rows
}

/// Build both tiers, the combined tradable list and the rejection table.
pub fn tiered_shortlists(pairs: &[PairRow], cfg: &TierConfig) -> TieredShortlists {
    let tier1 = shortlist_for_tier(pairs, cfg.tier1_min_trades, cfg, &[]);
    let tier1_tickers: Vec<String> = tier1.iter().map(|s| s.pair.ticker.clone()).collect();
    let tier2 = shortlist_for_tier(pairs, cfg.tier2_min_trades, cfg, &tier1_tickers);

    let mut tradable: Vec<ScoredRow> = tier1.iter().chain(tier2.iter()).cloned().collect();
    sort_by_score(&mut tradable);

    let selected: Vec<&str> = tradable.iter().map(|s| s.pair.ticker.as_str()).collect();
    let rejections = pairs
        .iter()
        .filter(|p| !selected.contains(&p.ticker.as_str()))
        .map(|p| Rejection {
            ticker: p.ticker.clone(),
            penalty: p.penalty,
            reason: gate_failure(p, cfg.tier2_min_trades, cfg)
                .unwrap_or_else(|| "below score floor or rank cap".to_string()),
        })
        .collect();

    TieredShortlists {
        tier1,
        tier2,
        tradable,
        rejections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::OosStatus;

    fn pair(ticker: &str, oos_trades: usize, exp: f64, pf: f64, dd: f64) -> PairRow {
        PairRow {
            ticker: ticker.into(),
            penalty: 0.25,
            is_trades: 40,
            is_expectancy: exp,
            is_pf: pf,
            is_wr: 0.5,
            is_dd: dd,
            is_bars: 1000,
            oos_trades,
            oos_expectancy: exp,
            oos_pf: pf,
            oos_wr: 0.5,
            oos_dd: dd,
            oos_bars: 400,
            exp_delta: 0.0,
            pf_delta: 0.0,
            oos_status: OosStatus::Valid,
            oos_notes: String::new(),
        }
    }

    #[test]
    fn score_formula() {
        let cfg = TierConfig::default();
        let row = pair("X", 20, 0.2, 1.5, 0.01);
        let expected = 0.55 * 0.2 + 0.30 * 1.5_f64.ln() - 0.15 * 0.01;
        assert!((oos_score(&row, &cfg) - expected).abs() < 1e-12);
    }

    #[test]
    fn tiers_split_on_trade_count() {
        let cfg = TierConfig::default();
        let pairs = vec![
            pair("FUNDED", 20, 0.2, 1.5, 0.01),    // tier 1
            pair("CHALLENGE", 12, 0.3, 1.6, 0.01), // tier 2 only
            pair("THIN", 5, 0.4, 2.0, 0.01),       // neither
        ];
        let lists = tiered_shortlists(&pairs, &cfg);

        assert_eq!(lists.tier1.len(), 1);
        assert_eq!(lists.tier1[0].pair.ticker, "FUNDED");
        assert_eq!(lists.tier2.len(), 1);
        assert_eq!(lists.tier2[0].pair.ticker, "CHALLENGE");
        assert_eq!(lists.tradable.len(), 2);
        assert!(lists
            .rejections
            .iter()
            .any(|r| r.ticker == "THIN" && r.reason.contains("oos_trades")));
    }

    #[test]
    fn tier2_excludes_tier1_tickers() {
        let cfg = TierConfig::default();
        let pairs = vec![pair("BOTH", 20, 0.2, 1.5, 0.01)];
        let lists = tiered_shortlists(&pairs, &cfg);
        assert_eq!(lists.tier1.len(), 1);
        assert!(lists.tier2.is_empty());

        // Disjointness invariant.
        for t2 in &lists.tier2 {
            assert!(!lists
                .tier1
                .iter()
                .any(|t1| t1.pair.ticker == t2.pair.ticker));
        }
    }

    #[test]
    fn tradable_is_union_sorted_by_score() {
        let cfg = TierConfig::default();
        let pairs = vec![
            pair("A", 20, 0.10, 1.3, 0.01),
            pair("B", 12, 0.40, 1.9, 0.01), // tier 2 but highest score
            pair("C", 25, 0.25, 1.6, 0.01),
        ];
        let lists = tiered_shortlists(&pairs, &cfg);

        assert_eq!(lists.tradable.len(), lists.tier1.len() + lists.tier2.len());
        for w in lists.tradable.windows(2) {
            assert!(w[0].oos_score >= w[1].oos_score);
        }
        assert_eq!(lists.tradable[0].pair.ticker, "B");
    }

    #[test]
    fn dd_cap_applies_to_both_sides() {
        let cfg = TierConfig::default();
        let mut p = pair("X", 20, 0.2, 1.5, 0.01);
        p.is_dd = 0.05; // OOS fine, IS blown out
        let lists = tiered_shortlists(&[p], &cfg);
        assert!(lists.tier1.is_empty());
        assert!(lists.tier2.is_empty());
        assert!(lists.rejections[0].reason.contains("is_dd"));
    }

    #[test]
    fn pf_floor_and_expectancy_floor() {
        let cfg = TierConfig::default();
        let low_pf = pair("LOWPF", 20, 0.2, 1.1, 0.01);
        let flat = pair("FLAT", 20, 0.0, 1.5, 0.01);
        let lists = tiered_shortlists(&[low_pf, flat], &cfg);
        assert!(lists.tradable.is_empty());
        assert_eq!(lists.rejections.len(), 2);
    }

    #[test]
    fn rank_cap_limits_each_tier() {
        let cfg = TierConfig {
            max_tickers: 2,
            ..TierConfig::default()
        };
        let pairs: Vec<PairRow> = (0..5)
            .map(|i| pair(&format!("T{i}"), 20, 0.1 + 0.05 * i as f64, 1.5, 0.01))
            .collect();
        let lists = tiered_shortlists(&pairs, &cfg);
        assert_eq!(lists.tier1.len(), 2);
        // The two best scores made it.
        assert_eq!(lists.tier1[0].pair.ticker, "T4");
        assert_eq!(lists.tier1[1].pair.ticker, "T3");
    }

    #[test]
    fn infinite_pf_sorts_first_without_panicking() {
        let cfg = TierConfig::default();
        let mut perfect = pair("PERFECT", 20, 0.5, f64::INFINITY, 0.005);
        perfect.is_pf = f64::INFINITY;
        let pairs = vec![perfect, pair("GOOD", 20, 0.3, 1.8, 0.005)];
        let lists = tiered_shortlists(&pairs, &cfg);
        assert_eq!(lists.tier1[0].pair.ticker, "PERFECT");
        assert!(lists.tier1[0].oos_score.is_infinite());
    }
}
