// ============================================================
// Layer 6 — Classification Report
// ============================================================
// Summary metrics over per-timestep (score, label) pairs:
//
//   confusion matrix at a fixed threshold
//   accuracy, precision / recall for both classes, event F1
//   ROC curve and its area (trapezoid rule)
//
// Written to <report_dir>/evaluation.json and roc.csv.
//
//              predicted 1   predicted 0
//   actual 1       tp            fn
//   actual 0       fp            tn

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive:  usize,
    pub false_positive: usize,
    pub true_negative:  usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

/// One point of the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f32,
    pub fpr:       f64,
    pub tpr:       f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub samples:              usize,
    pub threshold:            f32,
    pub accuracy:             f64,
    pub precision_event:      f64,
    pub recall_event:         f64,
    pub precision_background: f64,
    pub recall_background:    f64,
    pub f1_event:             f64,
    /// `None` when only one class is present
    pub roc_auc:              Option<f64>,
    pub confusion:            ConfusionMatrix,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// Scores are probabilities; labels are 0/1 (≥ 0.5 counts as 1).
    pub fn from_scores(scores: &[f32], labels: &[f32], threshold: f32) -> Result<Self> {
        anyhow::ensure!(
            scores.len() == labels.len(),
            "{} scores but {} labels",
            scores.len(),
            labels.len()
        );

        let mut cm = ConfusionMatrix::default();
        for (&s, &y) in scores.iter().zip(labels) {
            match (s >= threshold, y >= 0.5) {
                (true, true)   => cm.true_positive  += 1,
                (true, false)  => cm.false_positive += 1,
                (false, false) => cm.true_negative  += 1,
                (false, true)  => cm.false_negative += 1,
            }
        }

        let precision = ratio(cm.true_positive, cm.true_positive + cm.false_positive);
        let recall    = ratio(cm.true_positive, cm.true_positive + cm.false_negative);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            samples:              cm.total(),
            threshold,
            accuracy:             ratio(cm.true_positive + cm.true_negative, cm.total()),
            precision_event:      precision,
            recall_event:         recall,
            precision_background: ratio(cm.true_negative, cm.true_negative + cm.false_negative),
            recall_background:    ratio(cm.true_negative, cm.true_negative + cm.false_positive),
            f1_event:             f1,
            roc_auc:              roc_curve(scores, labels).map(|c| auc(&c)),
            confusion:            cm,
        })
    }
}

/// ROC curve from the highest threshold down. Tied scores form a
/// single point. `None` when either class is missing.
pub fn roc_curve(scores: &[f32], labels: &[f32]) -> Option<Vec<RocPoint>> {
    let mut pairs: Vec<(f32, bool)> = scores.iter().zip(labels).map(|(&s, &y)| (s, y >= 0.5)).collect();
    let positives = pairs.iter().filter(|p| p.1).count();
    let negatives = pairs.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut points = vec![RocPoint { threshold: f32::INFINITY, fpr: 0.0, tpr: 0.0 }];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < pairs.len() {
        let score = pairs[i].0;
        while i < pairs.len() && pairs[i].0 == score {
            if pairs[i].1 { tp += 1 } else { fp += 1 }
            i += 1;
        }
        points.push(RocPoint { threshold: score, fpr: ratio(fp, negatives), tpr: ratio(tp, positives) });
    }
    Some(points)
}

/// Area under a ROC curve (trapezoid rule).
pub fn auc(curve: &[RocPoint]) -> f64 {
    curve
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[0].tpr + w[1].tpr) / 2.0)
        .sum()
}

/// Write evaluation.json and, when defined, roc.csv into `dir`.
pub fn write_reports(dir: &Path, report: &ClassificationReport, roc: Option<&[RocPoint]>) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create report directory '{}'", dir.display()))?;

    let json_path = dir.join("evaluation.json");
    fs::write(&json_path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("Cannot write '{}'", json_path.display()))?;
    tracing::debug!("Wrote '{}'", json_path.display());

    if let Some(points) = roc {
        let roc_path = dir.join("roc.csv");
        let mut w = csv::Writer::from_path(&roc_path)
            .with_context(|| format!("Cannot create '{}'", roc_path.display()))?;
        for p in points {
            w.serialize(p)?;
        }
        w.flush()?;
        tracing::debug!("Wrote {} ROC points to '{}'", points.len(), roc_path.display());
    }
    Ok(())
}
