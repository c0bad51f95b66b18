//! Plain-text rendering of summary tables.

use std::fmt;

use ed_core::ParamRole;

use crate::aggregate::{
    ABILITY_GROUP, ItemSummaryTable, PersonSummaryTable, RATING_SCALE_GROUP, SummaryRow,
};
use crate::summary::{ParamSummary, SummaryOptions};

const NAME_WIDTH: usize = 22;

fn interval_labels(ci_level: f64) -> (String, String) {
    let opts = SummaryOptions::default().ci_level(ci_level);
    (opts.lower_label(), opts.upper_label())
}

fn fmt_opt(v: Option<f64>, precision: usize) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.precision$}"))
}

fn write_header(f: &mut fmt::Formatter<'_>, first: &str, ci_level: f64) -> fmt::Result {
    let (lo, hi) = interval_labels(ci_level);
    writeln!(
        f,
        "{first:<NAME_WIDTH$} {:>9} {:>9} {lo:>9} {hi:>9} {:>9} {:>9} {:>7}",
        "mean", "sd", "ess_bulk", "ess_tail", "r_hat"
    )
}

fn write_values(f: &mut fmt::Formatter<'_>, name: &str, s: &ParamSummary) -> fmt::Result {
    writeln!(
        f,
        "{name:<NAME_WIDTH$} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9} {:>9} {:>7}",
        s.mean,
        s.sd,
        s.lower,
        s.upper,
        fmt_opt(s.ess_bulk, 0),
        fmt_opt(s.ess_tail, 0),
        fmt_opt(s.r_hat, 3),
    )
}

fn row_name(row: &SummaryRow) -> String {
    match (row.role, row.step) {
        (ParamRole::Lambda | ParamRole::Sigma, _) => format!("  {}", row.label),
        (_, Some(step)) => format!("  {} step {step}", row.role),
        (_, None) => format!("  {}", row.role),
    }
}

impl fmt::Display for ItemSummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.model.spec().title, self.model)?;
        write_header(f, "parameter", self.ci_level)?;
        let mut group: Option<String> = None;
        for row in self.rows() {
            if group.as_deref() != Some(row.group.as_str()) {
                match row.group.as_str() {
                    RATING_SCALE_GROUP | ABILITY_GROUP => writeln!(f, "{}", row.group)?,
                    item => writeln!(f, "Item '{item}'")?,
                }
                group = Some(row.group.clone());
            }
            write_values(f, &row_name(&row), &row.summary)?;
        }
        Ok(())
    }
}

impl fmt::Display for PersonSummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lo, hi) = interval_labels(self.ci_level);
        writeln!(
            f,
            "{:<NAME_WIDTH$} {:>5} {:>9} {:>9} {lo:>9} {hi:>9} {:>9} {:>9} {:>7}",
            "person", "raw", "mean", "sd", "ess_bulk", "ess_tail", "r_hat"
        )?;
        for p in &self.persons {
            let raw = p.raw_score.map_or_else(|| "-".to_string(), |r| r.to_string());
            let name = format!("{:<NAME_WIDTH$} {raw:>5}", p.label);
            writeln!(
                f,
                "{name} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9} {:>9} {:>7}",
                p.theta.mean,
                p.theta.sd,
                p.theta.lower,
                p.theta.upper,
                fmt_opt(p.theta.ess_bulk, 0),
                fmt_opt(p.theta.ess_tail, 0),
                fmt_opt(p.theta.r_hat, 3),
            )?;
        }
        Ok(())
    }
}
