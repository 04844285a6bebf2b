//! Peptide chemistry helpers: theoretical-vs-observed m/z deltas and
//! tryptic missed-cleavage counting.

use regex::Regex;
use rustyms::{LinearPeptide, MultiChemical};

/// Monoisotopic proton mass in Daltons.
pub const PROTON_MASS: f64 = 1.007_276_466_88;

/// Monoisotopic mass of a plain peptide sequence, without modifications.
/// `None` when the sequence does not parse as a linear peptide.
pub fn monoisotopic_mass(sequence: &str) -> Option<f64> {
    let peptide = LinearPeptide::pro_forma(sequence).ok()?;
    let formulas = peptide.formulas();
    if formulas.len() != 1 {
        return None;
    }
    Some(formulas[0].monoisotopic_mass().value)
}

/// Observed minus theoretical precursor m/z.
///
/// The theoretical value is the monoisotopic peptide mass plus the
/// modification deltas, protonated at the observed charge. `None` when the
/// sequence cannot be parsed or charge/m/z are missing; callers skip the
/// observation in that case.
pub fn calc_delta_mz(
    sequence: &str,
    precursor_mz: Option<f64>,
    precursor_charge: Option<i32>,
    modification_masses: &[f64],
) -> Option<f64> {
    let mz = precursor_mz?;
    let charge = precursor_charge?;
    if charge == 0 {
        return None;
    }
    let mass = monoisotopic_mass(sequence)? + modification_masses.iter().sum::<f64>();
    let theoretical = (mass + charge as f64 * PROTON_MASS) / charge as f64;
    Some(mz - theoretical)
}

/// Tryptic missed-cleavage counter.
///
/// The C-terminal K/R run is stripped (a terminal site is cleaved, not
/// missed), K/R immediately before a proline is not a cleavage site, and
/// every remaining K/R counts as one missed site.
#[derive(Debug)]
pub struct CleavageCounter {
    terminal: Regex,
    suppressed: Regex,
}

impl Default for CleavageCounter {
    fn default() -> Self {
        Self {
            terminal: Regex::new(r"[KR]+$").expect("static pattern"),
            suppressed: Regex::new(r"[KR]P").expect("static pattern"),
        }
    }
}

impl CleavageCounter {
    pub fn count(&self, sequence: &str) -> usize {
        let stripped = self.terminal.replace(sequence, "");
        let stripped = self.suppressed.replace_all(&stripped, "");
        stripped.chars().filter(|c| matches!(c, 'K' | 'R')).count()
    }
}
