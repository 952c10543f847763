//! Isotope names and δ-values.
//!
//! A δ-value is the per mil deviation of an isotope ratio from a reference
//! ratio, `δ = (R_sample / R_reference - 1) * 1000`. Every isotope is
//! normalized to the normalizing isotope of its element, which comes from an
//! [`IsotopeReference`] that callers pass in explicitly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::integrals::Integral;

/// Read-only source of isotope abundances
pub trait IsotopeReference {
    /// Natural abundance of an isotope given as `Ti-46`
    fn abundance(&self, isotope: &str) -> Option<f64>;

    /// Isotope every isotope of `element` is normalized to, as `Ti-48`
    fn normalizing_isotope(&self, element: &str) -> Option<String>;
}

/// Isotope abundances loaded from a table.
///
/// Unless set explicitly, the normalizing isotope of an element is its most
/// abundant isotope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IsotopeTable {
    /// Abundance by isotope name (`Fe-56`)
    pub abundances: BTreeMap<String, f64>,
    /// Normalizing isotope by element symbol, overriding the most abundant one
    #[serde(default)]
    pub normalizing: BTreeMap<String, String>,
}

impl IsotopeTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an isotope. The name is normalized first, invalid names are ignored.
    pub fn with_isotope(mut self, isotope: &str, abundance: f64) -> Self {
        if let Some(name) = isotope_name(isotope) {
            self.abundances.insert(name, abundance);
        }
        self
    }

    /// Set the normalizing isotope of an element
    pub fn with_normalizing(mut self, element: &str, isotope: &str) -> Self {
        if let Some(name) = isotope_name(isotope) {
            self.normalizing.insert(element.to_string(), name);
        }
        self
    }

    /// Parse a table from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl IsotopeReference for IsotopeTable {
    fn abundance(&self, isotope: &str) -> Option<f64> {
        self.abundances.get(isotope).copied()
    }

    fn normalizing_isotope(&self, element: &str) -> Option<String> {
        if let Some(isotope) = self.normalizing.get(element) {
            return Some(isotope.clone());
        }
        self.abundances
            .iter()
            .filter(|(name, _)| split_isotope(name).is_some_and(|(ele, _)| ele == element))
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, _)| name.clone())
    }
}

/// Normalize an isotope name to `Element-A`.
///
/// `46Ti`, `Ti46`, `ti-46` all become `Ti-46`. Returns `None` if the name is
/// not a symbol with a mass number.
pub fn isotope_name(name: &str) -> Option<String> {
    let compact: String = name.trim().chars().filter(|&c| c != '-').collect();
    if compact.is_empty() || !compact.is_ascii() {
        return None;
    }

    let split = compact
        .find(|c: char| c.is_ascii_digit() != compact.starts_with(|d: char| d.is_ascii_digit()))?;
    let (first, second) = compact.split_at(split);
    let (symbol, mass) = if first.starts_with(|c: char| c.is_ascii_digit()) {
        (second, first)
    } else {
        (first, second)
    };

    if symbol.is_empty()
        || symbol.len() > 3
        || !symbol.chars().all(|c| c.is_ascii_alphabetic())
        || mass.is_empty()
        || !mass.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let mut symbol_chars = symbol.chars();
    let symbol: String = symbol_chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .into_iter()
        .chain(symbol_chars.map(|c| c.to_ascii_lowercase()))
        .collect();
    Some(format!("{symbol}-{mass}"))
}

/// Element symbol and mass number of a normalized isotope name
fn split_isotope(name: &str) -> Option<(&str, &str)> {
    name.split_once('-')
}

/// Label of a δ-value, e.g. `δ(54Fe/56Fe)`
pub fn delta_label(nominator: &str, denominator: &str) -> Option<String> {
    let nom = isotope_name(nominator)?;
    let denom = isotope_name(denominator)?;
    let (ele1, a1) = split_isotope(&nom)?;
    let (ele2, a2) = split_isotope(&denom)?;
    Some(format!("δ({a1}{ele1}/{a2}{ele2})"))
}

/// δ-values of a set of peak integrals.
///
/// Without a standard, ratios are compared to the natural ratio of the
/// reference. With a standard (same peaks, same order), ratios are compared
/// to the standard's ratios. Peaks that are not isotopes, or whose
/// normalizing isotope was not measured, get NaN.
///
/// Also returns for each peak the indices of nominator and denominator.
pub fn delta_calc(
    names: &[String],
    integrals: &[Integral],
    standard: Option<&[Integral]>,
    reference: &dyn IsotopeReference,
) -> (Vec<Integral>, Vec<Option<(usize, usize)>>) {
    let normalized: Vec<Option<String>> = names.iter().map(|n| isotope_name(n)).collect();

    let nan = Integral {
        value: f64::NAN,
        uncertainty: f64::NAN,
    };
    let mut deltas = Vec::with_capacity(names.len());
    let mut indices = Vec::with_capacity(names.len());

    for (i, iso) in normalized.iter().enumerate() {
        let pair = iso.as_ref().and_then(|iso| {
            let (element, _) = split_isotope(iso)?;
            let norm = reference.normalizing_isotope(element)?;
            let j = normalized.iter().position(|n| n.as_deref() == Some(norm.as_str()))?;
            Some((iso, norm, j))
        });
        let Some((iso, norm, j)) = pair else {
            deltas.push(nan);
            indices.push(None);
            continue;
        };

        let nom = integrals[i];
        let denom = integrals[j];
        let msr_ratio = nom.value / denom.value;
        let mut rel_var = (nom.uncertainty / nom.value).powi(2) + (denom.uncertainty / denom.value).powi(2);

        let value = match standard {
            Some(std) => {
                let (std_nom, std_denom) = (std[i], std[j]);
                rel_var += (std_nom.uncertainty / std_nom.value).powi(2)
                    + (std_denom.uncertainty / std_denom.value).powi(2);
                (msr_ratio / (std_nom.value / std_denom.value) - 1.0) * 1000.0
            }
            None => match (reference.abundance(iso), reference.abundance(&norm)) {
                (Some(a_nom), Some(a_denom)) => (msr_ratio / (a_nom / a_denom) - 1.0) * 1000.0,
                _ => f64::NAN,
            },
        };

        let delta = Integral {
            value,
            uncertainty: (value + 1000.0) * rel_var.sqrt(),
        };
        if !delta.value.is_finite() || !delta.uncertainty.is_finite() {
            log::debug!("δ-value of {} is not finite", names[i]);
        }
        deltas.push(delta);
        indices.push(Some((i, j)));
    }

    (deltas, indices)
}

/// Correlation coefficient of two δ-values that share a denominator.
///
/// `sample_denominator` and `standard_denominator` are the integrals of the
/// common denominator isotope in sample and standard (Stephan and
/// Trappitsch 2023, eq. 24).
pub fn correlation_coefficient(
    delta_x: Integral,
    delta_y: Integral,
    sample_denominator: Integral,
    standard_denominator: Integral,
) -> f64 {
    let numerator = (sample_denominator.uncertainty / sample_denominator.value).powi(2)
        + (standard_denominator.uncertainty / standard_denominator.value).powi(2);
    let denominator = (delta_x.uncertainty / (delta_x.value + 1000.0))
        * (delta_y.uncertainty / (delta_y.value + 1000.0));
    numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iron() -> IsotopeTable {
        IsotopeTable::new()
            .with_isotope("Fe54", 0.05845)
            .with_isotope("Fe56", 0.91754)
            .with_isotope("Fe57", 0.02119)
            .with_isotope("Fe58", 0.00282)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_isotope_name() {
        assert_eq!(isotope_name("46Ti").as_deref(), Some("Ti-46"));
        assert_eq!(isotope_name("Ti46").as_deref(), Some("Ti-46"));
        assert_eq!(isotope_name("Ti-46").as_deref(), Some("Ti-46"));
        assert_eq!(isotope_name("ti46").as_deref(), Some("Ti-46"));
        assert_eq!(isotope_name("bg"), None);
        assert_eq!(isotope_name("46"), None);
        assert_eq!(isotope_name("Ti46x"), None);
    }

    #[test]
    fn test_delta_label() {
        assert_eq!(delta_label("54Fe", "Fe56").as_deref(), Some("δ(54Fe/56Fe)"));
        assert_eq!(delta_label("bg", "56Fe"), None);
    }

    #[test]
    fn test_normalizing_isotope() {
        let table = iron();
        assert_eq!(table.normalizing_isotope("Fe").as_deref(), Some("Fe-56"));
        let table = table.with_normalizing("Fe", "54Fe");
        assert_eq!(table.normalizing_isotope("Fe").as_deref(), Some("Fe-54"));
        assert_eq!(table.normalizing_isotope("Ti"), None);
    }

    #[test]
    fn test_delta_calc_nan_for_unknown() {
        let integrals = [
            Integral { value: 10000.0, uncertainty: 100.0 },
            Integral { value: 100000.0, uncertainty: 240.0 },
            Integral { value: 100.0, uncertainty: 10.0 },
            Integral { value: 2001.0, uncertainty: 21.0 },
        ];
        let (deltas, indices) =
            delta_calc(&names(&["Fe54", "Fe56", "244Pu", "bg"]), &integrals, None, &iron());

        assert!(deltas[0].value.is_finite());
        assert_eq!(deltas[1].value, 0.0);
        assert!(deltas[2].value.is_nan() && deltas[3].uncertainty.is_nan());
        assert_eq!(indices, vec![Some((0, 1)), Some((1, 1)), None, None]);
    }

    #[test]
    fn test_delta_against_natural_ratio() {
        let natural = 0.05845 / 0.91754;
        let integrals = [
            Integral::from_counts(natural * 1.01 * 1e6),
            Integral::from_counts(1e6),
        ];
        let (deltas, _) = delta_calc(&names(&["54Fe", "56Fe"]), &integrals, None, &iron());
        assert!((deltas[0].value - 10.0).abs() < 1e-6);
        let rel = (1.0 / integrals[0].value + 1.0 / integrals[1].value).sqrt();
        assert!((deltas[0].uncertainty - 1010.0 * rel).abs() < 1e-6);
    }

    #[test]
    fn test_delta_against_standard() {
        let sample = [Integral::from_counts(110.0), Integral::from_counts(1000.0)];
        let standard = [Integral::from_counts(100.0), Integral::from_counts(1000.0)];
        let (deltas, _) = delta_calc(&names(&["54Fe", "56Fe"]), &sample, Some(&standard[..]), &iron());
        assert!((deltas[0].value - 100.0).abs() < 1e-9);
        let rel = (1.0 / 110.0 + 1.0 / 1000.0 + 1.0 / 100.0 + 1.0 / 1000.0_f64).sqrt();
        assert!((deltas[0].uncertainty - 1100.0 * rel).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_coefficient() {
        let dx = Integral { value: 0.0, uncertainty: 10.0 };
        let dy = Integral { value: 0.0, uncertainty: 20.0 };
        let sample = Integral { value: 100.0, uncertainty: 1.0 };
        let standard = Integral { value: 100.0, uncertainty: 1.0 };
        let rho = correlation_coefficient(dx, dy, sample, standard);
        assert!((rho - 0.0002 / 0.0002).abs() < 1e-12);
    }

    #[test]
    fn test_table_from_json() {
        let table = IsotopeTable::from_json(r#"{"abundances": {"Ti-46": 0.0825, "Ti-48": 0.7372}}"#).unwrap();
        assert_eq!(table.normalizing_isotope("Ti").as_deref(), Some("Ti-48"));
    }
}
