use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use rimseval::delta::IsotopeTable;
use rimseval::evaluator::{save_integral_evaluator, IntegralEvaluator};

use super::process::load_isotopes;
use super::report::{format_integrals, Row};

fn collect(files: &[PathBuf]) -> Result<IntegralEvaluator> {
    let mut evaluator = IntegralEvaluator::new();
    for file in files {
        evaluator
            .add_integral_file(file, false)
            .with_context(|| format!("Failed to add {}", file.display()))?;
    }
    Ok(evaluator)
}

/// Sum integral files, normalize to a standard and print δ-values
pub fn run(
    files: Vec<PathBuf>,
    standard: Vec<PathBuf>,
    isotopes: Option<PathBuf>,
    save: Option<PathBuf>,
) -> Result<()> {
    let mut evaluator = collect(&files)?;
    info!("Evaluating {} samples", evaluator.names().len());

    if !standard.is_empty() {
        let standard = collect(&standard)?;
        evaluator
            .set_standard(standard)
            .context("Standard does not match the samples")?;
    }

    let table = match &isotopes {
        Some(path) => load_isotopes(path)?,
        None => IsotopeTable::new(),
    };

    let integrals = evaluator.integrals()?;
    let deltas = evaluator.deltas(&table)?;
    let labels = evaluator.delta_labels(&table)?;
    let peaks = evaluator.peaks().unwrap_or_default();

    let rows: Vec<Row<'_>> = peaks
        .iter()
        .zip(integrals)
        .zip(deltas.iter().zip(labels))
        .map(|((peak, integral), (&delta, label))| Row {
            peak,
            integral,
            delta: label.map(|label| (label, delta)),
        })
        .collect();
    println!("{}", format_integrals(evaluator.name().unwrap_or("sample"), &rows));

    if let Some(path) = save {
        let saved = save_integral_evaluator(&evaluator, &path)
            .with_context(|| format!("Failed to save evaluation to {}", path.display()))?;
        info!("Evaluation written to {}", saved.display());
    }

    Ok(())
}
