use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use rimseval::calibration::CalibrationFile;
use rimseval::dataset::ArrivalDataset;
use rimseval::delta::{delta_label, IsotopeTable};
use rimseval::evaluator::IntegralRecord;
use rimseval::processor::CrdFileProcessor;

use super::config::Config;
use super::report::{format_integrals, Row};

pub fn load_isotopes(path: &Path) -> Result<IsotopeTable> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read isotope table: {}", path.display()))?;
    IsotopeTable::from_json(&json).context("Failed to parse isotope table")
}

fn load_dataset(path: &Path) -> Result<ArrivalDataset> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file)).context("Failed to parse dataset")
}

/// Process one measurement and write its integrals
pub fn run(
    dataset: PathBuf,
    calibration: PathBuf,
    config: Option<PathBuf>,
    isotopes: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    if !dataset.exists() {
        anyhow::bail!("Dataset does not exist: {}", dataset.display());
    }

    let config = match &config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let settings = &config.processing;

    let output = output.unwrap_or_else(|| dataset.with_extension("integrals.json"));

    info!("rimseval - CRD processing");
    info!("=========================");
    info!("Dataset:     {}", dataset.display());
    info!("Calibration: {}", calibration.display());
    info!("Output:      {}", output.display());

    let mut crd = CrdFileProcessor::new(load_dataset(&dataset)?);
    crd.set_peak_fwhm(settings.peak_fwhm())
        .context("Invalid peak FWHM in config")?;

    let cal = CalibrationFile::load(&calibration).context("Failed to load calibration")?;
    crd.apply_calibration(&cal).context("Invalid calibration")?;

    crd.calculate_applied_filters()
        .context("Failed to apply the recorded filters")?;
    info!("{} shots left after filtering", crd.nof_shots());

    if crd.def_mcal().is_none() {
        anyhow::bail!("The calibration file has no mass calibration");
    }
    if settings.optimize_mcal() {
        crd.optimize_mcal(settings.mcal_offset)
            .context("Mass calibration optimization failed")?;
    }
    crd.mass_calibration().context("Mass calibration failed")?;

    let bg_corr = settings.background_correction() && crd.def_backgrounds().is_some();
    crd.integrals_calc(bg_corr).context("Integration failed")?;

    let table = isotopes.as_deref().map(load_isotopes).transpose()?;
    if let Some(table) = &table {
        crd.integrals_calc_delta(table)
            .context("δ-value calculation failed")?;
    }

    let record = IntegralRecord::from_processor(&crd)
        .context("No integrals were calculated")?;
    record
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let deltas = crd.integrals_delta();
    let rows: Vec<Row<'_>> = record
        .peaks
        .iter()
        .zip(&record.integrals)
        .enumerate()
        .map(|(i, (peak, &integral))| Row {
            peak,
            integral,
            delta: deltas.and_then(|d| {
                let label = table
                    .as_ref()
                    .and_then(|t| normalizing_label(peak, t))?;
                Some((label, d[i]))
            }),
        })
        .collect();
    println!("{}", format_integrals(crd.name(), &rows));

    Ok(())
}

fn normalizing_label(peak: &str, table: &IsotopeTable) -> Option<String> {
    use rimseval::delta::{isotope_name, IsotopeReference};

    let iso = isotope_name(peak)?;
    let (element, _) = iso.split_once('-')?;
    let norm = table.normalizing_isotope(element)?;
    delta_label(&iso, &norm)
}
