use anyhow::Result;

use rimseval::peirce::reject_outliers;

use super::report::format_peirce;

/// Run Peirce's criterion on the given values
pub fn run(values: &[f64]) -> Result<()> {
    if values.len() < 3 {
        log::warn!("Peirce's criterion needs at least three values, nothing is rejected");
    }
    let result = reject_outliers(values);
    println!(
        "{}",
        format_peirce(&result.outliers, result.mean, result.std_dev)
    );
    Ok(())
}
