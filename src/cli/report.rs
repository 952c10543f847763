//! Terminal output of integrals and δ-values.

#[cfg(feature = "colorized_output")]
use console::style;

use rimseval::integrals::Integral;

/// One row of the integral table
pub struct Row<'a> {
    pub peak: &'a str,
    pub integral: Integral,
    pub delta: Option<(String, Integral)>,
}

fn plain_row(row: &Row<'_>) -> String {
    let mut line = format!(
        "  {:<10} {:>14.1} ± {:<10.1}",
        row.peak, row.integral.value, row.integral.uncertainty
    );
    if let Some((label, delta)) = &row.delta {
        if delta.value.is_finite() {
            line.push_str(&format!("  {label} = {:.1} ± {:.1} ‰", delta.value, delta.uncertainty));
        }
    }
    line
}

/// Format a titled integral table
pub fn format_integrals(title: &str, rows: &[Row<'_>]) -> String {
    let mut output = String::new();

    #[cfg(feature = "colorized_output")]
    {
        output.push_str(&format!("{}\n", style(title).bold().cyan()));
        for row in rows {
            let line = plain_row(row);
            if row.integral.value < 0.0 {
                output.push_str(&format!("{}\n", style(line).yellow()));
            } else {
                output.push_str(&format!("{line}\n"));
            }
        }
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        output.push_str(&format!("{title}\n"));
        for row in rows {
            output.push_str(&format!("{}\n", plain_row(row)));
        }
    }

    output
}

/// Format the outcome of Peirce's criterion
pub fn format_peirce(outliers: &[f64], mean: f64, std_dev: f64) -> String {
    let summary = format!("mean = {mean:.4}, standard deviation = {std_dev:.4}");
    let rejected = if outliers.is_empty() {
        "no outliers".to_string()
    } else {
        let values: Vec<String> = outliers.iter().map(|v| v.to_string()).collect();
        format!("outliers: {}", values.join(", "))
    };

    #[cfg(feature = "colorized_output")]
    let rejected = if outliers.is_empty() {
        style(rejected).green().to_string()
    } else {
        style(rejected).red().bold().to_string()
    };

    format!("{rejected}\n{summary}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_row() {
        let row = Row {
            peak: "56Fe",
            integral: Integral::from_counts(100.0),
            delta: Some(("δ(56Fe/56Fe)".to_string(), Integral { value: 0.0, uncertainty: 1.5 })),
        };
        let line = plain_row(&row);
        assert!(line.contains("56Fe"));
        assert!(line.contains("100.0 ± 10.0"));
        assert!(line.contains("δ(56Fe/56Fe) = 0.0 ± 1.5 ‰"));
    }

    #[test]
    fn test_nan_delta_hidden() {
        let row = Row {
            peak: "bg",
            integral: Integral::from_counts(4.0),
            delta: Some(("x".to_string(), Integral { value: f64::NAN, uncertainty: f64::NAN })),
        };
        assert!(!plain_row(&row).contains('‰'));
    }

    #[test]
    fn test_format_peirce() {
        let text = format_peirce(&[89.0, 90.0], 100.9, 1.66);
        assert!(text.contains("89, 90"));
        assert!(text.contains("mean = 100.9000"));
    }
}
