//! Delimited-text handling: salary-slate validation and `name,points` parsing.

use lineuprelay_shared::{ActualResult, RelayError, Result, normalize_name};

/// Columns every salary slate must carry (matched case-insensitively
/// anywhere in the header line).
pub const REQUIRED_COLUMNS: [&str; 2] = ["name", "salary"];

/// Validate a salary CSV before it is forwarded upstream.
///
/// The text must be non-blank and its first line must mention every
/// [`REQUIRED_COLUMNS`] entry.
pub fn validate_salary_csv(csv: &str) -> Result<()> {
    if csv.trim().is_empty() {
        return Err(RelayError::validation("Missing or empty CSV in request"));
    }

    let header = csv
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches('\u{feff}')
        .to_lowercase();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !header.contains(col))
        .collect();

    if !missing.is_empty() {
        return Err(RelayError::validation_with(
            "Invalid CSV format",
            format!("CSV must contain Name and Salary columns (missing: {})", missing.join(", ")),
        ));
    }

    Ok(())
}

/// Parse `name,points` lines into actual results.
///
/// Blank lines and lines without a name are skipped, as is a header line
/// (`name`/`player` followed by a non-numeric second field). Points that do
/// not parse become `None`.
pub fn parse_points_csv(text: &str) -> Vec<ActualResult> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.split(',');
            let name = normalize_name(parts.next().unwrap_or_default().trim_matches('"'));
            let points_field = parts.next().map(|p| p.trim().trim_matches('"'));
            let actual_points = points_field.and_then(|p| p.parse::<f64>().ok());

            if name.is_empty() || is_header(&name, actual_points) {
                return None;
            }

            Some(ActualResult {
                name,
                actual_points: actual_points.filter(|p| p.is_finite()),
            })
        })
        .collect()
}

fn is_header(name: &str, points: Option<f64>) -> bool {
    points.is_none() && matches!(name.to_lowercase().as_str(), "name" | "player" | "player name")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_draftkings_export() {
        let csv = std::fs::read_to_string("../../../fixtures/csv/dk_salaries.csv")
            .expect("read csv fixture");
        assert!(validate_salary_csv(&csv).is_ok());
    }

    #[test]
    fn rejects_missing_columns() {
        let err = validate_salary_csv("Player,Cost\nA,100").unwrap_err();
        assert_eq!(err.message(), "Invalid CSV format");

        let err = validate_salary_csv("Name,Team\nA,BOS").unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }

    #[test]
    fn header_check_ignores_later_lines() {
        assert!(validate_salary_csv("Pos,Team\nname,salary").is_err());
        assert!(validate_salary_csv("\u{feff}NAME,SALARY\nA,1").is_ok());
    }

    #[test]
    fn rejects_blank_csv() {
        let err = validate_salary_csv("  \n ").unwrap_err();
        assert_eq!(err.message(), "Missing or empty CSV in request");
    }

    #[test]
    fn parses_points_lines() {
        let text = std::fs::read_to_string("../../../fixtures/csv/actuals.csv")
            .expect("read actuals fixture");
        let parsed = parse_points_csv(&text);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].name, "Steph Curry");
        assert_eq!(parsed[0].actual_points, Some(52.25));
        assert_eq!(parsed[1].name, "nikola jokic");
    }

    #[test]
    fn unparseable_points_are_none() {
        let parsed = parse_points_csv("Jayson Tatum, DNP\n ,12\n\nJaylen Brown\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].actual_points, None);
        assert_eq!(parsed[1].name, "Jaylen Brown");
        assert_eq!(parsed[1].actual_points, None);
    }
}
