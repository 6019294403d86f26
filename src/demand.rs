//! Demand table text format: one row per day, one comma-separated column per
//! shift, non-negative integers. Row and column counts define the number of
//! days and shifts.

use crate::error::SolveError;

pub fn parse_demand_table(text: &str) -> Result<Vec<Vec<u32>>, SolveError> {
    parse_demand_table_within(text, usize::MAX, usize::MAX)
}

/// Like [`parse_demand_table`], but stops as soon as the table grows past
/// `max_days` rows or `max_shifts` columns.
pub fn parse_demand_table_within(
    text: &str,
    max_days: usize,
    max_shifts: usize,
) -> Result<Vec<Vec<u32>>, SolveError> {
    let mut rows: Vec<Vec<u32>> = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if rows.len() == max_days {
            return Err(SolveError::invalid(format!(
                "demand table has more than {max_days} days"
            )));
        }
        if line.split(',').count() > max_shifts {
            return Err(SolveError::invalid(format!(
                "demand table line {} has more than {max_shifts} shifts",
                line_no + 1
            )));
        }
        let row = line
            .split(',')
            .map(|cell| {
                let cell = cell.trim();
                cell.parse::<u32>().map_err(|_| {
                    SolveError::invalid(format!(
                        "demand table line {}: '{}' is not a non-negative integer",
                        line_no + 1,
                        cell
                    ))
                })
            })
            .collect::<Result<Vec<u32>, SolveError>>()?;

        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(SolveError::invalid(format!(
                    "demand table line {} has {} columns, expected {}",
                    line_no + 1,
                    row.len(),
                    first.len()
                )));
            }
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(SolveError::invalid("demand table is empty"));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_skips_blank_lines() {
        let table = parse_demand_table("2, 3,1\n\n1,1,0\r\n").unwrap();
        assert_eq!(table, vec![vec![2, 3, 1], vec![1, 1, 0]]);
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = parse_demand_table("1,2\n3\n").unwrap_err();
        assert!(err.to_string().contains("line 2 has 1 columns, expected 2"));
    }

    #[test]
    fn rejects_negative_and_non_numeric_cells() {
        assert!(parse_demand_table("1,-2\n").is_err());
        assert!(parse_demand_table("1,x\n").is_err());
        assert!(parse_demand_table("1,,2\n").is_err());
    }

    #[test]
    fn bounded_parse_stops_at_the_limits() {
        assert!(parse_demand_table_within("1,1\n1,1\n", 2, 2).is_ok());
        let err = parse_demand_table_within("1\n1\n1\n", 2, 5).unwrap_err();
        assert!(err.to_string().contains("more than 2 days"));
        let err = parse_demand_table_within("1,1,1\n", 5, 2).unwrap_err();
        assert!(err.to_string().contains("more than 2 shifts"));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_demand_table(" \n\n").is_err());
    }
}
