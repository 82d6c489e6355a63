use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

const UNIT_TOLERANCE: f64 = 1e-7;

/// Physical flow implied by an incidence column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flow {
    /// Row holding the `-1` entry
    pub source: usize,
    /// Row holding the `+1` entry
    pub destination: usize,
    /// Column of the incidence matrix
    pub column: usize,
}

impl Flow {
    pub fn endpoints(&self) -> (usize, usize) {
        (self.source, self.destination)
    }
}

/// Flows for every column with exactly one `-1` and one `+1` entry and nothing else.
/// External sources/sinks and aggregate columns are skipped.
pub fn get_flows(a: &DMatrix<f64>) -> Vec<Flow> {
    (0..a.ncols())
        .filter_map(|k| {
            let mut source = None;
            let mut destination = None;
            for (row, &value) in a.column(k).iter().enumerate() {
                if (value + 1.0).abs() <= UNIT_TOLERANCE && source.is_none() {
                    source = Some(row);
                } else if (value - 1.0).abs() <= UNIT_TOLERANCE && destination.is_none() {
                    destination = Some(row);
                } else if value.abs() > UNIT_TOLERANCE {
                    return None;
                }
            }
            Some(Flow {
                source: source?,
                destination: destination?,
                column: k,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_flow_from_column() {
        // column 0: +1 at row 2, -1 at row 0
        let a = DMatrix::from_row_slice(3, 1, &[-1.0, 0.0, 1.0]);
        assert_eq!(
            get_flows(&a),
            vec![Flow {
                source: 0,
                destination: 2,
                column: 0
            }]
        );
    }

    #[rstest]
    #[case::external_source(&[1.0, 0.0, 0.0])]
    #[case::external_sink(&[0.0, -1.0, 0.0])]
    #[case::two_destinations(&[1.0, 1.0, -1.0])]
    #[case::aggregate(&[-1.0, 1.0, 0.5])]
    #[case::empty(&[0.0, 0.0, 0.0])]
    fn test_non_flow_columns_excluded(#[case] column: &[f64]) {
        let a = DMatrix::from_column_slice(3, 1, column);
        assert!(get_flows(&a).is_empty());
    }

    #[test]
    fn test_triangle_flows_in_column_order() {
        let a = DMatrix::from_row_slice(
            3,
            4,
            &[
                -1.0, 0.0, -1.0, 1.0, //
                1.0, -1.0, 0.0, 0.0, //
                0.0, 1.0, 1.0, 0.0,
            ],
        );
        let flows: Vec<_> = get_flows(&a).iter().map(|f| (f.source, f.destination, f.column)).collect();
        assert_eq!(flows, vec![(0, 1, 0), (1, 2, 1), (0, 2, 2)]);
    }
}
