use crate::uncertainty::UncertaintyBound;
use polars::prelude::*;

pub const TIME_COLUMN_NAME: &str = "time";
pub const VOLTAGE_COLUMN_NAME: &str = "voltage";
pub const ERROR_COLUMN_NAME: &str = "error";

/// Calibrated readings, oldest first, with the error bound valid for them.
#[derive(Debug, Clone, PartialEq)]
pub struct Readings {
    pub voltages: Vec<f64>,
    pub uncertainty: UncertaintyBound,
    /// Spacing between readings in seconds, when known.
    pub sample_period: Option<f64>,
}

impl Readings {
    pub fn new(voltages: Vec<f64>, uncertainty: UncertaintyBound) -> Self {
        Self {
            voltages,
            uncertainty,
            sample_period: None,
        }
    }

    pub fn with_sample_period(mut self, period: f64) -> Self {
        self.sample_period = Some(period);
        self
    }

    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }

    /// Error bar of every reading, in volts.
    pub fn error_bars(&self) -> Vec<f64> {
        self.voltages
            .iter()
            .map(|&v| self.uncertainty.error_for(v))
            .collect()
    }

    /// Frame with a `voltage` and an `error` column, led by a `time` column when
    /// the sample period is known.
    pub fn to_dataframe(&self) -> Result<DataFrame, PolarsError> {
        #[cfg(feature = "cpu-profiling")]
        let _zone = tracy_client::Client::running()
        .map(|client| client.span(tracy_client::span_location!("to_dataframe"), 0));

        let columns: Vec<Column> = vec![
            Series::new(VOLTAGE_COLUMN_NAME.into(), &self.voltages).into(),
            Series::new(ERROR_COLUMN_NAME.into(), self.error_bars()).into(),
        ];
        let df = DataFrame::new(columns)?;

        let mut selection = vec![col(VOLTAGE_COLUMN_NAME), col(ERROR_COLUMN_NAME)];
        let mut lf = df.lazy();

        if let Some(period) = self.sample_period {
            lf = lf.with_row_index("row_index", Some(0)).with_column(
                (col("row_index").cast(DataType::Float64) * lit(period)).alias(TIME_COLUMN_NAME),
            );
            selection.insert(0, col(TIME_COLUMN_NAME));
        }

        lf.select(selection).collect()
    }

    /// Write [`to_dataframe`](Self::to_dataframe) as CSV with a header row.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<(), PolarsError> {
        let mut df = self.to_dataframe()?;
        CsvWriter::new(writer).include_header(true).finish(&mut df)
    }
}
