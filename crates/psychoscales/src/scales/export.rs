use std::io::Write;

use chrono::SecondsFormat;

use super::responses::StoredResponse;
use super::validation::ValidatedScale;

/// Leading columns of every export, in order.
pub const METADATA_COLUMNS: [&str; 7] = [
    "response_id",
    "scale_id",
    "created_at",
    "user_id",
    "user_agent",
    "client_ip",
    "location",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV output: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat tabular view of stored responses for one scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    /// One row per response: metadata, raw answers in item order, then `{name}_sum` and
    /// `{name}_avg` per subscale. Anything missing is an empty cell.
    pub fn shape(scale: &ValidatedScale, responses: &[StoredResponse]) -> Self {
        let mut header: Vec<String> = METADATA_COLUMNS
            .iter()
            .map(|column| column.to_string())
            .collect();
        header.extend(scale.items().keys().map(|item| item.field_name()));
        for name in scale.subscales().keys() {
            header.push(format!("{name}_sum"));
            header.push(format!("{name}_avg"));
        }

        let rows = responses
            .iter()
            .map(|response| shape_row(scale, response))
            .collect();

        Self { header, rows }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.header)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, ExportError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(buffer)
    }
}

fn shape_row(scale: &ValidatedScale, response: &StoredResponse) -> Vec<String> {
    let context = &response.context;
    let mut row = vec![
        response.response_id.0.clone(),
        response.scale_id.clone(),
        context
            .submitted_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        context.user_id.clone().unwrap_or_default(),
        context.user_agent.clone().unwrap_or_default(),
        context.client_ip.clone().unwrap_or_default(),
        context.location.clone().unwrap_or_default(),
    ];

    row.extend(scale.items().keys().map(|item| {
        response
            .answers
            .for_item(*item)
            .map(str::to_string)
            .unwrap_or_default()
    }));

    for name in scale.subscales().keys() {
        match response.result.get(name) {
            Some(score) => {
                row.push(score.sum.to_string());
                row.push(format!("{:.2}", score.average));
            }
            None => {
                row.push(String::new());
                row.push(String::new());
            }
        }
    }

    row
}
