use crate::core::{ScanFilter, Winner};
use crate::error::ScanError;
use std::fmt::{self, Display};

/// Names of the fields shown for the winning item.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFields {
    pub discriminator: String,
    pub title: String,
    pub reference: String,
    pub state: String,
}

#[derive(Debug, PartialEq)]
pub struct WinnerReport {
    fields: ReportFields,
    title: String,
    title_length: usize,
    discriminator: String,
    reference: String,
    state: String,
}

impl WinnerReport {
    /// Fails on the first field the winner does not carry; no defaults are substituted.
    /// The title must be text so the printed length matches the printed title.
    pub fn new(winner: &Winner, fields: &ReportFields) -> Result<Self, ScanError> {
        let item = &winner.item;
        let title = item.require_text(&fields.title)?;
        Ok(Self {
            title: title.to_string(),
            title_length: title.chars().count(),
            discriminator: item.require(&fields.discriminator)?.to_string(),
            reference: item.require(&fields.reference)?.to_string(),
            state: item.require(&fields.state)?.to_string(),
            fields: fields.clone(),
        })
    }
}

impl Display for WinnerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Entry with the longest '{}':", self.fields.title)?;
        writeln!(f, "{}: {}", self.fields.title, self.title)?;
        writeln!(f, "Length: {} characters", self.title_length)?;
        writeln!(f, "{}: {}", self.fields.discriminator, self.discriminator)?;
        writeln!(f, "URL: {}", self.reference)?;
        write!(f, "{}: {}", self.fields.state, self.state)
    }
}

pub fn no_items_message(filter: &ScanFilter) -> String {
    format!(
        "No entries found with {} = '{}' and {} != '{}'",
        filter.discriminator_field,
        filter.discriminator_value,
        filter.state_field,
        filter.excluded_state
    )
}
