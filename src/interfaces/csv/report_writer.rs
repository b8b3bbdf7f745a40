use crate::domain::commission::Commission;
use crate::error::Result;
use std::io::Write;

/// Writes a commission report as CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_commissions(&mut self, commissions: &[Commission]) -> Result<()> {
        self.writer.write_record([
            "code",
            "employee",
            "base_amount",
            "commission_rate",
            "commission_amount",
            "currency",
            "status",
        ])?;
        for commission in commissions {
            self.writer.write_record([
                commission.code.as_str(),
                &commission.employee.0,
                // Normalized so scale artifacts from arithmetic never leak
                // into the report ("40.00" vs "40").
                &commission.base_amount.normalize().to_string(),
                &commission.commission_percentage.normalize().to_string(),
                &commission.total_amount.normalize().to_string(),
                commission.currency.as_str(),
                &commission.status.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
