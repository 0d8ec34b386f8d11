use crate::application::reports::VendorDayTotals;
use crate::domain::catalog::{CatalogSnapshot, VendorId};
use crate::error::Result;
use std::collections::BTreeMap;
use std::io::Write;

/// Writes a day's per-vendor totals as CSV.
///
/// Input is a `BTreeMap`, so rows come out in vendor-id order and the same
/// ledger always produces byte-identical output.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(destination),
        }
    }

    pub fn write_totals(
        &mut self,
        totals: &BTreeMap<VendorId, VendorDayTotals>,
        catalog: Option<&CatalogSnapshot>,
    ) -> Result<()> {
        self.writer
            .write_record(["vendor_id", "vendor", "cash", "cashless", "items"])?;
        for (vendor_id, day_totals) in totals {
            let name = catalog
                .and_then(|c| c.vendor_by_id(*vendor_id))
                .map(|v| v.display_name.clone())
                .unwrap_or_default();
            self.writer.write_record([
                vendor_id.to_string(),
                name,
                day_totals.cash.to_string(),
                day_totals.cashless.to_string(),
                day_totals.item_count.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
