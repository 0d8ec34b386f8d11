use std::io::Error;
use std::path::{Path, PathBuf};

/// Writes the two catalog sheets the binary and harness tests read:
/// two vendors, three products.
pub fn write_catalog(dir: &Path) -> Result<(PathBuf, PathBuf), Error> {
    let vendors_path = dir.join("vendors.csv");
    let mut wtr = csv::Writer::from_path(&vendors_path)?;
    wtr.write_record(["vendor_id", "name", "payment_ref"])?;
    wtr.write_record(["1", "Aster Press", "https://pay.example/qr/1.png"])?;
    wtr.write_record(["2", "Briar Books", ""])?;
    wtr.flush()?;

    let products_path = dir.join("products.csv");
    let mut wtr = csv::Writer::from_path(&products_path)?;
    wtr.write_record(["product_id", "vendor_id", "title", "price", "image", "description"])?;
    wtr.write_record(["101", "1", "Field Notes", "300", "", "A pocket notebook"])?;
    wtr.write_record(["102", "1", "River Atlas", "450", "", ""])?;
    wtr.write_record(["201", "2", "Night Walks", "250", "", ""])?;
    wtr.flush()?;

    Ok((vendors_path, products_path))
}

/// Writes an event script: one `(session, payload)` row per entry.
pub fn write_events(dir: &Path, rows: &[(i64, &str)]) -> Result<PathBuf, Error> {
    let events_path = dir.join("events.csv");
    let mut wtr = csv::Writer::from_path(&events_path)?;
    wtr.write_record(["session", "payload"])?;
    for (session, payload) in rows {
        wtr.write_record([session.to_string(), (*payload).to_string()])?;
    }
    wtr.flush()?;
    Ok(events_path)
}
