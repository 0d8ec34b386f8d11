use super::catalog::{ProductId, VendorId};
use super::transaction::PaymentMode;
use chrono::NaiveDate;

/// A parsed inbound payload. Every button the engine emits encodes one of
/// these; every callback the transport delivers is parsed back through
/// [`Action::parse`]. Anything that does not parse is expired input, never
/// a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    ListVendors,
    SelectVendor(VendorId),
    SelectProduct(ProductId),
    AddToCart,
    ViewCart,
    RemoveItem(ProductId),
    ContinueShopping,
    Checkout,
    Pay(PaymentMode),
    Cancel,
    Totals,
    TotalsFor(NaiveDate),
    VendorTotals(VendorId, NaiveDate),
    Refresh,
}

impl Action {
    /// Strict parse of a callback payload. Returns `None` for unknown tags,
    /// malformed ids, or trailing garbage.
    pub fn parse(payload: &str) -> Option<Action> {
        match payload {
            "start" => return Some(Action::Start),
            "vendors" => return Some(Action::ListVendors),
            "add" => return Some(Action::AddToCart),
            "cart" => return Some(Action::ViewCart),
            "shop" => return Some(Action::ContinueShopping),
            "checkout" => return Some(Action::Checkout),
            "cancel" => return Some(Action::Cancel),
            "totals" => return Some(Action::Totals),
            "refresh" => return Some(Action::Refresh),
            _ => {}
        }

        let (tag, rest) = payload.split_once(':')?;
        match tag {
            "vendor" => rest.parse().ok().map(|id| Action::SelectVendor(VendorId(id))),
            "product" => rest
                .parse()
                .ok()
                .map(|id| Action::SelectProduct(ProductId(id))),
            "remove" => rest.parse().ok().map(|id| Action::RemoveItem(ProductId(id))),
            "pay" => match rest {
                "cash" => Some(Action::Pay(PaymentMode::Cash)),
                "cashless" => Some(Action::Pay(PaymentMode::Cashless)),
                _ => None,
            },
            "totals" => parse_date(rest).map(Action::TotalsFor),
            "vendor_totals" => {
                let (id, date) = rest.split_once(':')?;
                Some(Action::VendorTotals(
                    VendorId(id.parse().ok()?),
                    parse_date(date)?,
                ))
            }
            _ => None,
        }
    }

    /// The payload string carried by a button for this action. Guaranteed to
    /// round-trip through [`Action::parse`].
    pub fn encode(&self) -> String {
        match self {
            Action::Start => "start".to_string(),
            Action::ListVendors => "vendors".to_string(),
            Action::SelectVendor(id) => format!("vendor:{id}"),
            Action::SelectProduct(id) => format!("product:{id}"),
            Action::AddToCart => "add".to_string(),
            Action::ViewCart => "cart".to_string(),
            Action::RemoveItem(id) => format!("remove:{id}"),
            Action::ContinueShopping => "shop".to_string(),
            Action::Checkout => "checkout".to_string(),
            Action::Pay(mode) => format!("pay:{mode}"),
            Action::Cancel => "cancel".to_string(),
            Action::Totals => "totals".to_string(),
            Action::TotalsFor(date) => format!("totals:{date}"),
            Action::VendorTotals(id, date) => format!("vendor_totals:{id}:{date}"),
            Action::Refresh => "refresh".to_string(),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
