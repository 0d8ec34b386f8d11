use crate::application::ledger::Receipt;
use crate::domain::action::Action;
use crate::domain::cart::{AddOutcome, Cart};
use crate::domain::catalog::{CatalogSnapshot, Vendor, VendorId};
use crate::domain::session::{CancelFlag, PendingCommit, Session, SessionState};
use crate::domain::transaction::PaymentMode;
use crate::error::CommitError;
use crate::interfaces::render::Reply;
use tracing::{error, info, warn};
use uuid::Uuid;

const EXPIRED_NOTICE: &str = "That selection has expired, pick again.";

/// Everything a session's worker can feed into the engine.
#[derive(Debug)]
pub enum SessionEvent {
    /// A parsed inbound payload from the cashier.
    Action(Action),
    /// Completion of a previously dispatched checkout, re-injected on the
    /// session's own queue so per-session ordering holds.
    CommitCompleted {
        nonce: Uuid,
        result: Result<Receipt, CommitError>,
    },
    /// Dispatcher shutdown marker; consumed by the worker, never by the
    /// engine.
    Shutdown,
}

/// A side effect the dispatcher must execute on the engine's behalf. The
/// engine itself never performs I/O.
#[derive(Debug)]
pub enum Command {
    Commit {
        nonce: Uuid,
        cancel: CancelFlag,
        cart: Cart,
        vendor_id: VendorId,
        mode: PaymentMode,
    },
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub reply: Option<Reply>,
    pub command: Option<Command>,
}

impl Outcome {
    fn silent() -> Self {
        Self::default()
    }

    fn reply(reply: Reply) -> Self {
        Self {
            reply: Some(reply),
            command: None,
        }
    }
}

/// The per-session purchase state machine.
///
/// Each call is a pure function of (session, event, catalog snapshot): it
/// mutates only the given session and returns render instructions plus at
/// most one command. Events for one session are serialized by its worker,
/// so no synchronization happens here.
pub struct ConversationEngine {
    max_quantity_per_item: u32,
}

impl ConversationEngine {
    pub fn new(max_quantity_per_item: u32) -> Self {
        Self {
            max_quantity_per_item,
        }
    }

    pub fn handle(
        &self,
        session: &mut Session,
        event: SessionEvent,
        catalog: Option<&CatalogSnapshot>,
    ) -> Outcome {
        session.touch();
        match event {
            SessionEvent::CommitCompleted { nonce, result } => {
                self.apply_commit_result(session, nonce, result)
            }
            SessionEvent::Shutdown => Outcome::silent(),
            SessionEvent::Action(action) => self.apply_action(session, action, catalog),
        }
    }

    fn apply_action(
        &self,
        session: &mut Session,
        action: Action,
        catalog: Option<&CatalogSnapshot>,
    ) -> Outcome {
        if action == Action::Cancel {
            return self.cancel(session);
        }

        if session.state == SessionState::Confirming {
            if session.pending_commit.is_none() {
                error!(
                    session = %session.id,
                    "session in Confirming with no pending commit, resetting"
                );
                session.reset_to_idle();
                return Outcome::reply(main_menu(
                    "Something went wrong and your session was reset.",
                ));
            }
            return Outcome::reply(Reply::text(
                "Payment is being recorded, one moment. Cancel to abandon it.",
            ));
        }

        let Some(catalog) = catalog else {
            return Outcome::reply(Reply::text(
                "The catalog is still loading, try again shortly.",
            ));
        };

        match action {
            Action::Start | Action::ListVendors => self.show_vendors(session, catalog),
            Action::SelectVendor(id) => self.select_vendor(session, id, catalog),
            Action::SelectProduct(id) => self.select_product(session, id, catalog),
            Action::AddToCart => self.add_to_cart(session, catalog),
            Action::ViewCart => self.show_cart(session, catalog),
            Action::RemoveItem(id) => self.remove_item(session, id, catalog),
            Action::ContinueShopping => self.continue_shopping(session, catalog),
            Action::Checkout => self.checkout(session, catalog),
            Action::Pay(mode) => self.pay(session, mode, catalog),
            // Resolved by the dispatcher before the engine sees them.
            Action::Cancel
            | Action::Totals
            | Action::TotalsFor(_)
            | Action::VendorTotals(..)
            | Action::Refresh => Outcome::silent(),
        }
    }

    fn show_vendors(&self, session: &mut Session, catalog: &CatalogSnapshot) -> Outcome {
        session.state = SessionState::VendorList;
        session.selected_vendor = None;
        session.selected_product = None;
        Outcome::reply(vendor_list_reply(catalog, &session.cart, None))
    }

    fn select_vendor(
        &self,
        session: &mut Session,
        id: VendorId,
        catalog: &CatalogSnapshot,
    ) -> Outcome {
        if session.state == SessionState::Idle {
            return self.expired(session, catalog);
        }
        let Some(vendor) = catalog.vendor_by_id(id) else {
            session.state = SessionState::VendorList;
            session.selected_vendor = None;
            session.selected_product = None;
            return Outcome::reply(vendor_list_reply(
                catalog,
                &session.cart,
                Some(EXPIRED_NOTICE),
            ));
        };
        session.selected_vendor = Some(id);
        session.selected_product = None;
        session.state = SessionState::ProductList;
        Outcome::reply(product_list_reply(catalog, vendor, &session.cart, None))
    }

    fn select_product(
        &self,
        session: &mut Session,
        id: crate::domain::catalog::ProductId,
        catalog: &CatalogSnapshot,
    ) -> Outcome {
        // Also reachable from the cart view: a product button from an older
        // message re-opens the detail, as long as the id still checks out.
        if !matches!(
            session.state,
            SessionState::ProductList | SessionState::ProductDetail | SessionState::Cart
        ) {
            return self.expired(session, catalog);
        }
        let Some(vendor_id) = session.selected_vendor else {
            return self.expired(session, catalog);
        };

        match catalog.product_by_id(id) {
            Some(product) if product.vendor_id == vendor_id => {
                session.selected_product = Some(id);
                session.state = SessionState::ProductDetail;
                Outcome::reply(product_detail_reply(catalog, product, &session.cart))
            }
            _ => {
                session.selected_product = None;
                match catalog.vendor_by_id(vendor_id) {
                    Some(vendor) => {
                        session.state = SessionState::ProductList;
                        Outcome::reply(product_list_reply(
                            catalog,
                            vendor,
                            &session.cart,
                            Some(EXPIRED_NOTICE),
                        ))
                    }
                    None => {
                        session.selected_vendor = None;
                        session.state = SessionState::VendorList;
                        Outcome::reply(vendor_list_reply(
                            catalog,
                            &session.cart,
                            Some(EXPIRED_NOTICE),
                        ))
                    }
                }
            }
        }
    }

    fn add_to_cart(&self, session: &mut Session, catalog: &CatalogSnapshot) -> Outcome {
        // The selected product stays set after the first add, so tapping the
        // add button again from the cart view increments the quantity.
        if !matches!(
            session.state,
            SessionState::ProductDetail | SessionState::Cart
        ) {
            return self.expired(session, catalog);
        }
        let Some(product) = session
            .selected_product
            .and_then(|id| catalog.product_by_id(id))
        else {
            session.state = SessionState::ProductList;
            session.selected_product = None;
            return self.expired(session, catalog);
        };

        // Carts stay single-vendor so one checkout settles with one vendor.
        if let Some(cart_vendor) = session.cart.vendor_of(catalog)
            && cart_vendor != product.vendor_id
        {
            let name = catalog
                .vendor_by_id(cart_vendor)
                .map(|v| v.display_name.clone())
                .unwrap_or_else(|| format!("vendor {cart_vendor}"));
            return Outcome::reply(
                Reply::text(format!(
                    "Your cart holds items from {name}. Check out or clear it before adding another vendor's products."
                ))
                .with_button("View cart", Action::ViewCart)
                .with_button("Clear cart", Action::Cancel),
            );
        }

        match session.cart.add(product.id, self.max_quantity_per_item) {
            AddOutcome::Capped { cap } => Outcome::reply(
                Reply::text(format!("Quantity limit of {cap} per item reached."))
                    .with_button("View cart", Action::ViewCart)
                    .with_button("Keep shopping", Action::ContinueShopping),
            ),
            AddOutcome::Added { quantity } => {
                session.state = SessionState::Cart;
                let notice = format!("Added '{}' (x{quantity}).", product.title);
                Outcome::reply(cart_reply(catalog, &session.cart, Some(&notice)))
            }
        }
    }

    fn show_cart(&self, session: &mut Session, catalog: &CatalogSnapshot) -> Outcome {
        session.state = SessionState::Cart;
        Outcome::reply(cart_reply(catalog, &session.cart, None))
    }

    fn remove_item(
        &self,
        session: &mut Session,
        id: crate::domain::catalog::ProductId,
        catalog: &CatalogSnapshot,
    ) -> Outcome {
        if session.state != SessionState::Cart {
            return self.expired(session, catalog);
        }
        if !session.cart.remove(id) {
            return Outcome::reply(cart_reply(catalog, &session.cart, Some(EXPIRED_NOTICE)));
        }
        if session.cart.is_empty() {
            session.state = SessionState::VendorList;
            Outcome::reply(vendor_list_reply(
                catalog,
                &session.cart,
                Some("Cart is empty now."),
            ))
        } else {
            Outcome::reply(cart_reply(catalog, &session.cart, Some("Removed.")))
        }
    }

    fn continue_shopping(&self, session: &mut Session, catalog: &CatalogSnapshot) -> Outcome {
        if let Some(vendor) = session
            .selected_vendor
            .and_then(|id| catalog.vendor_by_id(id))
        {
            session.state = SessionState::ProductList;
            Outcome::reply(product_list_reply(catalog, vendor, &session.cart, None))
        } else {
            session.state = SessionState::VendorList;
            session.selected_vendor = None;
            Outcome::reply(vendor_list_reply(catalog, &session.cart, None))
        }
    }

    fn checkout(&self, session: &mut Session, catalog: &CatalogSnapshot) -> Outcome {
        if session.state != SessionState::Cart {
            return self.expired(session, catalog);
        }
        if session.cart.is_empty() {
            return Outcome::reply(
                Reply::text("Your cart is empty.").with_button("Browse vendors", Action::ListVendors),
            );
        }
        if session.has_active_commit() {
            return Outcome::reply(Reply::text(
                "A payment is already being recorded for this session.",
            ));
        }
        let total = match session.cart.total(catalog) {
            Ok(total) => total,
            Err(_) => {
                return Outcome::reply(cart_reply(
                    catalog,
                    &session.cart,
                    Some("The catalog changed and some items are no longer available. Remove them to continue."),
                ));
            }
        };
        session.state = SessionState::PaymentSelect;
        Outcome::reply(
            Reply::text(format!("Total to pay: {total}\nChoose a payment method:"))
                .with_button("Cash", Action::Pay(PaymentMode::Cash))
                .with_button("Cashless", Action::Pay(PaymentMode::Cashless))
                .with_button("Back to cart", Action::ViewCart),
        )
    }

    fn pay(&self, session: &mut Session, mode: PaymentMode, catalog: &CatalogSnapshot) -> Outcome {
        if session.state != SessionState::PaymentSelect {
            return self.expired(session, catalog);
        }
        let (total, vendor_id) = match (
            session.cart.total(catalog),
            session.cart.vendor_of(catalog),
        ) {
            (Ok(total), Some(vendor_id)) if !session.cart.is_empty() => (total, vendor_id),
            _ => {
                session.state = SessionState::Cart;
                return Outcome::reply(cart_reply(
                    catalog,
                    &session.cart,
                    Some("The cart can no longer be checked out as-is."),
                ));
            }
        };

        let nonce = Uuid::new_v4();
        let cancel = CancelFlag::new();
        session.pending_commit = Some(PendingCommit {
            nonce,
            cancel: cancel.clone(),
        });
        session.state = SessionState::Confirming;
        info!(
            session = %session.id,
            %nonce,
            %mode,
            %total,
            "checkout dispatched"
        );

        let reply = match (mode, catalog.vendor_by_id(vendor_id)) {
            (PaymentMode::Cashless, Some(vendor)) if !vendor.payment_ref.is_empty() => {
                Reply::text(format!(
                    "Recording a cashless sale of {total}.\nAsk the buyer to scan {}'s payment code.",
                    vendor.display_name
                ))
                .with_image(vendor.payment_ref.clone())
            }
            _ => Reply::text(format!("Recording a {mode} sale of {total}…")),
        };

        Outcome {
            reply: Some(reply.with_button("Cancel", Action::Cancel)),
            command: Some(Command::Commit {
                nonce,
                cancel,
                cart: session.cart.clone(),
                vendor_id,
                mode,
            }),
        }
    }

    fn cancel(&self, session: &mut Session) -> Outcome {
        if let Some(pending) = &session.pending_commit {
            // Stops future retries only; a dispatched append runs to its end
            // and its completion is matched by nonce later.
            pending.cancel.cancel();
        }
        session.reset_to_idle();
        info!(session = %session.id, "session cancelled");
        Outcome::reply(main_menu("Cancelled. The cart was discarded."))
    }

    fn apply_commit_result(
        &self,
        session: &mut Session,
        nonce: Uuid,
        result: Result<Receipt, CommitError>,
    ) -> Outcome {
        let is_current = session
            .pending_commit
            .as_ref()
            .is_some_and(|p| p.nonce == nonce);
        if !is_current {
            info!(session = %session.id, %nonce, "stale commit completion discarded");
            return Outcome::silent();
        }
        session.pending_commit = None;

        match result {
            Ok(receipt) => {
                if session.state == SessionState::Confirming {
                    session.reset_to_idle();
                }
                info!(
                    session = %session.id,
                    lines = receipt.transactions.len(),
                    total = %receipt.total,
                    mode = %receipt.payment_mode,
                    "sale recorded"
                );
                Outcome::reply(main_menu(&format!(
                    "Sale recorded: {} item line(s), total {} ({}).",
                    receipt.transactions.len(),
                    receipt.total,
                    receipt.payment_mode
                )))
            }
            Err(CommitError::Cancelled) => {
                info!(session = %session.id, %nonce, "cancelled commit wound down");
                Outcome::silent()
            }
            Err(err @ CommitError::Transient { .. }) => {
                warn!(session = %session.id, error = %err, "commit failed, cart preserved");
                if session.state == SessionState::Confirming {
                    session.state = SessionState::Cart;
                    Outcome::reply(
                        Reply::text(
                            "The ledger is not responding and the sale was NOT recorded. \
                             Your cart is intact — try checking out again.",
                        )
                        .with_button("View cart", Action::ViewCart),
                    )
                } else {
                    Outcome::reply(Reply::text(
                        "A background payment attempt did not go through; no sale was recorded.",
                    ))
                }
            }
            Err(err @ CommitError::Permanent(_)) => {
                error!(session = %session.id, error = %err, "commit rejected by ledger");
                if session.state == SessionState::Confirming {
                    session.state = SessionState::Cart;
                }
                Outcome::reply(
                    Reply::text(
                        "The ledger rejected this sale. Your cart is kept; \
                         contact an operator before retrying.",
                    )
                    .with_button("View cart", Action::ViewCart),
                )
            }
        }
    }

    /// Expired/out-of-context input: re-prompt with the current state's
    /// default view instead of transitioning anywhere.
    fn expired(&self, session: &mut Session, catalog: &CatalogSnapshot) -> Outcome {
        let reply = match session.state {
            SessionState::Idle => main_menu(EXPIRED_NOTICE),
            SessionState::VendorList => {
                vendor_list_reply(catalog, &session.cart, Some(EXPIRED_NOTICE))
            }
            SessionState::ProductList | SessionState::ProductDetail => {
                match session
                    .selected_vendor
                    .and_then(|id| catalog.vendor_by_id(id))
                {
                    Some(vendor) => {
                        session.state = SessionState::ProductList;
                        product_list_reply(catalog, vendor, &session.cart, Some(EXPIRED_NOTICE))
                    }
                    None => {
                        session.state = SessionState::VendorList;
                        session.selected_vendor = None;
                        vendor_list_reply(catalog, &session.cart, Some(EXPIRED_NOTICE))
                    }
                }
            }
            SessionState::Cart => cart_reply(catalog, &session.cart, Some(EXPIRED_NOTICE)),
            SessionState::PaymentSelect => match session.cart.total(catalog) {
                Ok(total) => Reply::text(format!(
                    "{EXPIRED_NOTICE}\n\nTotal to pay: {total}\nChoose a payment method:"
                ))
                .with_button("Cash", Action::Pay(PaymentMode::Cash))
                .with_button("Cashless", Action::Pay(PaymentMode::Cashless))
                .with_button("Back to cart", Action::ViewCart),
                Err(_) => cart_reply(catalog, &session.cart, Some(EXPIRED_NOTICE)),
            },
            SessionState::Confirming => {
                Reply::text("Payment is being recorded, one moment.")
            }
        };
        Outcome::reply(reply)
    }
}

fn main_menu(text: &str) -> Reply {
    Reply::text(text)
        .with_button("Start a sale", Action::Start)
        .with_button("Daily totals", Action::Totals)
}

fn vendor_list_reply(catalog: &CatalogSnapshot, cart: &Cart, notice: Option<&str>) -> Reply {
    if catalog.vendors().is_empty() {
        return Reply::text("No vendors are available yet, try again shortly.");
    }
    let mut text = String::new();
    if let Some(notice) = notice {
        text.push_str(notice);
        text.push_str("\n\n");
    }
    text.push_str("Choose a vendor:");
    let mut reply = Reply::text(text);
    for vendor in catalog.vendors() {
        reply = reply.with_button(vendor.display_name.clone(), Action::SelectVendor(vendor.id));
    }
    if !cart.is_empty() {
        reply = reply.with_button("View cart", Action::ViewCart);
    }
    reply
}

fn product_list_reply(
    catalog: &CatalogSnapshot,
    vendor: &Vendor,
    cart: &Cart,
    notice: Option<&str>,
) -> Reply {
    let products = catalog.products_of(vendor.id);
    let mut text = String::new();
    if let Some(notice) = notice {
        text.push_str(notice);
        text.push_str("\n\n");
    }
    if products.is_empty() {
        text.push_str(&format!("{} has no products yet.", vendor.display_name));
        return Reply::text(text).with_button("Back to vendors", Action::ListVendors);
    }
    text.push_str(&format!("Products from {}:", vendor.display_name));
    let mut reply = Reply::text(text);
    for product in products {
        reply = reply.with_button(
            format!("{} — {}", product.title, product.price),
            Action::SelectProduct(product.id),
        );
    }
    reply = reply.with_button("Back to vendors", Action::ListVendors);
    if !cart.is_empty() {
        reply = reply.with_button("View cart", Action::ViewCart);
    }
    reply
}

fn product_detail_reply(
    catalog: &CatalogSnapshot,
    product: &crate::domain::catalog::Product,
    cart: &Cart,
) -> Reply {
    let vendor_name = catalog
        .vendor_by_id(product.vendor_id)
        .map(|v| v.display_name.as_str())
        .unwrap_or("unknown vendor");
    let mut text = format!(
        "{}\nby {}\nPrice: {}",
        product.title, vendor_name, product.price
    );
    if !product.description.is_empty() {
        text.push_str("\n\n");
        text.push_str(&product.description);
    }
    let mut reply = Reply::text(text)
        .with_image(product.image_ref.clone())
        .with_button("Add to cart", Action::AddToCart)
        .with_button("Back to products", Action::SelectVendor(product.vendor_id));
    if !cart.is_empty() {
        reply = reply.with_button("View cart", Action::ViewCart);
    }
    reply
}

fn cart_reply(catalog: &CatalogSnapshot, cart: &Cart, notice: Option<&str>) -> Reply {
    let mut lines: Vec<String> = Vec::new();
    if let Some(notice) = notice {
        lines.push(notice.to_string());
        lines.push(String::new());
    }
    if cart.is_empty() {
        lines.push("Your cart is empty.".to_string());
        return Reply::text(lines.join("\n")).with_button("Browse vendors", Action::ListVendors);
    }

    lines.push("Your cart:".to_string());
    for (i, item) in cart.items().iter().enumerate() {
        match catalog.product_by_id(item.product_id) {
            Some(product) => lines.push(format!(
                "{}. {} x{} — {}",
                i + 1,
                product.title,
                item.quantity,
                product.price.times(item.quantity)
            )),
            None => lines.push(format!("{}. (item no longer available)", i + 1)),
        }
    }
    match cart.total(catalog) {
        Ok(total) => lines.push(format!("Total: {total}")),
        Err(_) => lines.push(
            "Some items are no longer available; remove them to check out.".to_string(),
        ),
    }

    let mut reply = Reply::text(lines.join("\n")).with_button("Checkout", Action::Checkout);
    for item in cart.items() {
        let label = catalog
            .product_by_id(item.product_id)
            .map(|p| format!("Remove {}", p.title))
            .unwrap_or_else(|| format!("Remove item {}", item.product_id));
        reply = reply.with_button(label, Action::RemoveItem(item.product_id));
    }
    reply
        .with_button("Keep shopping", Action::ContinueShopping)
        .with_button("Clear cart", Action::Cancel)
}
