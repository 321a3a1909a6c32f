//! # Operator Commands
//!
//! Parses one line of operator input and runs it against the session's
//! [`Register`]. Every outcome, failures included, comes back as text for the
//! terminal; a checkout error never ends the session.
//!
//! ## Command Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add <sku|id> [qty]          scan an item (qty defaults to 1)           │
//! │  remove <sku|id> [qty]       take units off a line                      │
//! │  discount <amount>           fixed cart discount, e.g. 2.50             │
//! │  discount <percent>%         percentage cart discount, e.g. 10%         │
//! │  clear-discount              drop the cart discount                     │
//! │  total                       show totals                                │
//! │  cart                        show lines and totals                      │
//! │  checkout                    finalize and store the sale               │
//! │  cancel                      abandon the sale, empty the cart           │
//! │  search <text>               look up products by name or sku            │
//! │  help / quit                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt::Write as _;

use tracing::{debug, warn};

use tally_core::{
    CashierId, CatalogError, CheckoutError, Currency, Discount, Money, ProductId, Register,
    Timeouts, Totals,
};
use tally_db::Database;

pub const HELP: &str = "\
Commands:
  add <sku|id> [qty]       add an item (qty defaults to 1)
  remove <sku|id> [qty]    remove units of an item
  discount <amount>        fixed discount, e.g. discount 2.50
  discount <percent>%      percent discount, e.g. discount 10%
  clear-discount           remove the discount
  total                    show totals
  cart                     show cart lines and totals
  checkout                 complete the sale
  cancel                   cancel the sale and empty the cart
  search <text>            find products
  help                     show this help
  quit                     leave the register";

const SEARCH_LIMIT: u32 = 10;

// =============================================================================
// Parsing
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { code: String, quantity: i64 },
    Remove { code: String, quantity: i64 },
    Discount(Discount),
    ClearDiscount,
    Total,
    Cart,
    Checkout,
    Cancel,
    Search(String),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Type a command, or 'help'")]
    Empty,

    #[error("Unknown command '{0}', type 'help'")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Not a whole number: {0}")]
    InvalidQuantity(String),

    #[error("Not a valid amount: {0}")]
    InvalidAmount(String),
}

/// Parses one input line. Amounts are read in `currency`'s minor units.
pub fn parse(line: &str, currency: Currency) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(ParseError::Empty);
    };
    let args: Vec<&str> = words.collect();

    match verb.to_ascii_lowercase().as_str() {
        "add" | "a" => {
            let (code, quantity) = item_args(&args, "add <sku|id> [qty]")?;
            Ok(Command::Add { code, quantity })
        }
        "remove" | "rm" => {
            let (code, quantity) = item_args(&args, "remove <sku|id> [qty]")?;
            Ok(Command::Remove { code, quantity })
        }
        "discount" => match args.as_slice() {
            [value] => parse_discount(value, currency).map(Command::Discount),
            _ => Err(ParseError::Usage("discount <amount> | discount <percent>%")),
        },
        "clear-discount" => Ok(Command::ClearDiscount),
        "total" | "t" => Ok(Command::Total),
        "cart" | "c" => Ok(Command::Cart),
        "checkout" | "pay" => Ok(Command::Checkout),
        "cancel" => Ok(Command::Cancel),
        "search" | "s" => {
            if args.is_empty() {
                return Err(ParseError::Usage("search <text>"));
            }
            Ok(Command::Search(args.join(" ")))
        }
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

fn item_args(args: &[&str], usage: &'static str) -> Result<(String, i64), ParseError> {
    match args {
        [code] => Ok((code.to_string(), 1)),
        [code, qty] => {
            let quantity = qty
                .parse()
                .map_err(|_| ParseError::InvalidQuantity(qty.to_string()))?;
            Ok((code.to_string(), quantity))
        }
        _ => Err(ParseError::Usage(usage)),
    }
}

fn parse_discount(value: &str, currency: Currency) -> Result<Discount, ParseError> {
    match value.strip_suffix('%') {
        Some(percent) => {
            // percent with two decimals is basis points
            let bps = parse_amount(percent, 2)?.minor();
            let bps = u32::try_from(bps).map_err(|_| ParseError::InvalidAmount(value.to_string()))?;
            Ok(Discount::Percent(bps))
        }
        None => Ok(Discount::Amount(parse_amount(value, currency.exponent())?)),
    }
}

/// Reads a decimal like `2.5` as minor units with `exponent` digits.
///
/// No floating point: `2.5` with exponent 2 is exactly 250.
fn parse_amount(text: &str, exponent: u8) -> Result<Money, ParseError> {
    let invalid = || ParseError::InvalidAmount(text.to_string());

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty())
        || !is_digits(whole)
        || !is_digits(frac)
        || frac.len() > usize::from(exponent)
    {
        return Err(invalid());
    }

    let scale = 10_i64.pow(u32::from(exponent));
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac: i64 = if frac.is_empty() {
        0
    } else {
        let pad = 10_i64.pow(u32::from(exponent) - frac.len() as u32);
        frac.parse::<i64>().map_err(|_| invalid())? * pad
    };

    let minor = whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(invalid)?;
    Ok(Money::from_minor(if negative { -minor } else { minor }))
}

// =============================================================================
// Session
// =============================================================================

/// What the loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Continue(String),
    Quit,
}

/// One cashier's register session over the database.
///
/// SKU resolution and search read the catalog directly, under the same
/// catalog timeout the register applies to its own lookups.
pub struct Session {
    register: Register<Database, Database>,
    db: Database,
    currency: Currency,
    timeouts: Timeouts,
}

impl Session {
    pub fn new(db: Database, cashier_id: CashierId, currency: Currency, timeouts: Timeouts) -> Self {
        Session {
            register: Register::new(db.clone(), db.clone(), cashier_id, currency, timeouts),
            db,
            currency,
            timeouts,
        }
    }

    pub fn register(&self) -> &Register<Database, Database> {
        &self.register
    }

    pub async fn handle_line(&mut self, line: &str) -> Reply {
        match parse(line, self.currency) {
            Ok(command) => self.execute(command).await,
            Err(e) => Reply::Continue(e.to_string()),
        }
    }

    pub async fn execute(&mut self, command: Command) -> Reply {
        debug!(?command, "Executing command");

        let text = match command {
            Command::Add { code, quantity } => match self.resolve(&code).await {
                Ok(id) => {
                    let result = self.register.add_item(&id, quantity).await;
                    self.after_mutation(result)
                }
                Err(e) => self.render_error(&e),
            },
            Command::Remove { code, quantity } => match self.resolve(&code).await {
                Ok(id) => {
                    let result = self.register.remove_item(&id, quantity);
                    self.after_mutation(result)
                }
                Err(e) => self.render_error(&e),
            },
            Command::Discount(discount) => {
                let result = self.register.apply_discount(discount);
                self.after_mutation(result)
            }
            Command::ClearDiscount => {
                let totals = self.register.clear_discount();
                self.render_totals(&totals)
            }
            Command::Total => self.render_totals(&self.register.totals()),
            Command::Cart => self.render_cart(),
            Command::Checkout => match self.register.checkout().await {
                Ok(sale) => format!(
                    "✓ Sale {} complete: {} item(s), total {}",
                    sale.receipt_number(),
                    sale.total_quantity(),
                    self.currency.format(sale.grand_total())
                ),
                Err(e) => self.render_error(&e),
            },
            Command::Cancel => {
                self.register.cancel();
                "Sale cancelled, cart cleared".to_string()
            }
            Command::Search(query) => self.search(&query).await,
            Command::Help => HELP.to_string(),
            Command::Quit => return Reply::Quit,
        };

        Reply::Continue(text)
    }

    /// Maps an operator code to a product id: a known SKU first, otherwise
    /// the text itself is taken as the id.
    async fn resolve(&self, code: &str) -> Result<ProductId, CheckoutError> {
        let limit = self.timeouts.catalog;
        match tokio::time::timeout(limit, self.db.products().get_by_sku(code)).await {
            Ok(Ok(Some(product))) => Ok(product.id),
            Ok(Ok(None)) => Ok(ProductId::from(code)),
            Ok(Err(e)) => Err(CheckoutError::CatalogUnavailable(e.into())),
            Err(_) => {
                warn!(sku = code, limit_ms = limit.as_millis() as u64, "SKU lookup timed out");
                Err(CheckoutError::CatalogUnavailable(CatalogError::Timeout(limit)))
            }
        }
    }

    async fn search(&self, query: &str) -> String {
        let limit = self.timeouts.catalog;
        let products =
            match tokio::time::timeout(limit, self.db.products().search(query, SEARCH_LIMIT)).await {
                Ok(Ok(products)) => products,
                Ok(Err(e)) => return format!("✗ Search failed: {}", e),
                Err(_) => {
                    warn!(query, limit_ms = limit.as_millis() as u64, "Product search timed out");
                    return format!("✗ Search failed: {}", CatalogError::Timeout(limit));
                }
            };
        if products.is_empty() {
            return format!("No products match '{}'", query);
        }

        let mut out = String::new();
        for product in products {
            let _ = writeln!(
                out,
                "  {:<14} {:<30} {:>12}  tax {}",
                product.sku,
                product.name,
                self.currency.format(product.unit_price),
                product.tax_rate
            );
        }
        out.trim_end().to_string()
    }

    fn after_mutation(&self, result: Result<Totals, CheckoutError>) -> String {
        match result {
            Ok(_) => self.render_cart(),
            Err(e) => self.render_error(&e),
        }
    }

    fn render_error(&self, err: &CheckoutError) -> String {
        let mut out = format!("✗ {}", err);

        if let CheckoutError::PriceChanged(drifts) = err {
            for drift in drifts {
                let _ = write!(
                    out,
                    "\n  {}: {} → {}",
                    drift.name,
                    self.currency.format(drift.cart_unit_price),
                    self.currency.format(drift.catalog_unit_price)
                );
                if drift.cart_tax_rate != drift.catalog_tax_rate {
                    let _ = write!(out, " (tax {} → {})", drift.cart_tax_rate, drift.catalog_tax_rate);
                }
            }
            out.push_str("\n  Remove and re-add these items to accept the new prices.");
        }
        if err.is_retryable() {
            out.push_str("\n  The cart is unchanged; try again.");
        }

        out.push('\n');
        out.push_str(&self.render_cart());
        out
    }

    fn render_cart(&self) -> String {
        let cart = self.register.cart();
        if cart.is_empty() {
            return "(cart is empty)".to_string();
        }

        let mut out = String::new();
        for line in cart.lines() {
            let _ = writeln!(
                out,
                "  {:<30} {:>4} x {:>12} {:>14}",
                line.name(),
                line.quantity(),
                self.currency.format(line.unit_price()),
                self.currency.format(line.line_total())
            );
        }
        out.push_str(&self.render_totals(&cart.totals()));
        out
    }

    fn render_totals(&self, totals: &Totals) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "  {:<10}{:>14}", "Subtotal", self.currency.format(totals.subtotal));
        if !totals.discount_total.is_zero() {
            let _ = writeln!(
                out,
                "  {:<10}{:>14}",
                "Discount",
                format!("-{}", self.currency.format(totals.discount_total))
            );
        }
        let _ = writeln!(out, "  {:<10}{:>14}", "Tax", self.currency.format(totals.tax_total));
        let _ = write!(out, "  {:<10}{:>14}", "Total", self.currency.format(totals.grand_total));
        out
    }
}
