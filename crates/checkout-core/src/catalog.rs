//! # Shop Catalog
//!
//! Taxes, payment methods and the shop currency, loaded from TOML:
//!
//! ```toml
//! currency = "CHF"
//!
//! [[taxes]]
//! id = 1
//! name = "VAT 8.1%"
//! percentage = 8.1
//! is_default = true
//!
//! [[payment_methods]]
//! id = 1
//! name = "Invoice"
//! provider = "offline"
//! taxes = [1]
//! ```
//!
//! At most one tax and one payment method carry the default flag. The flag
//! is only moved through [`MemoryCatalog::set_default_tax`] and
//! [`MemoryCatalog::set_default_payment_method`], which clear and set under
//! one write lock.

use crate::cart::Cart;
use crate::currency::Currency;
use crate::error::{CheckoutError, CheckoutResult};
use crate::item::CartItem;
use crate::payment_method::PaymentMethod;
use crate::tax::Tax;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Payment method as written in the catalog file; taxes are referenced by id
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethodEntry {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub taxes: Vec<u32>,
    #[serde(alias = "payment_provider")]
    pub provider: String,
    #[serde(default)]
    pub is_default: bool,
}

/// The catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFile {
    pub currency: Currency,
    #[serde(default)]
    pub taxes: Vec<Tax>,
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethodEntry>,
}

impl CatalogFile {
    pub fn from_toml(raw: &str) -> CheckoutResult<Self> {
        toml::from_str(raw)
            .map_err(|e| CheckoutError::Configuration(format!("Invalid catalog: {}", e)))
    }
}

#[derive(Debug, Clone)]
struct CatalogData {
    currency: Currency,
    taxes: Vec<Tax>,
    methods: Vec<PaymentMethod>,
}

/// In-memory catalog, cheap to clone
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    inner: Arc<RwLock<CatalogData>>,
}

impl MemoryCatalog {
    /// Empty catalog priced in `currency`
    pub fn new(currency: Currency) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CatalogData {
                currency,
                taxes: Vec::new(),
                methods: Vec::new(),
            })),
        }
    }

    pub fn from_file_contents(file: CatalogFile) -> CheckoutResult<Self> {
        for tax in &file.taxes {
            tax.validate()?;
        }
        ensure_single_default("tax", file.taxes.iter().filter(|t| t.is_default).count())?;
        ensure_single_default(
            "payment method",
            file.payment_methods.iter().filter(|m| m.is_default).count(),
        )?;

        let methods = file
            .payment_methods
            .into_iter()
            .map(|entry| resolve_method(entry, &file.taxes))
            .collect::<CheckoutResult<Vec<_>>>()?;

        debug!(
            taxes = file.taxes.len(),
            methods = methods.len(),
            "Catalog loaded"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(CatalogData {
                currency: file.currency,
                taxes: file.taxes,
                methods,
            })),
        })
    }

    pub fn from_toml(raw: &str) -> CheckoutResult<Self> {
        Self::from_file_contents(CatalogFile::from_toml(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> CheckoutResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CheckoutError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Loading catalog");
        Self::from_toml(&raw)
    }

    pub async fn currency(&self) -> Currency {
        self.inner.read().await.currency
    }

    pub async fn taxes(&self) -> Vec<Tax> {
        self.inner.read().await.taxes.clone()
    }

    pub async fn payment_methods(&self) -> Vec<PaymentMethod> {
        self.inner.read().await.methods.clone()
    }

    pub async fn payment_method(&self, id: u32) -> CheckoutResult<PaymentMethod> {
        let data = self.inner.read().await;
        crate::payment_method::find_method(&data.methods, id).cloned()
    }

    pub async fn default_tax(&self) -> Option<Tax> {
        self.inner
            .read()
            .await
            .taxes
            .iter()
            .find(|t| t.is_default)
            .cloned()
    }

    /// The flagged method, or the first one if none is flagged
    pub async fn default_payment_method(&self) -> Option<PaymentMethod> {
        let data = self.inner.read().await;
        data.methods
            .iter()
            .find(|m| m.is_default)
            .or_else(|| data.methods.first())
            .cloned()
    }

    /// Insert or replace a tax. The default flag is left untouched.
    pub async fn upsert_tax(&self, mut tax: Tax) -> CheckoutResult<()> {
        tax.validate()?;
        let mut data = self.inner.write().await;
        match data.taxes.iter_mut().find(|t| t.id == tax.id) {
            Some(existing) => {
                tax.is_default = existing.is_default;
                *existing = tax;
            }
            None => {
                tax.is_default = false;
                data.taxes.push(tax);
            }
        }
        Ok(())
    }

    /// Insert or replace a payment method. The default flag is left untouched.
    pub async fn upsert_payment_method(&self, mut method: PaymentMethod) -> CheckoutResult<()> {
        method.validate()?;
        let mut data = self.inner.write().await;
        match data.methods.iter_mut().find(|m| m.id == method.id) {
            Some(existing) => {
                method.is_default = existing.is_default;
                *existing = method;
            }
            None => {
                method.is_default = false;
                data.methods.push(method);
            }
        }
        Ok(())
    }

    pub async fn set_default_tax(&self, id: u32) -> CheckoutResult<()> {
        let mut data = self.inner.write().await;
        if !data.taxes.iter().any(|t| t.id == id) {
            return Err(CheckoutError::not_found("tax", id));
        }
        for tax in data.taxes.iter_mut() {
            tax.is_default = tax.id == id;
        }
        info!(tax_id = id, "Default tax changed");
        Ok(())
    }

    pub async fn set_default_payment_method(&self, id: u32) -> CheckoutResult<()> {
        let mut data = self.inner.write().await;
        if !data.methods.iter().any(|m| m.id == id) {
            return Err(CheckoutError::not_found("payment method", id));
        }
        for method in data.methods.iter_mut() {
            method.is_default = method.id == id;
        }
        info!(payment_method_id = id, "Default payment method changed");
        Ok(())
    }

    /// Give a cart the shop currency and, if it has none, the default
    /// payment method.
    pub async fn prepare_cart(&self, cart: &mut Cart) -> CheckoutResult<()> {
        if cart.currency().is_none() {
            cart.set_currency(self.currency().await)?;
        }
        if cart.payment_method.is_none() {
            let method = self.default_payment_method().await.ok_or_else(|| {
                CheckoutError::Configuration("No payment method is configured".to_string())
            })?;
            cart.set_payment_method(method);
        }
        Ok(())
    }

    /// Add an item, attaching the default tax when the item has none
    pub async fn add_item(&self, cart: &mut Cart, item: CartItem, quantity: u32) -> Uuid {
        let default_tax = self.default_tax().await;
        cart.add_with_default_tax(item, quantity, default_tax.as_ref())
    }
}

fn ensure_single_default(entity: &str, flagged: usize) -> CheckoutResult<()> {
    if flagged > 1 {
        return Err(CheckoutError::Configuration(format!(
            "Only one {} can be the default, found {}",
            entity, flagged
        )));
    }
    Ok(())
}

fn resolve_method(entry: PaymentMethodEntry, taxes: &[Tax]) -> CheckoutResult<PaymentMethod> {
    let mut method = PaymentMethod::new(entry.id, entry.name, entry.provider)
        .with_price(entry.price)
        .with_percentage(entry.percentage);
    if let Some(code) = entry.code {
        method.code = code;
    }
    method.is_default = entry.is_default;

    for tax_id in entry.taxes {
        let tax = taxes.iter().find(|t| t.id == tax_id).ok_or_else(|| {
            CheckoutError::Configuration(format!(
                "Payment method {} references unknown tax {}",
                method.id, tax_id
            ))
        })?;
        method = method.with_tax(tax.clone());
    }

    method.validate()?;
    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        currency = "CHF"

        [[taxes]]
        id = 1
        name = "VAT"
        percentage = 8.1
        is_default = true

        [[taxes]]
        id = 2
        name = "Reduced"
        percentage = 2.6

        [[payment_methods]]
        id = 1
        name = "Invoice"
        provider = "offline"

        [[payment_methods]]
        id = 2
        name = "Credit Card"
        provider = "stripe"
        price = 30
        percentage = 2.9
        taxes = [1]
    "#;

    #[tokio::test]
    async fn test_load_catalog() {
        let catalog = MemoryCatalog::from_toml(CATALOG).unwrap();

        assert_eq!(catalog.currency().await, Currency::CHF);
        assert_eq!(catalog.default_tax().await.unwrap().id, 1);

        let card = catalog.payment_method(2).await.unwrap();
        assert_eq!(card.code, "credit-card");
        assert_eq!(card.taxes.len(), 1);
        assert!(matches!(
            catalog.payment_method(9).await,
            Err(CheckoutError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_default_method_falls_back_to_first() {
        let catalog = MemoryCatalog::from_toml(CATALOG).unwrap();
        assert_eq!(catalog.default_payment_method().await.unwrap().id, 1);

        catalog.set_default_payment_method(2).await.unwrap();
        assert_eq!(catalog.default_payment_method().await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_single_default_flag() {
        let catalog = MemoryCatalog::from_toml(CATALOG).unwrap();
        catalog.set_default_tax(2).await.unwrap();

        let flagged: Vec<_> = catalog
            .taxes()
            .await
            .into_iter()
            .filter(|t| t.is_default)
            .map(|t| t.id)
            .collect();
        assert_eq!(flagged, vec![2]);
        assert!(catalog.set_default_tax(42).await.is_err());

        // upserting keeps the flag where it is
        catalog
            .upsert_tax(Tax::new(3, "Zero", 0.0).unwrap().as_default())
            .await
            .unwrap();
        assert_eq!(catalog.default_tax().await.unwrap().id, 2);
    }

    #[test]
    fn test_rejects_bad_catalogs() {
        let two_defaults = r#"
            currency = "EUR"
            [[taxes]]
            id = 1
            name = "A"
            percentage = 10.0
            is_default = true
            [[taxes]]
            id = 2
            name = "B"
            percentage = 20.0
            is_default = true
        "#;
        assert!(matches!(
            MemoryCatalog::from_toml(two_defaults),
            Err(CheckoutError::Configuration(_))
        ));

        let unknown_tax = r#"
            currency = "EUR"
            [[payment_methods]]
            id = 1
            name = "Card"
            provider = "stripe"
            taxes = [7]
        "#;
        assert!(MemoryCatalog::from_toml(unknown_tax).is_err());
        assert!(MemoryCatalog::from_toml("currency = \"XXX\"").is_err());
    }

    #[tokio::test]
    async fn test_prepare_cart() {
        let catalog = MemoryCatalog::from_toml(CATALOG).unwrap();
        let mut cart = Cart::new("sess");
        catalog.prepare_cart(&mut cart).await.unwrap();

        assert_eq!(cart.currency(), Some(Currency::CHF));
        assert_eq!(cart.payment_method.as_ref().map(|m| m.id), Some(1));

        let id = catalog.add_item(&mut cart, CartItem::new("Mug", 1500), 2).await;
        assert_eq!(cart.item(id).unwrap().taxes[0].id, 1);

        let empty = MemoryCatalog::new(Currency::EUR);
        assert!(matches!(
            empty.prepare_cart(&mut Cart::new("x")).await,
            Err(CheckoutError::Configuration(_))
        ));
    }
}
