use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::gateway::{LineItem, PaymentGateway, SessionRequest};
use super::metadata::{CheckoutMetadata, ItemSnapshot};
use crate::currency::CurrencyService;
use crate::domain::pricing::{round_to_minor_units, to_minor_units};
use crate::errors::{MarketError, MarketResult};
use crate::models::{CurrencyCode, ShippingAddress};
use crate::store::{BagRepository, ProfileDirectory};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

// ============================================================================
// Checkout Initiator
// ============================================================================
//
// Turns a bag (or a single design) into a processor payment session.
// Nothing external is called until the request is known to be valid.
//
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub tailor_id: Uuid,
    pub shipping_address: ShippingAddress,
}

/// Buy one design directly, without a bag
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePurchase {
    pub tailor_id: Uuid,
    pub design_id: Uuid,
    pub price: BigDecimal,
    #[serde(default)]
    pub fabric_index: Option<u32>,
    #[serde(default)]
    pub color_index: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub measurement_ref: Option<String>,
    pub shipping_address: ShippingAddress,
    /// Currency `price` is quoted in; settlement currency when absent
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub redirect_url: String,
    /// Settlement total, rounded to minor units
    pub total: BigDecimal,
    pub currency: CurrencyCode,
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub settlement_currency: CurrencyCode,
    pub gateway_timeout: Duration,
    pub success_url: String,
    pub cancel_url: String,
}

/// One item about to be paid for, priced in the settlement currency
struct PendingItem {
    design_id: Uuid,
    bag_item_id: Option<Uuid>,
    price: BigDecimal,
    fabric_index: Option<u32>,
    color_index: Option<u32>,
    notes: Option<String>,
    measurement_ref: Option<String>,
}

pub struct CheckoutInitiator {
    bags: Arc<dyn BagRepository>,
    profiles: Arc<dyn ProfileDirectory>,
    currency: Arc<CurrencyService>,
    gateway: Arc<dyn PaymentGateway>,
    breaker: CircuitBreaker,
    settings: CheckoutSettings,
}

impl CheckoutInitiator {
    pub fn new(
        bags: Arc<dyn BagRepository>,
        profiles: Arc<dyn ProfileDirectory>,
        currency: Arc<CurrencyService>,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            bags,
            profiles,
            currency,
            gateway,
            breaker: CircuitBreaker::new("payment_gateway", CircuitBreakerConfig::default()),
            settings,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Check out the customer's open bag with one tailor
    pub async fn start(&self, customer_id: Option<Uuid>, request: CheckoutRequest) -> MarketResult<CheckoutRedirect> {
        let customer_id = customer_id.ok_or(MarketError::Unauthenticated)?;
        ensure_address_complete(&request.shipping_address)?;

        let bag = self
            .bags
            .open_bag(customer_id, request.tailor_id)
            .await?
            .filter(|view| !view.is_empty())
            .ok_or_else(|| MarketError::InvalidCheckoutState("bag is empty".to_string()))?;

        let items = bag
            .items
            .into_iter()
            .map(|item| PendingItem {
                design_id: item.design_id,
                bag_item_id: Some(item.id),
                price: item.price,
                fabric_index: item.fabric_index,
                color_index: item.color_index,
                notes: item.notes,
                measurement_ref: item.measurement_ref,
            })
            .collect();

        self.create_session(customer_id, request.tailor_id, request.shipping_address, items)
            .await
    }

    /// Check out a single design without touching any bag
    pub async fn start_single(&self, customer_id: Option<Uuid>, purchase: SinglePurchase) -> MarketResult<CheckoutRedirect> {
        let customer_id = customer_id.ok_or(MarketError::Unauthenticated)?;
        ensure_address_complete(&purchase.shipping_address)?;
        if purchase.price < BigDecimal::from(0) {
            return Err(MarketError::ValidationError("price must not be negative".to_string()));
        }

        let settlement = &self.settings.settlement_currency;
        let price = match &purchase.currency {
            Some(currency) if currency != settlement => {
                self.currency.convert(&purchase.price, currency, settlement).await.amount
            }
            _ => purchase.price,
        };

        let item = PendingItem {
            design_id: purchase.design_id,
            bag_item_id: None,
            price,
            fabric_index: purchase.fabric_index,
            color_index: purchase.color_index,
            notes: purchase.notes,
            measurement_ref: purchase.measurement_ref,
        };

        self.create_session(customer_id, purchase.tailor_id, purchase.shipping_address, vec![item])
            .await
    }

    async fn create_session(
        &self,
        customer_id: Uuid,
        tailor_id: Uuid,
        shipping_address: ShippingAddress,
        items: Vec<PendingItem>,
    ) -> MarketResult<CheckoutRedirect> {
        let settlement = self.settings.settlement_currency.clone();

        let mut snapshots = Vec::with_capacity(items.len());
        let mut line_items = Vec::with_capacity(items.len());
        let mut total = BigDecimal::from(0);

        for item in items {
            let settled = round_to_minor_units(&item.price);
            let amount = to_minor_units(&settled).ok_or_else(|| {
                MarketError::ValidationError(format!("item price {} is out of range", item.price))
            })?;

            total += &settled;
            line_items.push(LineItem {
                design_id: item.design_id,
                amount,
                quantity: 1,
            });
            snapshots.push(ItemSnapshot {
                design_id: item.design_id,
                bag_item_id: item.bag_item_id,
                price: settled,
                fabric_index: item.fabric_index,
                color_index: item.color_index,
                notes: item.notes,
                measurement_ref: item.measurement_ref,
            });
        }

        let expected_total = to_minor_units(&total)
            .ok_or_else(|| MarketError::ValidationError(format!("total {} is out of range", total)))?;
        let (design_id, fabric_selection, color_selection) = match snapshots.first() {
            Some(first) => (first.design_id, first.fabric_index, first.color_index),
            None => return Err(MarketError::InvalidCheckoutState("nothing to check out".to_string())),
        };

        let metadata = CheckoutMetadata {
            customer_id,
            tailor_id,
            shipping_address,
            design_id,
            design_ids: snapshots.iter().map(|s| s.design_id).collect(),
            fabric_selection,
            color_selection,
            bag_item_ids: snapshots.iter().filter_map(|s| s.bag_item_id).collect(),
            items: snapshots,
            expected_total,
            currency: Some(settlement.clone()),
        };

        let customer_email = match self.profiles.profile(customer_id).await {
            Ok(profile) => profile.and_then(|p| p.contact_email().map(str::to_string)),
            Err(e) => {
                tracing::warn!(customer_id = %customer_id, error = %e, "Customer profile unavailable for checkout");
                None
            }
        };

        let request = SessionRequest {
            customer_email,
            line_items,
            currency: settlement.clone(),
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
            metadata,
        };

        let session = self
            .breaker
            .call(self.settings.gateway_timeout, self.gateway.create_session(&request))
            .await
            .map_err(|e| match e {
                CircuitBreakerError::OperationFailed(inner) => MarketError::UpstreamUnavailable(inner.to_string()),
                other => MarketError::UpstreamUnavailable(format!("payment gateway: {}", other)),
            })?;

        tracing::info!(
            customer_id = %customer_id,
            tailor_id = %tailor_id,
            session_id = %session.id,
            total = %total,
            currency = %settlement,
            items = request.line_items.len(),
            "Checkout session created"
        );

        Ok(CheckoutRedirect {
            session_id: session.id,
            redirect_url: session.url,
            total,
            currency: settlement,
        })
    }
}

fn ensure_address_complete(address: &ShippingAddress) -> MarketResult<()> {
    let missing = address.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MarketError::InvalidCheckoutState(format!(
            "shipping address is missing {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::gateway::{CheckoutSession, GatewayError, SandboxPaymentGateway};
    use crate::currency::StaticRateProvider;
    use crate::domain::bag::store::tests::bag_store;
    use crate::domain::bag::{BagStore, NewBagItem};
    use crate::domain::order::aggregate::tests::sample_address;
    use crate::metrics::Metrics;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for CountingGateway {
        async fn create_session(&self, _request: &SessionRequest) -> Result<CheckoutSession, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::Unavailable("offline".to_string()))
        }
    }

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            settlement_currency: CurrencyCode::usd(),
            gateway_timeout: Duration::from_millis(500),
            success_url: "http://localhost/success".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
        }
    }

    fn currency(store: Arc<InMemoryStore>) -> Arc<CurrencyService> {
        Arc::new(CurrencyService::new(
            store,
            Arc::new(StaticRateProvider),
            chrono::Duration::minutes(15),
            Duration::from_millis(200),
            Arc::new(Metrics::new().unwrap()),
        ))
    }

    fn initiator(store: Arc<InMemoryStore>, gateway: Arc<dyn PaymentGateway>) -> CheckoutInitiator {
        CheckoutInitiator::new(store.clone(), store.clone(), currency(store), gateway, settings())
    }

    fn request(tailor_id: Uuid) -> CheckoutRequest {
        CheckoutRequest {
            tailor_id,
            shipping_address: sample_address(),
        }
    }

    async fn add(store: Arc<InMemoryStore>, customer: Uuid, tailor: Uuid, price: &str) {
        add_quoted(bag_store(store), customer, tailor, price, None).await;
    }

    async fn add_quoted(bags: BagStore, customer: Uuid, tailor: Uuid, price: &str, currency: Option<CurrencyCode>) {
        bags.add_item(
            Some(customer),
            NewBagItem {
                tailor_id: tailor,
                design_id: Uuid::new_v4(),
                price: BigDecimal::from_str(price).unwrap(),
                currency,
                notes: None,
                measurement_ref: None,
                fabric_index: Some(1),
                color_index: Some(0),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_bag_checkout_embeds_full_metadata() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(SandboxPaymentGateway::new("http://sandbox.local"));
        let (customer, tailor) = (Uuid::new_v4(), Uuid::new_v4());
        add(store.clone(), customer, tailor, "130").await;
        add(store.clone(), customer, tailor, "39.99").await;

        let redirect = initiator(store, gateway.clone())
            .start(Some(customer), request(tailor))
            .await
            .unwrap();

        assert!(redirect.session_id.starts_with("cs_"));
        assert!(redirect.redirect_url.ends_with(&redirect.session_id));
        assert_eq!(redirect.total, BigDecimal::from_str("169.99").unwrap());

        let session = gateway.session(&redirect.session_id).unwrap();
        let metadata = session.metadata;
        assert_eq!(metadata.customer_id, customer);
        assert_eq!(metadata.tailor_id, tailor);
        assert_eq!(metadata.items.len(), 2);
        assert_eq!(metadata.bag_item_ids.len(), 2);
        assert_eq!(metadata.expected_total, 16999);
        assert_eq!(metadata.fabric_selection, Some(1));
        assert!(metadata.validate().is_ok());
    }

    #[tokio::test]
    async fn test_bag_total_is_fixed_when_items_are_added() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(SandboxPaymentGateway::new("http://sandbox.local"));
        let (customer, tailor) = (Uuid::new_v4(), Uuid::new_v4());
        let ngn = CurrencyCode::new("NGN").unwrap();

        let rates = currency(store.clone());
        let bags = BagStore::new(store.clone(), rates.clone(), CurrencyCode::usd());
        // 15500 NGN at 1550 NGN per USD
        add_quoted(bags, customer, tailor, "15500", Some(ngn.clone())).await;
        add(store.clone(), customer, tailor, "130").await;

        // Naira halves in value before checkout
        rates
            .cache()
            .insert(ngn, CurrencyCode::usd(), BigDecimal::from_str("0.0003225806").unwrap(), chrono::Utc::now());

        let checkout = CheckoutInitiator::new(store.clone(), store.clone(), rates, gateway.clone(), settings());
        let first = checkout.start(Some(customer), request(tailor)).await.unwrap();
        let second = checkout.start(Some(customer), request(tailor)).await.unwrap();

        assert_eq!(first.total, BigDecimal::from(140));
        assert_eq!(second.total, first.total);
        assert_eq!(gateway.session(&first.session_id).unwrap().metadata.expected_total, 14000);
    }

    #[tokio::test]
    async fn test_single_purchase_in_foreign_currency_is_settled() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(SandboxPaymentGateway::new("http://sandbox.local"));

        let purchase = SinglePurchase {
            tailor_id: Uuid::new_v4(),
            design_id: Uuid::new_v4(),
            price: BigDecimal::from(31000),
            fabric_index: None,
            color_index: None,
            notes: None,
            measurement_ref: None,
            shipping_address: sample_address(),
            currency: Some(CurrencyCode::new("NGN").unwrap()),
        };
        let redirect = initiator(store, gateway)
            .start_single(Some(Uuid::new_v4()), purchase)
            .await
            .unwrap();

        assert_eq!(redirect.total, BigDecimal::from(20));
    }

    #[tokio::test]
    async fn test_empty_bag_fails_before_gateway_call() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(CountingGateway::default());

        let result = initiator(store, gateway.clone())
            .start(Some(Uuid::new_v4()), request(Uuid::new_v4()))
            .await;

        assert!(matches!(result, Err(MarketError::InvalidCheckoutState(_))));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_incomplete_address_fails_before_gateway_call() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(CountingGateway::default());
        let (customer, tailor) = (Uuid::new_v4(), Uuid::new_v4());
        add(store.clone(), customer, tailor, "50").await;

        let mut req = request(tailor);
        req.shipping_address.postal_code = " ".to_string();
        let result = initiator(store, gateway.clone()).start(Some(customer), req).await;

        assert!(matches!(result, Err(MarketError::InvalidCheckoutState(_))));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_upstream_unavailable() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(CountingGateway::default());
        let (customer, tailor) = (Uuid::new_v4(), Uuid::new_v4());
        add(store.clone(), customer, tailor, "50").await;

        let result = initiator(store, gateway.clone()).start(Some(customer), request(tailor)).await;
        assert!(matches!(result, Err(MarketError::UpstreamUnavailable(_))));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_purchase_has_no_bag_items() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(SandboxPaymentGateway::new("http://sandbox.local"));

        let purchase = SinglePurchase {
            tailor_id: Uuid::new_v4(),
            design_id: Uuid::new_v4(),
            price: BigDecimal::from(75),
            fabric_index: None,
            color_index: None,
            notes: Some("slim fit".to_string()),
            measurement_ref: None,
            shipping_address: sample_address(),
            currency: None,
        };
        let redirect = initiator(store, gateway.clone())
            .start_single(Some(Uuid::new_v4()), purchase)
            .await
            .unwrap();

        let metadata = gateway.session(&redirect.session_id).unwrap().metadata;
        assert!(metadata.bag_item_ids.is_empty());
        assert_eq!(metadata.items[0].notes.as_deref(), Some("slim fit"));
    }

    #[tokio::test]
    async fn test_anonymous_checkout_is_unauthenticated() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(CountingGateway::default());
        let result = initiator(store, gateway).start(None, request(Uuid::new_v4())).await;
        assert!(matches!(result, Err(MarketError::Unauthenticated)));
    }
}
