use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use tailor_market::checkout::{CheckoutRequest, SandboxPaymentGateway};
use tailor_market::config::AppConfig;
use tailor_market::currency::StaticRateProvider;
use tailor_market::domain::bag::NewBagItem;
use tailor_market::domain::order::OrderStatus;
use tailor_market::metrics::Metrics;
use tailor_market::models::{Actor, Profile, ShippingAddress};
use tailor_market::notifications::{ChannelError, NotificationChannel, NotificationMessage, NotificationType};
use tailor_market::payments::{PaymentEventOutcome, SignatureVerifier};
use tailor_market::state::{AppState, Integrations, Repositories};
use tailor_market::store::InMemoryStore;
use tailor_market::MarketError;

// ============================================================================
// End-to-end: bag -> checkout -> payment event -> full status workflow
// ============================================================================

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<NotificationMessage>>,
}

impl Outbox {
    fn types_for(&self, email: &str) -> Vec<NotificationType> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.recipient_email == email)
            .map(|m| m.notification_type)
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for Outbox {
    fn name(&self) -> &'static str {
        "outbox"
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Amara Eze".to_string(),
        line1: "4 Allen Avenue".to_string(),
        line2: None,
        city: "Ikeja".to_string(),
        region: Some("Lagos".to_string()),
        postal_code: "100271".to_string(),
        country: "NG".to_string(),
        phone: None,
    }
}

fn item(tailor_id: Uuid, design_id: Uuid, price: &str) -> NewBagItem {
    NewBagItem {
        tailor_id,
        design_id,
        price: BigDecimal::from_str(price).unwrap(),
        currency: None,
        notes: Some("longer sleeves".to_string()),
        measurement_ref: Some("measure-7".to_string()),
        fabric_index: Some(1),
        color_index: Some(0),
    }
}

#[tokio::test]
async fn test_order_lifecycle_from_bag_to_delivery() {
    let store = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(SandboxPaymentGateway::new("http://pay.test"));
    let outbox = Arc::new(Outbox::default());
    let config = AppConfig::default();
    let verifier = SignatureVerifier::new(config.webhook_secret.clone(), config.signature_tolerance);

    let state = AppState::new(
        config,
        Repositories::in_memory(store.clone()),
        Integrations {
            rate_provider: Arc::new(StaticRateProvider),
            payment_gateway: gateway.clone(),
            notification_channel: outbox.clone(),
        },
        Arc::new(Metrics::new().unwrap()),
    );

    let (customer, tailor, other_tailor) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (agbada, kaftan) = (Uuid::new_v4(), Uuid::new_v4());
    store
        .put_profile(Profile {
            user_id: customer,
            display_name: "Amara".to_string(),
            email: Some("amara@example.com".to_string()),
        })
        .await;
    store
        .put_profile(Profile {
            user_id: tailor,
            display_name: "Ade Couture".to_string(),
            email: Some("ade@example.com".to_string()),
        })
        .await;
    store.put_design(agbada, 3).await;
    store.put_design(kaftan, 1).await;

    // Shopping
    state.bags.add_item(Some(customer), item(tailor, agbada, "40")).await.unwrap();
    state.bags.add_item(Some(customer), item(tailor, kaftan, "60.50")).await.unwrap();
    state
        .bags
        .add_item(Some(customer), item(other_tailor, Uuid::new_v4(), "15"))
        .await
        .unwrap();

    // Checkout
    let redirect = state
        .checkout
        .start(
            Some(customer),
            CheckoutRequest {
                tailor_id: tailor,
                shipping_address: address(),
            },
        )
        .await
        .unwrap();
    assert_eq!(redirect.total, BigDecimal::from_str("100.50").unwrap());

    // Payment confirmation, delivered twice
    let payload = serde_json::to_vec(&gateway.completion_event(&redirect.session_id).unwrap()).unwrap();
    let signature = verifier.sign(&payload, chrono::Utc::now().timestamp()).unwrap();

    let outcome = state.payments.handle(&payload, Some(&signature)).await.unwrap();
    let PaymentEventOutcome::OrderCreated { order, notifications } = outcome else {
        panic!("first delivery should create the order");
    };
    assert!(notifications.all_delivered());
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total_amount, BigDecimal::from_str("100.50").unwrap());

    let replay = state.payments.handle(&payload, Some(&signature)).await.unwrap();
    assert!(matches!(replay, PaymentEventOutcome::AlreadyProcessed { order_id } if order_id == order.id));

    // Only the purchased bag was consumed
    let remaining = state.bags.get(customer).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].bag.tailor_id, other_tailor);

    // Workflow
    let tailor_actor = Actor::tailor(tailor);
    let admin = Actor::admin(Uuid::new_v4());

    let accepted = state
        .orders
        .transition(order.id, &tailor_actor, OrderStatus::Accepted, None)
        .await
        .unwrap();
    let eta = accepted.order.estimated_completion.unwrap();
    assert!(eta > chrono::Utc::now() + chrono::Duration::weeks(3));

    for status in [OrderStatus::InProgress, OrderStatus::ReadyToShip] {
        state.orders.transition(order.id, &tailor_actor, status, None).await.unwrap();
    }

    let forbidden = state
        .orders
        .transition(order.id, &tailor_actor, OrderStatus::Shipped, None)
        .await;
    assert!(matches!(forbidden, Err(MarketError::Forbidden(_))));

    state.orders.transition(order.id, &admin, OrderStatus::Shipped, None).await.unwrap();
    let delivered = state
        .orders
        .transition(order.id, &Actor::customer(customer), OrderStatus::Delivered, None)
        .await
        .unwrap();
    assert_eq!(delivered.order.status, OrderStatus::Delivered);

    let too_late = state
        .orders
        .transition(order.id, &admin, OrderStatus::Cancelled, None)
        .await;
    assert!(matches!(too_late, Err(MarketError::InvalidTransition { .. })));

    assert_eq!(
        outbox.types_for("amara@example.com"),
        vec![
            NotificationType::OrderPlaced,
            NotificationType::OrderAccepted,
            NotificationType::OrderInProgress,
            NotificationType::OrderReadyToShip,
            NotificationType::OrderShipped,
            NotificationType::OrderDelivered,
        ]
    );
    assert_eq!(
        outbox.types_for("ade@example.com"),
        vec![NotificationType::OrderPlaced, NotificationType::OrderDelivered]
    );
}
