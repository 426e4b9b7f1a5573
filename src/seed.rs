use anyhow::{Context, Result};
use serde_json::json;

use crate::store::{NewRoute, RouteStore};

fn sample_routes() -> Vec<NewRoute> {
    let mut health = NewRoute::new(
        "/api/health",
        json!({"status": "healthy", "service": "mock-server"}),
    );
    health.description = Some("Health check sample".to_string());

    let mut payment = NewRoute::new(
        "/api/payment",
        json!({
            "code": 200,
            "message": "Payment succeeded",
            "data": {
                "order_no": "ORDER_123456",
                "status": "SUCCESS",
                "amount": 100.0
            }
        }),
    );
    payment.methods = vec!["POST".to_string()];
    payment.description = Some("Payment sample".to_string());

    vec![health, payment]
}

/// Insert the sample routes when the store holds no routes at all.
///
/// Returns how many routes were inserted.
pub async fn seed_sample_routes(store: &dyn RouteStore) -> Result<usize> {
    let counts = store
        .counts()
        .await
        .context("Failed to count routes before seeding")?;
    if counts.total > 0 {
        tracing::info!("Store already holds {} routes, skipping sample data", counts.total);
        return Ok(0);
    }

    let mut inserted = 0;
    for route in sample_routes() {
        let path = route.path.clone();
        store
            .create(route)
            .await
            .with_context(|| format!("Failed to insert sample route {}", path))?;
        inserted += 1;
    }

    tracing::info!("Inserted {} sample routes", inserted);
    Ok(inserted)
}
