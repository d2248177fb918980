//! Wiring a small order service with Joinery.
//!
//! Run with `RUST_LOG=joinery_container=trace` to watch each resolution step.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use joinery::prelude::*;
use tracing_subscriber::EnvFilter;

// === Domain ===

trait PaymentGateway: Send + Sync {
    fn charge(&self, cents: u64) -> String;
}

#[derive(Component)]
struct FakeGateway {
    #[component(default = String::from("sandbox"))]
    account: String,
}

impl PaymentGateway for FakeGateway {
    fn charge(&self, cents: u64) -> String {
        format!("charged {cents} cents on {}", self.account)
    }
}

impl Implements<dyn PaymentGateway> for FakeGateway {
    fn upcast(self: Arc<Self>) -> Arc<dyn PaymentGateway> {
        self
    }
}

#[derive(Component)]
struct Checkout {
    gateway: Arc<dyn PaymentGateway>,
    tax_rate: f64,
    #[component(inject = Inject::utcnow())]
    clock: Inject<DateTime<Utc>>,
}

impl Checkout {
    fn pay(&self, cents: u64) -> Result<String> {
        let total = (cents as f64 * (1.0 + self.tax_rate)).round() as u64;
        Ok(format!("{} at {}", self.gateway.charge(total), self.clock.get()?))
    }
}

// === Providers ===

struct Pricing;

impl Provider for Pricing {
    fn register(&self, registry: &mut dyn ProviderRegistry) {
        registry.provide(
            "tax_rate",
            Signature::new().param(Param::named("region")),
            |args| {
                let rate = match args.value::<String>("region")?.as_str() {
                    "eu" => 0.2,
                    _ => 0.0,
                };
                Ok(rate)
            },
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("joinery_container=debug")),
        )
        .init();

    let di = Di::builder()
        .binding("region", String::from("eu"))
        .provider(Pricing)
        .class_override::<dyn PaymentGateway, FakeGateway>()
        .build();
    tracing::info!(?di, "Container ready");

    let checkout = di.build_class_cached::<Checkout>()?;
    println!("{}", checkout.pay(1000)?);

    let receipt = Function::new(
        "receipt",
        Signature::new()
            .param(Param::typed::<Checkout>("checkout").default_class(Class::of::<Checkout>()))
            .param(Param::typed::<u64>("cents")),
        |args| args.get::<Checkout>("checkout")?.pay(args.value("cents")?),
    );
    println!("{}", di.call_function_with(&receipt, [("cents", Instance::new(2500u64))])?);

    match di.build_from_name("inventory_service", false) {
        Ok(_) => println!("unexpected"),
        Err(err) => println!("{err}"),
    }

    Ok(())
}
