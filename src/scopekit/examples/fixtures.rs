use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use scopekit::prelude::*;

fn main() {
    let scopes = Scopes::global();
    scopes
        .install(
            "Fixture:Checkout",
            Configuration::new().with(StorageModule).with(CheckoutModule),
        )
        .unwrap();

    scopes.tracker().sync_scope(|| {
        scopes
            .fixture_started("Fixture:Checkout", ScopeLevel::Fixture)
            .unwrap();

        for name in ["adds an item", "removes an item"] {
            scopes.test_started("Fixture:Checkout").unwrap();
            let cart: Arc<Cart> = scopes
                .resolve_current_required(&AmbientKeyStrategy)
                .unwrap();
            cart.log(name);
            scopes.test_finished().unwrap();
        }

        scopes.fixture_finished().unwrap();
    });

    let failed = scopes.run_finished();
    println!("run finished, {failed} scope(s) failed to clean up");
}

struct StorageModule;

impl Module for StorageModule {
    fn configure(&self, configurer: &mut Configurer) -> Result<(), Box<dyn Error + Send + Sync>> {
        configurer.register(
            bind::<Arc<Database>>()
                .disposable()
                .to_instance(Arc::new(Database::default())),
        );
        Ok(())
    }
}

struct CheckoutModule;

impl Module for CheckoutModule {
    fn configure(&self, configurer: &mut Configurer) -> Result<(), Box<dyn Error + Send + Sync>> {
        configurer.try_register(bind::<Arc<Cart>>().to_component::<Cart>(Lifetime::Singleton));
        Ok(())
    }
}

#[derive(Default)]
struct Database {
    queries: AtomicUsize,
}

impl Dispose for Database {
    fn dispose(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        println!(
            "closing database after {} queries",
            self.queries.load(Ordering::SeqCst)
        );
        Ok(())
    }
}

struct Cart {
    database: Arc<Database>,
}

#[component]
impl Cart {
    #[inject]
    fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    fn log(&self, test: &str) {
        let query = self.database.queries.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[{test}] query #{query}");
    }
}
