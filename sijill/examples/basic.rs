//! Basic example of a Sijill registry.

use sijill::prelude::*;
use sijill::{ContractDeclaration, ServiceDeclaration};
use sijill::error::SourceError;
use std::sync::Arc;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct QuietLogger;

impl Logger for QuietLogger {
    fn log(&self, _msg: &str) {}
}

struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

impl Injectable for Database {
    fn constructors() -> Vec<ConstructorInfo> {
        vec![
            ConstructorInfo::new("new")
                .param::<Config>()
                .param::<dyn Logger>()
                .injection()
                .activate(|r| {
                    let config = r.resolve::<Config>()?;
                    Ok(Database {
                        url: config.database_url.clone(),
                        logger: r.resolve::<dyn Logger>()?,
                    })
                }),
        ]
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

impl Injectable for UserService {
    fn constructors() -> Vec<ConstructorInfo> {
        vec![
            ConstructorInfo::new("new")
                .param::<UserRepository>()
                .param::<dyn Logger>()
                .activate(|r| {
                    Ok(UserService {
                        repo: r.resolve::<UserRepository>()?,
                        logger: r.resolve::<dyn Logger>()?,
                    })
                }),
        ]
    }
}

// === A library module declaring its own defaults ===

struct LoggingModule;

impl DeclarationSource for LoggingModule {
    fn contract_declarations(&self) -> std::result::Result<Vec<ContractDeclaration>, SourceError> {
        Ok(vec![ContractDeclaration::of::<dyn Logger>().singleton()])
    }

    fn service_declarations(&self) -> std::result::Result<Vec<ServiceDeclaration>, SourceError> {
        Ok(vec![
            ServiceDeclaration::instance::<dyn Logger>(Arc::new(QuietLogger)).with_priority(Priority::LOW),
        ])
    }

    fn name(&self) -> &str {
        "logging"
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("sijill_registry=debug")
        .init();

    let mut builder = Container::builder();
    builder.add_source(LoggingModule);

    // Config — pre-built instance
    builder.register_instance::<Config>(Arc::new(Config {
        database_url: "postgres://localhost/myapp".to_string(),
        debug: true,
    }));
    // Logger — beats the module's QuietLogger on priority
    builder
        .register_instance::<dyn Logger>(Arc::new(ConsoleLogger))
        .override_priority(Priority::NORMAL);
    // Database — singleton (depends on Config + Logger)
    builder.register_self::<Database>().singleton();
    // UserRepository — scoped (one per request)
    builder
        .register_factory::<UserRepository, _>(|r| {
            Ok(Arc::new(UserRepository {
                db: r.resolve::<Database>()?,
            }))
        })
        .scoped();
    // UserService — transient (new each time)
    builder.register_self::<UserService>().transient();

    let container = builder.build()?;

    tracing::info!(bindings = container.registry().binding_count(), "Demo container ready");
    println!("✅ Container built successfully!");
    println!("{container:?}");

    // === Resolve from root container ===
    let config = container.resolve::<Config>()?;
    println!("📋 Config: database_url={}, debug={}", config.database_url, config.debug);

    // === Create a scope (e.g., for an HTTP request) ===
    {
        let scope = container.create_scope();

        let service = scope.resolve::<UserService>()?;
        println!("👤 {}", service.get_user(42));

        // Resolve again in same scope — UserRepository is reused
        let service2 = scope.resolve::<UserService>()?;
        println!("👤 {}", service2.get_user(7));
        println!("♻️  Same repository: {}", Arc::ptr_eq(&service.repo, &service2.repo));
    }

    // Scoped bindings need a scope
    if let Err(err) = container.resolve::<UserRepository>() {
        println!("⚠️  {err}");
    }

    println!("\n🎉 Everything works!");
    Ok(())
}
