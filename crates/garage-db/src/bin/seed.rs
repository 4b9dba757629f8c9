//! # Demo Garage Seeder
//!
//! Fills a database with one small working garage, commits an invoice and
//! prints a report, so a fresh install has something to look at.
//!
//! ## Usage
//! ```bash
//! # Database from garage.toml / GARAGE_DB_PATH / platform default
//! cargo run -p garage-db --bin seed
//!
//! # Explicit paths
//! cargo run -p garage-db --bin seed -- --db ./garage_dev.db --config ./garage.toml
//! ```
//!
//! ## What Gets Created
//! - VAT 20%, markup 30%
//! - Three customers: a dropin, an account holder on a Fixed 10% plan and
//!   a business on a Flexible plan
//! - A mechanic, two standard tasks, three parts
//! - A completed service job and a counter sale, each with an invoice

use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use garage_core::catalog::{Part, Task};
use garage_core::customer::{Account, Company, Contact, Customer};
use garage_core::discount::DiscountPlan;
use garage_core::invoice::{Invoice, InvoiceSubject, PaymentMethod};
use garage_core::job::{Job, JobPart, JobTask, Mechanic};
use garage_core::order::{CustomerPartsOrder, SellLine};
use garage_core::report::{ReportFilter, ReportKind, ReportPeriod};
use garage_core::vehicle::Vehicle;
use garage_core::{EntityMeta, JobType, Money, Percent, VehicleType, WorkStatus};
use garage_db::{Database, GarageConfig};

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Garage Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file (overrides config)");
                println!("  -c, --config <PATH>  garage.toml location");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument '{other}'"),
        }
        i += 1;
    }

    let mut config = GarageConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config.logging.filter);

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("Garage Demo Seeder");
    println!("==================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.db_config()).await?;

    if db.jobs().last_job_number().await? > 0 {
        println!("Database already has jobs, skipping seed.");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    let booked = Utc::now() - Duration::days(2);

    // Price control and catalogue.
    db.price_controls()
        .replace(Percent::from_bps(2_000), Percent::from_bps(3_000))
        .await?;

    let oil = Part::new("OIL-5W30", "Engine oil 5W-30 (5L)", Money::from_pence(2_850), 12, 3)?;
    let filter = Part::new("FLT-OIL", "Oil filter", Money::from_pence(895), 20, 5)?;
    let wipers = Part::new("WIP-24", "Wiper blade 24in", Money::from_pence(1_299), 6, 2)?;
    for part in [&oil, &filter, &wipers] {
        db.catalog().insert_part(part).await?;
    }

    let service_task = Task {
        meta: EntityMeta::new(),
        task_number: 1,
        description: "Full service".to_string(),
        estimated_secs: 5_400,
    };
    let mot_task = Task {
        meta: EntityMeta::new(),
        task_number: 2,
        description: "MOT test".to_string(),
        estimated_secs: 2_700,
    };
    db.catalog().insert_task(&service_task).await?;
    db.catalog().insert_task(&mot_task).await?;

    let mechanic = Mechanic::new("Ravi", "Patel", Money::from_pence(3_200))?;
    db.jobs().insert_mechanic(&mechanic).await?;
    println!("✓ Price control, catalogue and mechanic");

    // Customers.
    let dropin = Customer::dropin(Contact::new("Alex", "Morgan"));
    db.customers().insert(&dropin).await?;

    let mut account = Account::new("12 Station Road, Leeds", "LS1 4AB")?;
    account.discount = Some(DiscountPlan::fixed(Percent::from_bps(1_000))?);
    let holder = Customer::account_holder(Contact::new("Priya", "Shah"), account);
    db.customers().insert(&holder).await?;

    let mut business_account = Account::new("Unit 4, Canal Wharf, Leeds", "LS11 5PS")?;
    business_account.discount = Some(DiscountPlan::flexible(
        Percent::from_bps(500),
        Money::from_pence(0),
        Money::from_pence(100_000),
    )?);
    let business = Customer::business(
        Contact::new("Chris", "Dunn"),
        business_account,
        Company::new("Dunn Couriers Ltd", "Fleet manager")?,
    );
    db.customers().insert(&business).await?;
    db.customers().add_email(&business.meta.id, "fleet@dunn-couriers.example").await?;
    println!("✓ Customers");

    // A completed service on the account holder's car.
    let car = Vehicle::new("YK19 TRX", "Vauxhall", "Astra", VehicleType::Car, &holder.meta.id)?;
    db.vehicles().insert(&car).await?;

    let mut job = Job::new(1, &car.meta.id, JobType::Annual, booked);
    job.mechanic_id = Some(mechanic.meta.id.clone());
    let mut service = JobTask::new(&service_task.meta.id);
    service.status = WorkStatus::Complete;
    service.duration_secs = Some(6_300);
    job.tasks.push(service);
    job.parts.push(JobPart::new(&oil.meta.id, 1)?);
    job.parts.push(JobPart::new(&filter.meta.id, 1)?);
    job.update_status();
    db.jobs().insert(&mut job).await?;

    let job_invoice = Invoice::new(
        db.invoices().next_invoice_number().await?,
        InvoiceSubject::Job(job.meta.id.clone()),
        today,
    );
    db.invoices().insert(&job_invoice).await?;

    // A counter sale to the business.
    let mut sale = CustomerPartsOrder::new(&business.meta.id, today);
    sale.lines.push(SellLine::new(&wipers.meta.id, 2)?);
    db.orders().insert_parts_order(&mut sale).await?;

    let sale_invoice = Invoice::new(
        db.invoices().next_invoice_number().await?,
        InvoiceSubject::PartsOrder(sale.meta.id.clone()),
        today,
    );
    db.invoices().insert(&sale_invoice).await?;
    println!("✓ Job #{} and counter sale, invoiced", job.job_number);

    // Commit both invoices and settle the counter sale.
    let billing = db.billing();
    for invoice in [&job_invoice, &sale_invoice] {
        let committed = billing.commit_quote(&invoice.meta.id, Utc::now()).await?;
        let b = committed.breakdown;
        println!();
        println!("Invoice #{}", invoice.invoice_number);
        println!("  Labour     {}", b.labour);
        println!("  Parts      {}", b.parts);
        println!("  VAT        {}", b.vat);
        println!("  Total      {}", b.grand_total);
        println!("  Discount  -{} ({})", b.discount_value, b.discount_rate);
        println!("  Payable    {}", b.final_total);
    }

    let owed = billing.outstanding_balance(&sale_invoice.meta.id).await?;
    billing
        .record_payment(&sale_invoice.meta.id, owed, PaymentMethod::card("4929 1234 5678 9012")?, today)
        .await?;
    info!(invoice = sale_invoice.invoice_number, amount = %owed, "Demo sale settled");

    // Report from the booking date to today.
    let period = ReportPeriod::new(booked.date_naive(), today)?;
    let report = db
        .reporting()
        .run_report(ReportKind::Price, &period, &ReportFilter::default())
        .await?;

    println!();
    println!("Price report ({}):", period.label());
    println!("{}", report.to_json()?);

    println!();
    println!("✓ Seed complete!");
    Ok(())
}
