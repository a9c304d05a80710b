//! # Seed Data Generator
//!
//! Populates a development database with warehouses, drugs and patients.
//!
//! ## Usage
//! ```bash
//! # 200 drugs spread over 3 warehouses (default)
//! cargo run -p pharmacy-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p pharmacy-db --bin seed -- --count 1000 --db ./data/pharmacy.db
//! ```
//!
//! Each drug gets a `{name} {strength}` name, a price between 1.49 and
//! 60.00 and an opening stock between 0 and 120. Values are derived from
//! the index so reruns against fresh databases produce the same data.

use std::env;

use pharmacy_core::{NewDrug, PatientInput, WarehouseInput};
use pharmacy_db::{Database, DbConfig};

const WAREHOUSES: &[(&str, &str)] = &[
    ("Central Depot", "1 Depot Road"),
    ("North Annex", "44 Quay Street"),
    ("Cold Chain Store", "7 Refrigeration Way"),
];

const DRUG_NAMES: &[&str] = &[
    "Amoxicillin",
    "Atorvastatin",
    "Azithromycin",
    "Cetirizine",
    "Ciprofloxacin",
    "Clopidogrel",
    "Diclofenac",
    "Doxycycline",
    "Furosemide",
    "Ibuprofen",
    "Insulin Glargine",
    "Levothyroxine",
    "Lisinopril",
    "Loratadine",
    "Metformin",
    "Metoprolol",
    "Naproxen",
    "Omeprazole",
    "Paracetamol",
    "Prednisolone",
    "Salbutamol",
    "Sertraline",
    "Simvastatin",
    "Warfarin",
];

const STRENGTHS: &[&str] = &["5mg", "10mg", "20mg", "50mg", "100mg", "250mg", "500mg"];

const PATIENTS: &[(&str, &str, &str)] = &[
    ("Ada Lovelace", "12 St James's Square", "+44 20 7946 0958"),
    ("Alan Turing", "Bletchley Park", "+44 1908 640404"),
    ("Grace Hopper", "9 Navy Yard", "555-0100"),
    ("Katherine Johnson", "Langley Research Center", "555-0142"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./pharmacy_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Pharmacy Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of drugs to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./pharmacy_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Pharmacy Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Drugs:    {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.drugs().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} drugs", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let mut warehouse_ids = Vec::with_capacity(WAREHOUSES.len());
    for (name, address) in WAREHOUSES {
        let warehouse = db
            .warehouses()
            .insert(&WarehouseInput {
                name: name.to_string(),
                address: address.to_string(),
                capacity: 50_000,
            })
            .await?;
        warehouse_ids.push(warehouse.id);
    }
    println!("✓ {} warehouses", warehouse_ids.len());

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (name_idx, name) in DRUG_NAMES.iter().enumerate() {
        for (strength_idx, strength) in STRENGTHS.iter().enumerate() {
            if generated >= count {
                break 'outer;
            }

            let index = name_idx * STRENGTHS.len() + strength_idx;
            let drug = NewDrug {
                name: format!("{} {}", name, strength),
                description: Some(format!("{} tablets, pack of 28", strength)),
                price_cents: 149 + ((index * 7919) % 5852) as i64,
                stock: ((index * 31) % 121) as i64,
                warehouse_id: warehouse_ids[index % warehouse_ids.len()],
            };

            if let Err(e) = db.drugs().insert(&drug).await {
                eprintln!("Failed to insert {}: {}", drug.name, e);
                continue;
            }
            generated += 1;
        }
    }

    for (name, address, phone) in PATIENTS {
        db.patients()
            .insert(&PatientInput {
                name: name.to_string(),
                address: address.to_string(),
                phone_number: phone.to_string(),
            })
            .await?;
    }

    println!(
        "✓ Generated {} drugs and {} patients in {:?}",
        generated,
        PATIENTS.len(),
        start.elapsed()
    );

    db.close().await;
    Ok(())
}
