//! One-time seeding tool: uploads the local property catalog file into the
//! Firestore properties collection, one document per listing, keyed by row
//! index.

use std::collections::BTreeMap;
use std::env;
use std::process::exit;

use google_auth_module::GoogleAuth;
use triage_module::catalog::{CatalogSource, JsonFileCatalog};
use triage_module::firestore::{FirestoreClient, Value};

fn print_usage() {
    eprintln!(
        r#"Usage: upload-catalog [catalog.json]

Uploads every record of the local catalog file (default: properties.json)
into the Firestore properties collection of $GCP_PROJECT, one document per
listing, keyed by row index.

Environment Variables:
  GCP_PROJECT                - Google Cloud project id (required)
  TRIAGE_CATALOG_COLLECTION  - Target collection (default: properties)
  GOOGLE_ACCESS_TOKEN        - Pre-generated access token (for sandbox environments)
  GOOGLE_CLIENT_ID           - Google OAuth client ID
  GOOGLE_CLIENT_SECRET       - Google OAuth client secret
  GOOGLE_REFRESH_TOKEN       - Google OAuth refresh token
"#
    );
}

fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage();
        exit(0);
    }
    let catalog_path = args
        .first()
        .cloned()
        .unwrap_or_else(|| "properties.json".to_string());

    let project = match env::var("GCP_PROJECT") {
        Ok(project) if !project.trim().is_empty() => project,
        _ => {
            eprintln!("GCP_PROJECT must be set");
            print_usage();
            exit(1);
        }
    };
    let collection =
        env::var("TRIAGE_CATALOG_COLLECTION").unwrap_or_else(|_| "properties".to_string());

    let auth = match GoogleAuth::from_env() {
        Ok(auth) => auth,
        Err(err) => {
            eprintln!("authentication failed: {}", err);
            print_usage();
            exit(1);
        }
    };

    let records = match JsonFileCatalog::new(&catalog_path).load() {
        Ok(records) => records,
        Err(err) => {
            eprintln!("failed to load catalog from {}: {}", catalog_path, err);
            exit(1);
        }
    };
    if records.is_empty() {
        eprintln!("no records found in {}", catalog_path);
        exit(1);
    }

    let client = FirestoreClient::new(auth, &project);
    for (index, record) in records.iter().enumerate() {
        let fields: BTreeMap<String, Value> = record
            .iter()
            .map(|(field, value)| (field.clone(), Value::String(value.clone())))
            .collect();
        match client.set_document(&collection, &index.to_string(), &fields) {
            Ok(_) => println!("uploaded property {}", index),
            Err(err) => {
                eprintln!("failed to upload property {}: {}", index, err);
                exit(1);
            }
        }
    }

    println!(
        "{} properties uploaded to collection '{}'",
        records.len(),
        collection
    );
}
