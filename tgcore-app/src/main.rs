//! tgcore-app — connect a stored session and watch it run.
//!
//! Needs an already authorized session: either a SQLite session file or an
//! exported session string.
//!
//!   TGCORE_API_ID=12345 TGCORE_SESSION=my_account cargo run -p tgcore-app
//!   TGCORE_API_ID=12345 TGCORE_SESSION_STRING=... cargo run -p tgcore-app
//!
//! Prints the DC configuration, then every raw update until Ctrl+C.

use std::env;
use std::sync::Arc;

use chrono::DateTime;
use tgcore_client::storage::{FileStorage, MemoryStorage};
use tgcore_client::{Client, SessionConfig, Storage};
use tgcore_tl::functions;

#[tokio::main]
async fn main() {
    // Enable logging: RUST_LOG=tgcore_client=debug cargo run -p tgcore-app
    if env::var("RUST_LOG").is_err() {
        // SAFETY: single-threaded at this point, no other threads reading env
        unsafe { env::set_var("RUST_LOG", "tgcore_client=info,tgcore_app=info"); }
    }
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("\n✗ {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let api_id: i32 = match env::var("TGCORE_API_ID") {
        Ok(v) => v.parse()?,
        Err(_) => {
            eprintln!("Set TGCORE_API_ID (https://my.telegram.org)");
            std::process::exit(1);
        }
    };

    let storage: Arc<dyn Storage> = match env::var("TGCORE_SESSION_STRING") {
        Ok(s) => Arc::new(MemoryStorage::from_session_string(s.trim())?),
        Err(_) => {
            let name = env::var("TGCORE_SESSION").unwrap_or_else(|_| "tgcore".into());
            Arc::new(FileStorage::in_workdir(&name, env::current_dir()?)?)
        }
    };

    let client = Client::start(SessionConfig { api_id, ..Default::default() }, storage).await?;
    println!("✅ Connected");

    let config = client.invoke(&functions::help::GetConfig {}).await?.into_inner();
    let date = DateTime::from_timestamp(config.date as i64, 0)
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| config.date.to_string());
    println!("🌐 DC{} ({} options), server time {date}", config.this_dc, config.dc_options.len());

    println!("\n👂 Listening for updates (Ctrl+C to quit) …\n");
    let mut updates = client.updates().ok_or("update stream already taken")?;
    loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(update) => match update.name() {
                    Some(name) => println!("⚙️  {name} ({} bytes)", update.body.len()),
                    None => println!(
                        "⚙️  Raw update: constructor_id={:#010x}",
                        update.constructor_id().unwrap_or_default()
                    ),
                },
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.stop().await?;
    println!("💾 Session saved");
    Ok(())
}
