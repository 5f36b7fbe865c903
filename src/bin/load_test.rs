//! Load Testing Tool
//!
//! Fires concurrent transfers in alternating directions between two fresh
//! accounts and checks that no money was created or lost.
//!
//! Run with: cargo run --bin load_test --release -- --transfers 1000 --concurrency 20

use std::time::Instant;

use sqlx::postgres::PgPoolOptions;

use simplebank::ledger::TransferTxParams;
use simplebank::store::{AddAccountBalanceParams, CreateUserParams, PgStore, Store};
use simplebank::{db, Amount, Currency, Ledger};

const INITIAL_BALANCE: i64 = 1_000_000;

fn arg_or(args: &[String], flag: &str, default: usize) -> usize {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let transfer_count = arg_or(&args, "--transfers", 1000);
    let concurrency = arg_or(&args, "--concurrency", 20).max(1);

    let database_url = std::env::var("DATABASE_URL")?;

    println!(
        "Load Test - {} transfers, {} concurrent workers",
        transfer_count, concurrency
    );
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(concurrency as u32 + 2)
        .connect(&database_url)
        .await?;
    db::migrate(&pool).await?;

    let ledger = Ledger::new(PgStore::new(pool.clone()));
    let run = uuid::Uuid::new_v4().simple().to_string();

    let mut account_ids = Vec::new();
    for side in ["a", "b"] {
        let username = format!("load_{}_{}", side, &run[..12]);
        ledger
            .store()
            .create_user(CreateUserParams {
                username: username.clone(),
                hashed_password: "load-test".to_string(),
                full_name: format!("Load Test {}", side),
                email: format!("{}@load.test", username),
            })
            .await?;
        let account = ledger.open_account(&username, Currency::Usd).await?;
        ledger
            .store()
            .add_account_balance(AddAccountBalanceParams {
                id: account.id,
                amount: INITIAL_BALANCE,
            })
            .await?;
        account_ids.push(account.id);
    }
    let (a, b) = (account_ids[0], account_ids[1]);
    let amount = Amount::new(1)?;

    let start = Instant::now();
    let mut workers = Vec::new();

    for worker in 0..concurrency {
        let ledger = ledger.clone();
        workers.push(tokio::spawn(async move {
            let mut ok = 0usize;
            let mut failed = 0usize;
            let mut i = worker;
            while i < transfer_count {
                let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                match ledger
                    .transfer_tx(TransferTxParams::new(from, to, amount))
                    .await
                {
                    Ok(_) => ok += 1,
                    Err(e) => {
                        failed += 1;
                        eprintln!("transfer {} failed: {}", i, e);
                    }
                }
                i += concurrency;
            }
            (ok, failed)
        }));
    }

    let mut success_count = 0usize;
    let mut failure_count = 0usize;
    for worker in workers {
        let (ok, failed) = worker.await?;
        success_count += ok;
        failure_count += failed;
    }

    let elapsed = start.elapsed();
    let rate = success_count as f64 / elapsed.as_secs_f64();

    let balance_a = ledger.store().get_account(a).await?.balance;
    let balance_b = ledger.store().get_account(b).await?.balance;

    println!("\n=== Load Test Results ===");
    println!("Total transfers: {}", transfer_count);
    println!("Successful: {}", success_count);
    println!("Failed: {}", failure_count);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} transfers/sec", rate);
    println!("Balances: {} / {}", balance_a, balance_b);

    if balance_a + balance_b != 2 * INITIAL_BALANCE {
        anyhow::bail!("balance not conserved: {} + {}", balance_a, balance_b);
    }
    println!("Conservation: OK");

    Ok(())
}
