// src/main.rs

use recmd::{cli, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run(cli::parse()).await {
        eprintln!("recmd error: {err:?}");
        std::process::exit(1);
    }
}
