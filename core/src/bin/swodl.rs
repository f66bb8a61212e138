//! SWODL command line
//!
//! Runs workflow programs from their JSON AST, with breakpoints, mocked web
//! services and scaled delays.

use swodl_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
