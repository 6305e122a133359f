use chardid_service::cli::Cli;
use chardid_service::commands;
use chardid_service::exit::{exit_code_for, EXIT_SUCCESS};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    match commands::run(cli).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(exit_code_for(&err));
        }
    }
}
