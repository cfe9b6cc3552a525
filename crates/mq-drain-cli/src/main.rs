use mq_drain_cli::run_cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match run_cli().await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("mq-drain: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}
