//! Thin entrypoint delegating to [`mangashelf_cli::run`].

#[tokio::main]
async fn main() {
    let exit_code = mangashelf_cli::run().await;
    std::process::exit(exit_code);
}
