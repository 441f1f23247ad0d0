use registrar_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("application error: {err}");
        let code = if err.is_rejection() { 2 } else { 1 };
        std::process::exit(code);
    }
}
