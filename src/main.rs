#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = salonhub::run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}
