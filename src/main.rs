#[actix_web::main]
async fn main() -> std::io::Result<()> {
    certificate_server::run().await
}
