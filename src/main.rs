#[actix_web::main]
async fn main() -> std::io::Result<()> {
    casegrid_lib::run().await
}
