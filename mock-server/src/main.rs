//! Standalone mock server for trying reqcheck by hand.
//!
//! `mock-server [port]`, falling back to `$PORT`, then 3000.

use tokio::net::TcpListener;

const ROUTES: &[&str] = &[
    "GET /ok",
    "ANY /echo",
    "GET /status/{code}",
    "GET /text",
    "GET /empty",
    "GET /redirect",
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    let addr = listener.local_addr()?;
    println!("mock server listening on http://{addr}");
    for route in ROUTES {
        println!("  {route}");
    }
    mock_server::run(listener).await
}
