//! Directory lookups over real TCP.

use std::sync::Arc;

use souk_core::{MemoryStore, RecordStore};
use souk_directory::serve;
use souk_proto::SellerRecord;
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
};

async fn start_directory(store: Arc<MemoryStore>) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = serve(listener, store).await;
    });
    addr
}

async fn lookup(addr: std::net::SocketAddr) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let mut listing = String::new();
    stream.read_to_string(&mut listing).await.expect("read");
    listing
}

#[tokio::test]
async fn empty_directory_reports_no_sellers() {
    let addr = start_directory(Arc::new(MemoryStore::new())).await;
    assert_eq!(lookup(addr).await, "No sellers available.\n");
}

#[tokio::test]
async fn listing_reflects_registered_sellers() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_seller("1", &SellerRecord { host: "127.0.0.1".to_string(), port: 5000 })
        .expect("put");
    let addr = start_directory(Arc::clone(&store)).await;

    assert_eq!(lookup(addr).await, "Available Sellers:\nID=1, Host=127.0.0.1, Port=5000\n");

    // A seller published after startup shows up on the next lookup.
    store
        .put_seller("2", &SellerRecord { host: "127.0.0.1".to_string(), port: 5001 })
        .expect("put");
    assert_eq!(
        lookup(addr).await,
        "Available Sellers:\nID=1, Host=127.0.0.1, Port=5000\nID=2, Host=127.0.0.1, Port=5001\n"
    );
}

#[tokio::test]
async fn concurrent_lookups_each_get_a_full_listing() {
    let store = Arc::new(MemoryStore::new());
    store
        .put_seller("1", &SellerRecord { host: "127.0.0.1".to_string(), port: 5000 })
        .expect("put");
    let addr = start_directory(store).await;

    let (a, b, c) = tokio::join!(lookup(addr), lookup(addr), lookup(addr));
    for listing in [a, b, c] {
        assert_eq!(listing, "Available Sellers:\nID=1, Host=127.0.0.1, Port=5000\n");
    }
}
