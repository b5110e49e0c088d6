//! End-to-end seller node tests over real TCP.
//!
//! Each test binds a seller on an ephemeral port and drives it with raw
//! line-based connections, the way a buyer process would. Countdown and
//! warning timing are covered deterministically in souk-core; these tests
//! exercise the transport, dispatch, and broadcast paths.

use std::{net::SocketAddr, time::Duration};

use souk_seller::{Server, ServerRuntimeConfig};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time::timeout,
};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_seller(items: &[(&str, u64)]) -> SocketAddr {
    let config = ServerRuntimeConfig {
        node_id: "t1".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        items: items.iter().map(|&(name, stock)| (name.to_string(), stock)).collect(),
        // Long window so the countdown never interferes with these tests.
        sale_duration: Duration::from_secs(600),
    };

    let server = Server::bind(config).await.expect("bind seller");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

/// A raw line-protocol buyer connection.
struct TestBuyer {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestBuyer {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, write_half) = stream.into_split();
        let mut buyer = Self { lines: BufReader::new(read_half).lines(), writer: write_half };

        let greeting = buyer.next_line().await;
        assert!(greeting.starts_with("Connected|"), "expected greeting, got: {greeting}");
        buyer
    }

    async fn next_line(&mut self) -> String {
        timeout(IO_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("read error")
            .expect("connection closed")
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(format!("{line}\n").as_bytes()).await.expect("write");
    }

    /// Send a command and return the next `Reply|` text, skipping any
    /// interleaved notifications.
    async fn request(&mut self, line: &str) -> String {
        self.send(line).await;
        loop {
            let line = self.next_line().await;
            if let Some(text) = line.strip_prefix("Reply|") {
                return text.to_string();
            }
        }
    }

    /// Read until a notification containing `needle` arrives.
    async fn notification_containing(&mut self, needle: &str) -> String {
        loop {
            let line = self.next_line().await;
            if let Some(text) = line.strip_prefix("Notification|") {
                if text.contains(needle) {
                    return text.to_string();
                }
            }
        }
    }

    /// Poll CURRENT until the first sale session is running.
    async fn wait_for_sale(&mut self) -> String {
        for _ in 0..200 {
            let reply = self.request("CURRENT").await;
            if reply.starts_with("Current:") {
                return reply;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("sale never started");
    }

    /// Expect the server to close the connection.
    async fn expect_eof(mut self) {
        loop {
            let line = timeout(IO_TIMEOUT, self.lines.next_line())
                .await
                .expect("timed out waiting for close")
                .expect("read error");
            if line.is_none() {
                return;
            }
        }
    }
}

#[tokio::test]
async fn buy_without_id_is_rejected() {
    let addr = start_seller(&[("flower", 5)]).await;
    let mut buyer = TestBuyer::connect(addr).await;

    buyer.wait_for_sale().await;
    assert_eq!(buyer.request("BUY 1").await, "Error: Buyer ID not set.");
    assert_eq!(buyer.request("LIST").await, "Items: flower(5)");
}

#[tokio::test]
async fn purchase_flow_with_broadcast_to_other_buyer() {
    let addr = start_seller(&[("flower", 5), ("sugar", 10)]).await;
    let mut alice = TestBuyer::connect(addr).await;
    let mut bob = TestBuyer::connect(addr).await;

    assert_eq!(alice.request("ID 1001").await, "Buyer ID registered.");
    let current = alice.wait_for_sale().await;
    assert!(current.starts_with("Current: flower, stock=5"), "got: {current}");

    assert_eq!(alice.request("BUY 3").await, "Purchase OK: bought 3.");
    assert_eq!(
        bob.notification_containing("now has 2 left").await,
        "Item 'flower' now has 2 left."
    );

    assert_eq!(alice.request("LIST").await, "Items: flower(2), sugar(10)");
    assert_eq!(alice.request("BUY 3").await, "Only 2 left.");
}

#[tokio::test]
async fn sellout_broadcasts_and_next_item_goes_on_sale() {
    let addr = start_seller(&[("flower", 2), ("sugar", 4)]).await;
    let mut buyer = TestBuyer::connect(addr).await;

    buyer.request("ID 1002").await;
    buyer.wait_for_sale().await;

    assert_eq!(buyer.request("BUY 2").await, "Purchase OK: bought 2.");
    assert_eq!(
        buyer.notification_containing("sold out").await,
        "'flower' has been sold out."
    );
    assert_eq!(
        buyer.notification_containing("New item on sale").await,
        "New item on sale: sugar (stock: 4)"
    );
}

#[tokio::test]
async fn unknown_commands_keep_the_connection_open() {
    let addr = start_seller(&[("flower", 5)]).await;
    let mut buyer = TestBuyer::connect(addr).await;

    assert_eq!(buyer.request("HAGGLE hard").await, "Unknown command.");
    assert_eq!(buyer.request("ID").await, "Usage: ID <id>");
    assert_eq!(buyer.request("LIST").await, "Items: flower(5)");
}

#[tokio::test]
async fn quit_replies_then_closes() {
    let addr = start_seller(&[("flower", 5)]).await;
    let mut buyer = TestBuyer::connect(addr).await;

    assert_eq!(buyer.request("QUIT").await, "You have left.");
    buyer.expect_eof().await;
}

#[tokio::test]
async fn dropped_buyer_does_not_delay_broadcasts_to_others() {
    let addr = start_seller(&[("flower", 5)]).await;

    let ghost = TestBuyer::connect(addr).await;
    drop(ghost); // silent close, no QUIT

    let mut buyer = TestBuyer::connect(addr).await;
    buyer.request("ID 1003").await;
    buyer.wait_for_sale().await;

    // The broadcast triggered by this purchase must still arrive promptly
    // even though a registered peer vanished without a trace.
    assert_eq!(buyer.request("BUY 1").await, "Purchase OK: bought 1.");
    assert_eq!(
        buyer.notification_containing("now has 4 left").await,
        "Item 'flower' now has 4 left."
    );
}

async fn hammer_buys(addr: SocketAddr, buyer_id: &'static str, count: u64) {
    let mut buyer = TestBuyer::connect(addr).await;
    buyer.request(&format!("ID {buyer_id}")).await;
    for _ in 0..count {
        let reply = buyer.request("BUY 1").await;
        assert_eq!(reply, "Purchase OK: bought 1.");
    }
}

#[tokio::test]
async fn concurrent_buys_broadcast_stock_in_decreasing_order() {
    const STOCK: u64 = 400;
    let addr = start_seller(&[("flower", STOCK)]).await;

    let mut observer = TestBuyer::connect(addr).await;
    observer.wait_for_sale().await;

    let first = tokio::spawn(hammer_buys(addr, "2001", STOCK / 2));
    let second = tokio::spawn(hammer_buys(addr, "2002", STOCK / 2));

    // Whatever the interleaving of the two buyers, the stock levels
    // announced to a third party must arrive strictly decreasing: the
    // runtime delivers each purchase broadcast in the same critical
    // section as the decrement that produced it.
    let mut last = STOCK;
    let mut seen = 0;
    while last > 0 {
        let text = observer.notification_containing("now has").await;
        let stock = text
            .strip_prefix("Item 'flower' now has ")
            .and_then(|rest| rest.strip_suffix(" left."))
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or_else(|| panic!("unexpected notification: {text}"));
        assert!(stock < last, "announced stock went from {last} up to {stock}");
        last = stock;
        seen += 1;
    }
    assert_eq!(seen, STOCK);

    first.await.expect("buyer task");
    second.await.expect("buyer task");
}

#[tokio::test]
async fn shared_buyer_ids_are_allowed() {
    let addr = start_seller(&[("flower", 5)]).await;
    let mut first = TestBuyer::connect(addr).await;
    let mut second = TestBuyer::connect(addr).await;

    assert_eq!(first.request("ID 42").await, "Buyer ID registered.");
    assert_eq!(second.request("ID 42").await, "Buyer ID registered.");
}
