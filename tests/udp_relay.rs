use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use coapsub::broker::{Dispatcher, Registry};
use coapsub::config::Settings;
use coapsub::transport::coap::{self, CoapMessage, MessageType};
use coapsub::transport::udp::UdpServer;
use tokio::net::UdpSocket;
use tokio::time::{Duration, timeout};

async fn start_relay() -> (SocketAddr, Arc<Dispatcher>) {
    let settings = Settings::default();
    let dispatcher = Arc::new(Dispatcher::new(Registry::with_capacity(16)));
    let server = UdpServer::bind("127.0.0.1:0", dispatcher.clone(), &settings.server)
        .await
        .expect("bind relay");
    let addr = server.local_addr().expect("relay address");
    tokio::spawn(server.run());
    (addr, dispatcher)
}

async fn request(socket: &UdpSocket, relay: SocketAddr, path: &[&str], payload: &str, mid: u16) {
    let mut msg = CoapMessage::new(MessageType::Confirmable, 0x02, mid);
    msg.token = Bytes::copy_from_slice(&mid.to_be_bytes());
    msg.set_path(path);
    msg.payload = Bytes::copy_from_slice(payload.as_bytes());
    let datagram = coap::encode(&msg).unwrap();
    socket.send_to(&datagram, relay).await.unwrap();
}

async fn receive(socket: &UdpSocket) -> CoapMessage {
    let mut buf = [0u8; 1500];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for datagram")
        .unwrap();
    coap::decode(&buf[..len]).unwrap()
}

async fn nothing_arrives(socket: &UdpSocket) -> bool {
    let mut buf = [0u8; 1500];
    timeout(Duration::from_millis(200), socket.recv_from(&mut buf))
        .await
        .is_err()
}

#[tokio::test]
async fn integration_pubsub_end_to_end() {
    let (relay, dispatcher) = start_relay().await;
    let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let publisher = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    request(&a, relay, &["ps", "ADDSUB", "temp"], "", 1).await;
    let ack = receive(&a).await;
    assert_eq!(ack.msg_type, MessageType::Acknowledgement);
    assert_eq!(ack.message_id, 1);

    request(&b, relay, &["ADDSUB", "temp"], "", 2).await;
    assert_eq!(receive(&b).await.message_id, 2);

    request(&publisher, relay, &["PUB", "temp"], "23C", 3).await;

    let ack = receive(&publisher).await;
    assert_eq!(ack.msg_type, MessageType::Acknowledgement);
    assert_eq!(ack.message_id, 3);
    assert_eq!(&ack.token[..], &3u16.to_be_bytes());
    assert_eq!(ack.content_format(), Some(coap::CONTENT_FORMAT_LINK));
    assert_eq!(&ack.payload[..], b"23C");

    for subscriber in [&a, &b] {
        let delivery = receive(subscriber).await;
        assert_eq!(delivery.msg_type, MessageType::NonConfirmable);
        assert_eq!(&delivery.payload[..], b"23C");
    }

    request(&a, relay, &["REMSUB", "temp"], "", 4).await;
    assert_eq!(receive(&a).await.message_id, 4);

    request(&publisher, relay, &["PUB", "temp"], "24C", 5).await;
    assert_eq!(receive(&publisher).await.message_id, 5);
    assert_eq!(&receive(&b).await.payload[..], b"24C");
    assert!(nothing_arrives(&a).await);

    assert_eq!(dispatcher.registry().subscribers_of("temp").len(), 1);
}

#[tokio::test]
async fn integration_garbage_gets_no_reply() {
    let (relay, dispatcher) = start_relay().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    request(&client, relay, &["BOGUS"], "", 10).await;
    request(&client, relay, &["ADDSUB"], "", 11).await;
    client.send_to(&[0xde, 0xad], relay).await.unwrap();
    assert!(nothing_arrives(&client).await);

    request(&client, relay, &["HB"], "alive", 12).await;
    let ack = receive(&client).await;
    assert_eq!(ack.message_id, 12);
    assert_eq!(&ack.payload[..], b"alive");

    assert_eq!(dispatcher.registry().topic_count(), 0);
}

#[tokio::test]
async fn integration_oversized_publish_is_dropped() {
    let (relay, _dispatcher) = start_relay().await;
    let subscriber = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let publisher = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    request(&subscriber, relay, &["ADDSUB", "temp"], "", 1).await;
    assert_eq!(receive(&subscriber).await.message_id, 1);

    let oversized = "x".repeat(3000);
    request(&publisher, relay, &["PUB", "temp"], &oversized, 2).await;
    assert!(nothing_arrives(&publisher).await);
    assert!(nothing_arrives(&subscriber).await);

    request(&publisher, relay, &["PUB", "temp"], "23C", 3).await;
    assert_eq!(receive(&publisher).await.message_id, 3);
    assert_eq!(&receive(&subscriber).await.payload[..], b"23C");
}
