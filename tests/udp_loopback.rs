#[allow(dead_code)]
mod common;

use std::sync::Arc;
use std::thread;
use std::time;

use common::*;

const MESSAGE_COUNT: usize = 200;

fn random_payload(size_max: usize) -> Vec<u8> {
    let len = rand::random::<usize>() % (size_max + 1);
    (0..len).map(|_| rand::random::<u8>()).collect()
}

#[test]
fn udp_loopback_transfer() {
    init_logging();

    let config = gudp::Config {
        window_size: 8,
        retransmit_timeout_ms: 100,
        ..Default::default()
    };

    let server = Arc::new(gudp::Socket::bind_with_config("127.0.0.1:0", config.clone()).unwrap());
    let server_addr = server.local_addr().unwrap();

    let collector = spawn_collector(Arc::clone(&server));

    let client = gudp::Socket::bind_with_config("127.0.0.1:0", config.clone()).unwrap();
    let client_addr = client.local_addr().unwrap();

    let payload_size_max = config.datagram_size_max - gudp::packet::HEADER_SIZE;

    let mut sent_digest = md5::Context::new();
    let mut sent_digests = Vec::new();

    for _ in 0..MESSAGE_COUNT {
        let payload = random_payload(payload_size_max);

        sent_digest.consume(&payload);
        sent_digests.push(md5::compute(&payload));

        client.send(&payload, server_addr).unwrap();
    }

    client.finish().unwrap();

    let outcomes = client.wait_sent();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].peer, server_addr);
    assert!(outcomes[0].result.is_ok());

    thread::sleep(time::Duration::from_millis(100));
    server.close();
    client.close();

    assert!(server.local_addr().is_none());

    let received = collector.join().unwrap();
    assert_eq!(received.len(), MESSAGE_COUNT);
    assert!(received.iter().all(|(_, from)| *from == client_addr));

    let mut received_digest = md5::Context::new();

    for ((payload, _), digest) in received.iter().zip(sent_digests.iter()) {
        received_digest.consume(payload);
        assert_eq!(md5::compute(payload), *digest);
    }

    assert_eq!(received_digest.compute(), sent_digest.compute());
}
