//! Concurrency tests: many clients, and many threads on one client.

mod harness;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use harness::{Behavior, TestServer};
use wsclient::{Client, Config, Message};

#[test]
fn test_multiple_clients_sequential() {
    let server = TestServer::spawn(Behavior::Echo);

    for i in 0..10 {
        let client = Client::new(Config::default());
        client.connect(Some(&server.url("/"))).unwrap();
        let msg = format!("hello from client {i}");
        let replies = client
            .send_and_wait(msg.as_str(), Duration::from_millis(500))
            .unwrap();
        assert_eq!(replies, vec![Message::text(msg)]);
        client.close();
    }
    assert_eq!(server.requests().len(), 10);
}

#[test]
fn test_multiple_clients_parallel() {
    let server = Arc::new(TestServer::spawn(Behavior::Echo));
    let success = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(10));

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let server = Arc::clone(&server);
            let success = Arc::clone(&success);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let client = Client::new(Config::default());
                client.connect(Some(&server.url("/"))).unwrap();
                barrier.wait();

                let msg = format!("parallel {i}");
                let replies = client
                    .send_and_wait(msg.as_str(), Duration::from_millis(500))
                    .unwrap();
                assert_eq!(replies, vec![Message::text(msg)]);
                success.fetch_add(1, Ordering::Relaxed);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(success.load(Ordering::Relaxed), 10);
}

#[test]
fn test_concurrent_senders_share_one_connection() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 25;

    let server = TestServer::spawn(Behavior::Echo);
    let client = Arc::new(Client::new(Config::default()));
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    client.on_message(move |message| {
        if let Message::Text(text) = message {
            sink.lock().unwrap().push(text.clone());
        }
    });
    client.connect(Some(&server.url("/"))).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for n in 0..PER_THREAD {
                    client.send(format!("{t}:{n}")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while received.lock().unwrap().len() < THREADS * PER_THREAD && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    let received = received.lock().unwrap();
    assert_eq!(received.len(), THREADS * PER_THREAD);
    // frames never interleave, and each sender's messages keep their order
    for t in 0..THREADS {
        let mine: Vec<usize> = received
            .iter()
            .filter_map(|text| {
                let (sender, n) = text.split_once(':')?;
                (sender.parse::<usize>().ok()? == t).then(|| n.parse::<usize>().ok())?
            })
            .collect();
        assert_eq!(mine, (0..PER_THREAD).collect::<Vec<_>>());
    }
    client.close();
}

#[test]
fn test_close_races_with_sends() {
    let server = TestServer::spawn(Behavior::Echo);
    let client = Arc::new(Client::new(Config::default()));
    client.connect(Some(&server.url("/"))).unwrap();
    client.send("warm up").unwrap();

    let sender = {
        let client = Arc::clone(&client);
        thread::spawn(move || {
            for n in 0..200 {
                if client.send(format!("n{n}")).is_err() {
                    break;
                }
            }
        })
    };
    thread::sleep(Duration::from_millis(5));
    client.close();
    sender.join().unwrap();

    assert!(client.is_closed());
    client.close();
}
