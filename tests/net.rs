#![deny(rust_2018_idioms)]

use std::io::Read;
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rain::net::{
    AddressInfo, Family, Host, Protocol, ServeOptions, Socket, SocketType, Specification, Worker,
};
use rain::Timeout;

fn tcp4() -> Specification {
    Specification::new(Family::Inet, SocketType::Stream, Protocol::Tcp)
}

fn connect_to(listener: &TcpListener) -> Socket {
    let spec = tcp4();
    let socket = Socket::new(spec, false).expect("socket");
    let target = AddressInfo::from_addr(listener.local_addr().unwrap(), &spec);
    let timed_out = socket
        .connect_addr(&target, Timeout::new(Duration::from_secs(5)))
        .expect("connect");
    assert!(!timed_out, "loopback connect timed out");
    socket
}

#[test]
fn graceful_close_delivers_bytes_then_fin() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let socket = connect_to(&listener);
    let (mut peer, _) = listener.accept().unwrap();

    let sent = socket
        .send(b"payload", Timeout::new(Duration::from_secs(5)))
        .unwrap();
    assert_eq!(sent, 7);

    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        peer.read_to_end(&mut buf).unwrap();
        buf
        // Dropping the peer sends its FIN back.
    });

    let timed_out = socket.close(Timeout::new(Duration::from_secs(5))).unwrap();
    assert!(!timed_out);
    assert!(!socket.is_valid());
    assert_eq!(reader.join().unwrap(), b"payload");

    // Idempotent afterwards.
    assert!(!socket.close(Timeout::new(Duration::from_secs(1))).unwrap());
}

#[test]
fn accept_honors_its_timeout() {
    let spec = tcp4();
    let server = Socket::new(spec, true).expect("socket");
    server
        .bind_addr(&AddressInfo::from_addr(
            "127.0.0.1:0".parse().unwrap(),
            &spec,
        ))
        .unwrap();
    server.listen(4).unwrap();

    let started = Instant::now();
    let accepted = server
        .accept(Timeout::new(Duration::from_millis(100)))
        .unwrap();
    assert!(accepted.is_none());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn interrupt_unblocks_a_pending_recv() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let spec = tcp4();
    let socket = Arc::new(Socket::new(spec, true).expect("socket"));
    let target = AddressInfo::from_addr(listener.local_addr().unwrap(), &spec);
    assert!(!socket
        .connect_addr(&target, Timeout::new(Duration::from_secs(5)))
        .unwrap());
    let _peer = listener.accept().unwrap();

    let interrupter = Arc::clone(&socket);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        interrupter.interrupt().expect("interrupt");
    });

    // Without the interrupt this would block for the full 30 seconds.
    let started = Instant::now();
    let mut buf = [0u8; 16];
    let received = socket
        .recv(&mut buf, Timeout::new(Duration::from_secs(30)))
        .unwrap();
    assert_eq!(received, None);
    assert!(started.elapsed() < Duration::from_secs(10));

    // The latch holds for every poll that follows.
    let started = Instant::now();
    let received = socket
        .recv(&mut buf, Timeout::new(Duration::from_secs(30)))
        .unwrap();
    assert_eq!(received, None);
    assert!(started.elapsed() < Duration::from_secs(10));

    handle.join().unwrap();
}

#[test]
fn parallel_connect_picks_a_winner() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let spec = tcp4();
    let socket = Socket::new(spec, false).unwrap();

    // One dead address, one live one.
    let addrs = vec![
        AddressInfo::from_addr("127.0.0.1:1".parse().unwrap(), &spec),
        AddressInfo::from_addr(listener.local_addr().unwrap(), &spec),
    ];
    let timed_out = socket
        .connect_addrs(&addrs, true, Timeout::new(Duration::from_secs(10)))
        .unwrap();
    assert!(!timed_out);
    assert!(listener.accept().is_ok());
}

struct BlockingWorker {
    socket: Arc<Socket>,
}

impl Worker for BlockingWorker {
    fn on_work(&mut self) -> rain::Result<()> {
        // Sit in long recvs until interrupted, closed, or aborted.
        let mut buf = [0u8; 256];
        loop {
            match self.socket.recv(&mut buf, Timeout::new(Duration::from_secs(60))) {
                Ok(Some(0)) | Ok(None) => return Ok(()),
                Ok(Some(_)) => {}
                Err(_) => return Ok(()),
            }
        }
    }
}

#[test]
fn server_close_interrupts_blocked_workers() {
    let server = rain::net::Server::new(tcp4(), 8).expect("server");
    server
        .serve(
            &Host::parse("127.0.0.1:0"),
            ServeOptions::default(),
            |socket: Arc<Socket>, _peer: AddressInfo| BlockingWorker { socket },
        )
        .expect("serve");
    let host = server.local_host().expect("bound host");

    // Park a few connections inside worker recvs.
    let mut peers = Vec::new();
    for _ in 0..3 {
        peers.push(TcpStream::connect(host.to_string()).unwrap());
    }
    thread::sleep(Duration::from_millis(300));

    let started = Instant::now();
    let timed_out = server.close(Timeout::new(Duration::from_secs(10)));
    assert!(!timed_out, "workers did not drain");
    assert!(started.elapsed() < Duration::from_secs(10));

    // Everything drained; nothing is still executing.
    assert!(!server.block_for_tasks(Timeout::new(Duration::from_secs(1))));
}

#[test]
fn server_rebinds_are_refused_while_listening() {
    let first = rain::net::Server::new(tcp4(), 4).expect("server");
    first
        .serve(
            &Host::parse("127.0.0.1:0"),
            ServeOptions::default(),
            |socket: Arc<Socket>, _peer: AddressInfo| BlockingWorker { socket },
        )
        .expect("serve");
    let host = first.local_host().unwrap();

    let second = rain::net::Server::new(tcp4(), 4).expect("server");
    let err = second
        .serve(
            &host,
            ServeOptions::default(),
            |socket: Arc<Socket>, _peer: AddressInfo| BlockingWorker { socket },
        )
        .expect_err("address in use");
    assert!(!err.is_parse());

    first.close(Timeout::new(Duration::from_secs(5)));
}
