use std::io::BufRead;

// Sends each line of standard input as one message, then waits for delivery to finish.
//
// usage: gudp-send <destination> [<destination> ...]

fn main() {
    env_logger::init();

    let destinations = std::env::args()
        .skip(1)
        .map(|arg| arg.parse().expect("invalid destination address"))
        .collect::<Vec<std::net::SocketAddr>>();

    if destinations.is_empty() {
        eprintln!("usage: gudp-send <destination> [<destination> ...]");
        std::process::exit(2);
    }

    let socket = gudp::Socket::bind(("0.0.0.0", 0)).expect("failed to create gudp socket");

    for line in std::io::stdin().lock().lines() {
        let line = line.expect("failed to read stdin");

        for &addr in destinations.iter() {
            socket
                .send(line.as_bytes(), addr)
                .expect("failed to queue message");
        }
    }

    socket.finish().expect("failed to start transmission");

    let mut failed = false;

    for outcome in socket.wait_sent() {
        match outcome.result {
            Ok(()) => println!("{}: delivered", outcome.peer),
            Err(err) => {
                println!("{}: {}", outcome.peer, err);
                failed = true;
            }
        }
    }

    socket.close();

    if failed {
        std::process::exit(1);
    }
}
