// Prints every message received, prefixed by its source address.
//
// usage: gudp-recv [<bind address>]

fn main() {
    env_logger::init();

    let bind_address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8888".to_string());

    let socket = gudp::Socket::bind(bind_address.as_str()).expect("failed to create gudp socket");

    println!("listening on {:?}", socket.local_addr());

    loop {
        match socket.receive() {
            Ok((payload, addr)) => {
                println!("{}: {}", addr, String::from_utf8_lossy(&payload));
            }
            Err(err) => {
                eprintln!("receive failed: {}", err);
                break;
            }
        }
    }
}
