//! UDP echo server driven one reactor turn at a time.
//!
//! Run it:
//! - cargo run -p sockmux --example udp_echo -- 127.0.0.1:7777
//!
//! Then talk to it with any UDP client, e.g.:
//! - socat - UDP:127.0.0.1:7777

use std::{cell::RefCell, env, net::SocketAddr, rc::Rc, time::Duration};

use sockmux::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7777".to_string())
        .parse()?;

    let config = SocketConfig::default();
    let (endpoint, events) = DatagramEndpoint::bind(addr, &config)?;
    println!("sockmux echo listening on {}", endpoint.local_addr()?);

    let endpoint = Rc::new(RefCell::new(endpoint));
    let mut task = SelectTask::new();
    task.add(endpoint.clone())?;

    let mut turns: u64 = 0;
    loop {
        task.run_task_with_timeout(Duration::from_millis(50))?;

        while let Ok(event) = events.try_recv() {
            if let SocketEvent::Datagram(datagram) = event {
                println!(
                    "[echo] {} bytes from {}",
                    datagram.payload.len(),
                    datagram.from
                );
                endpoint
                    .borrow_mut()
                    .enqueue(datagram.from, datagram.payload);
            }
        }

        turns += 1;
        if turns % 200 == 0 {
            println!("[stats] {}", task.stats());
        }
    }
}
