//! Joins a multicast group and prints every datagram heard there.
//!
//! Run it:
//! - cargo run -p sockmux --example multicast_listen -- 239.255.42.42:5555
//! - cargo run -p sockmux --example multicast_listen -- 239.255.42.42:5555 192.168.1.10
//!   (second argument picks the interface by one of its local addresses)
//!
//! Send something at it from another shell:
//! - echo hi | socat - UDP-DATAGRAM:239.255.42.42:5555

use std::{cell::RefCell, env, net::SocketAddr, rc::Rc, time::Duration};

use sockmux::{parse_group, prelude::*};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let group_addr: SocketAddr = args
        .next()
        .unwrap_or_else(|| "239.255.42.42:5555".to_string())
        .parse()?;
    let group = parse_group(&group_addr.ip().to_string())?;
    let iface = args
        .next()
        .map(|arg| -> Result<InterfaceSpec, std::net::AddrParseError> {
            Ok(InterfaceSpec::Address(arg.parse()?))
        })
        .transpose()?;

    let mut config = SocketConfig::default();
    config.multicast_loop = Some(true);

    let bind_addr: SocketAddr = if group.is_ipv4() {
        format!("0.0.0.0:{}", group_addr.port()).parse()?
    } else {
        format!("[::]:{}", group_addr.port()).parse()?
    };
    let (endpoint, events) = DatagramEndpoint::bind(bind_addr, &config)?;

    let selector = endpoint.join_group(&group, iface.as_ref())?;
    println!("joined {} via {:?}", group, selector);

    let mut task = SelectTask::new();
    task.add(Rc::new(RefCell::new(endpoint)))?;

    loop {
        task.run_task_with_timeout(Duration::from_millis(100))?;
        while let Ok(SocketEvent::Datagram(datagram)) = events.try_recv() {
            println!(
                "[{}] {}",
                datagram.from,
                String::from_utf8_lossy(&datagram.payload)
            );
        }
    }
}
