//! Background poller: one worker thread per connection that runs the read
//! pump and republishes queued messages as `message` events.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::debug;

use super::client::{Inner, PumpStatus};
use crate::events::Event;

pub(crate) fn spawn(inner: Arc<Inner>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("wsclient-poller".into())
        .spawn(move || run(&inner))
}

fn run(inner: &Inner) {
    debug!("poller started");
    while !inner.is_closed_flag() {
        let poll = inner.config().timeouts.poll;
        let result = inner.pump(poll);

        for message in inner.queue.drain() {
            inner.events.emit(&Event::Message(message));
        }

        match result {
            Ok(PumpStatus::Idle) => {}
            Ok(PumpStatus::PeerClosed) => {
                inner.close();
                break;
            }
            Err(e) => {
                inner.events.emit(&Event::Error(e));
                break;
            }
        }
    }
    debug!("poller stopped");
}
