//! Protocol-level tests against a stateful fake instrument.
//!
//! The fake speaks the SDG's newline-framed wire protocol on the far end of
//! a duplex pipe: it tracks the selected waveform per channel and keeps an
//! error queue that drains as it is read, which is what the real hardware
//! does.

use awg_core::capabilities::StatusControl;
use awg_core::serial::wrap_shared;
use awg_driver_siglent::Sdg2082x;
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const NO_ERROR: &str = "0, No error";

struct FakeSdg {
    waveform: [u32; 2],
    error_queue: VecDeque<String>,
}

impl FakeSdg {
    fn new(pending_errors: Vec<String>) -> Self {
        Self {
            waveform: [1, 1],
            error_queue: pending_errors.into(),
        }
    }

    fn handle(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(":C1") {
            return self.handle_channel(0, rest);
        }
        if let Some(rest) = line.strip_prefix(":C2") {
            return self.handle_channel(1, rest);
        }
        match line {
            "*RST" | "*CLS" => None,
            ":SYST:ERR?" => Some(
                self.error_queue
                    .pop_front()
                    .unwrap_or_else(|| NO_ERROR.to_string()),
            ),
            _ => {
                self.error_queue.push_back(format!("-113, {}", line));
                None
            }
        }
    }

    fn handle_channel(&mut self, channel: usize, command: &str) -> Option<String> {
        if command == ":ARWV?" {
            return Some(format!("ARWV,{}", self.waveform[channel]));
        }
        if let Some(index) = command.strip_prefix(":ARWV INDEX,") {
            self.waveform[channel] = index.trim().parse().unwrap();
            return None;
        }
        self.error_queue
            .push_back(format!("-113, {}", command.trim()));
        None
    }
}

fn spawn_fake(
    host: tokio::io::DuplexStream,
    pending_errors: Vec<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut fake = FakeSdg::new(pending_errors);
        let mut lines = BufReader::new(host);
        let mut line = String::new();
        loop {
            line.clear();
            match lines.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if let Some(reply) = fake.handle(&line) {
                        let framed = format!("{}\n", reply);
                        if lines.get_mut().write_all(framed.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    })
}

fn connect() -> (Sdg2082x, tokio::task::JoinHandle<()>) {
    connect_with_errors(Vec::new())
}

fn connect_with_errors(pending_errors: Vec<String>) -> (Sdg2082x, tokio::task::JoinHandle<()>) {
    let (host, device) = tokio::io::duplex(1024);
    let fake = spawn_fake(host, pending_errors);
    (Sdg2082x::with_port(wrap_shared(Box::new(device))), fake)
}

#[tokio::test]
async fn waveform_selection_round_trips() {
    let (awg, _fake) = connect();
    let channel = awg.channel(1).unwrap();

    channel.set_waveform_index(7).await.unwrap();
    assert_eq!(channel.waveform_index().await.unwrap(), 7);

    channel.set_waveform_index(42).await.unwrap();
    assert_eq!(channel.waveform_index().await.unwrap(), 42);
}

#[tokio::test]
async fn channels_hold_independent_waveform_state() {
    let (awg, _fake) = connect();

    awg.channel(1).unwrap().set_waveform_index(3).await.unwrap();
    awg.channel(2).unwrap().set_waveform_index(9).await.unwrap();

    assert_eq!(awg.channel(1).unwrap().waveform_index().await.unwrap(), 3);
    assert_eq!(awg.channel(2).unwrap().waveform_index().await.unwrap(), 9);
}

#[tokio::test]
async fn errors_query_drains_the_queue() {
    let (awg, _fake) =
        connect_with_errors(vec!["-113, Undefined header".to_string()]);

    let first = awg.errors().await.unwrap();
    assert_eq!(first, "-113, Undefined header");

    let second = awg.errors().await.unwrap();
    assert_eq!(second, NO_ERROR, "second read must hit the empty sentinel");
}

#[tokio::test]
async fn reset_and_clear_produce_no_reply() {
    let (awg, _fake) = connect();

    awg.reset().await.unwrap();
    awg.clear_error().await.unwrap();

    // The line stays quiet and the next query is unaffected.
    assert_eq!(awg.errors().await.unwrap(), NO_ERROR);
}
