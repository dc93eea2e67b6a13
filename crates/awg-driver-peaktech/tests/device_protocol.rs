//! Protocol-level tests against a stateful fake instrument.
//!
//! The fake mimics the 4115's quirk of sending replies without any line
//! terminator: commands arrive newline-framed, answers go back as bare
//! tokens. State set through a boolean property must read back through the
//! same property.

use awg_core::capabilities::{DisplayControl, StatusControl};
use awg_core::serial::wrap_shared;
use awg_driver_peaktech::Pt4115;
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const NO_ERROR: &str = "0, No error";

struct FakePt {
    display: bool,
    inverted: [bool; 2],
    error_queue: VecDeque<String>,
}

impl FakePt {
    fn new(pending_errors: Vec<String>) -> Self {
        Self {
            display: true,
            inverted: [false, false],
            error_queue: pending_errors.into(),
        }
    }

    fn handle(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        match line {
            "*RST" | "*CLS" | ":SYST:LOC" => return None,
            ":DISP?" => {
                let state = if self.display { "ON" } else { "OFF" };
                return Some(state.to_string());
            }
            ":DISP ON" => {
                self.display = true;
                return None;
            }
            ":DISP OFF" => {
                self.display = false;
                return None;
            }
            ":SYST:ERR?" => {
                return Some(
                    self.error_queue
                        .pop_front()
                        .unwrap_or_else(|| NO_ERROR.to_string()),
                )
            }
            _ => {}
        }

        for channel in 0..2 {
            let prefix = format!(":OUTP{}", channel + 1);
            if let Some(rest) = line.strip_prefix(&prefix) {
                match rest {
                    ":POL?" => {
                        let state = if self.inverted[channel] { "INV" } else { "NORM" };
                        return Some(state.to_string());
                    }
                    ":POL INV" => {
                        self.inverted[channel] = true;
                        return None;
                    }
                    ":POL NORM" => {
                        self.inverted[channel] = false;
                        return None;
                    }
                    _ => {}
                }
            }
        }

        self.error_queue.push_back(format!("-113, {}", line));
        None
    }
}

fn connect() -> (Pt4115, tokio::task::JoinHandle<()>) {
    connect_with_errors(Vec::new())
}

fn connect_with_errors(pending_errors: Vec<String>) -> (Pt4115, tokio::task::JoinHandle<()>) {
    let (host, device) = tokio::io::duplex(1024);
    let fake = tokio::spawn(async move {
        let mut fake = FakePt::new(pending_errors);
        let mut lines = BufReader::new(host);
        let mut line = String::new();
        loop {
            line.clear();
            match lines.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if let Some(reply) = fake.handle(&line) {
                        // No reply terminator, like the hardware.
                        if lines.get_mut().write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    });
    (Pt4115::with_port(wrap_shared(Box::new(device)), 2), fake)
}

#[tokio::test]
async fn display_set_then_get_round_trips() {
    let (awg, _fake) = connect();

    awg.set_display(false).await.unwrap();
    assert!(!awg.display().await.unwrap());

    awg.set_display(true).await.unwrap();
    assert!(awg.display().await.unwrap());
}

#[tokio::test]
async fn inversion_set_then_get_round_trips() {
    let (awg, _fake) = connect();
    let channel = awg.channel(1).unwrap();

    channel.set_inversion(true).await.unwrap();
    assert!(channel.inversion().await.unwrap());

    channel.set_inversion(false).await.unwrap();
    assert!(!channel.inversion().await.unwrap());
}

#[tokio::test]
async fn channels_invert_independently() {
    let (awg, _fake) = connect();

    awg.channel(2).unwrap().set_inversion(true).await.unwrap();

    assert!(!awg.channel(1).unwrap().inversion().await.unwrap());
    assert!(awg.channel(2).unwrap().inversion().await.unwrap());
}

#[tokio::test]
async fn errors_query_drains_the_queue() {
    let (awg, _fake) = connect_with_errors(vec!["-113, Undefined header".to_string()]);

    assert_eq!(awg.errors().await.unwrap(), "-113, Undefined header");
    assert_eq!(awg.errors().await.unwrap(), NO_ERROR);
}
