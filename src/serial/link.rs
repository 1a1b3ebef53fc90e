use std::{
    io::{self, Read},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use log::warn;
use serialport::{DataBits, Parity, SerialPort, SerialPortType, StopBits};
use tokio::sync::mpsc;

use crate::errors::QuizError;
use crate::settings::SerialSettings;

use super::debounce::DebounceFilter;
use super::framing::{is_diagnostic, LineAccumulator};

const READ_CHUNK: usize = 256;
const DRAIN_GRACE: Duration = Duration::from_millis(150);

/// USB descriptor fragments that identify the kiosk's microcontroller
/// bridge when the port is configured as "auto".
const USB_BRIDGE_MARKERS: [&str; 4] = ["cp210", "ch340", "silicon labs", "esp"];

/// What a reader thread reports back to the supervisor. Tokens are tagged
/// with the connection generation so lines still in flight from a closed
/// connection can be discarded after a reconnect.
#[derive(Debug)]
pub(crate) enum ReaderEvent {
    Token { generation: u64, token: String },
    Failed { generation: u64, message: String },
}

/// Acquires the configured device at the fixed panel configuration:
/// 115200 baud, 8 data bits, 1 stop bit, no parity, short read timeout.
pub(crate) fn open_port(
    settings: &SerialSettings,
) -> Result<(String, Box<dyn SerialPort>), QuizError> {
    let name = resolve_port_name(settings)?;
    let mut port = serialport::new(name.as_str(), settings.baud_rate)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .timeout(Duration::from_millis(settings.read_timeout_ms))
        .open()
        .map_err(|err| QuizError::PortUnavailable(format!("{name}: {err}")))?;

    // Some bridge boards hold their TX until the host asserts these lines.
    if let Err(err) = port.write_data_terminal_ready(true) {
        warn!("could not assert DTR on {name}: {err}");
    }
    if let Err(err) = port.write_request_to_send(true) {
        warn!("could not assert RTS on {name}: {err}");
    }

    Ok((name, port))
}

fn resolve_port_name(settings: &SerialSettings) -> Result<String, QuizError> {
    match settings.port.as_str() {
        "" | "none" => Err(QuizError::PortUnavailable("no port configured".into())),
        "auto" => auto_detect_port(),
        name => Ok(name.to_string()),
    }
}

fn auto_detect_port() -> Result<String, QuizError> {
    let ports = serialport::available_ports()
        .map_err(|err| QuizError::PortUnavailable(format!("port scan failed: {err}")))?;

    if ports.is_empty() {
        return Err(QuizError::PortUnavailable("no serial ports present".into()));
    }

    for info in &ports {
        if let SerialPortType::UsbPort(usb) = &info.port_type {
            let label = format!(
                "{} {}",
                usb.manufacturer.as_deref().unwrap_or(""),
                usb.product.as_deref().unwrap_or("")
            )
            .to_ascii_lowercase();

            if USB_BRIDGE_MARKERS.iter().any(|m| label.contains(m)) {
                return Ok(info.port_name.clone());
            }
        }
    }

    Ok(ports[0].port_name.clone())
}

/// Spawns the blocking reader thread for one connection. The thread owns
/// the line buffer and debounce map; only clean tokens cross the channel.
/// On a stop request it drains in-flight bytes for a short grace period
/// before releasing the device, so the next open does not start mid-token.
pub(crate) fn spawn_reader(
    mut port: Box<dyn SerialPort>,
    generation: u64,
    debounce_window: Duration,
    stop: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ReaderEvent>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("birdquiz-serial-{generation}"))
        .spawn(move || {
            let mut accumulator = LineAccumulator::new();
            let mut debounce = DebounceFilter::new(debounce_window);
            let mut buf = [0u8; READ_CHUNK];

            while !stop.load(Ordering::Relaxed) {
                match port.read(&mut buf) {
                    Ok(0) => {}
                    Ok(n) => {
                        for token in accumulator.push(&buf[..n]) {
                            if is_diagnostic(&token) {
                                continue;
                            }
                            if !debounce.accept(&token, Instant::now()) {
                                continue;
                            }
                            if events.send(ReaderEvent::Token { generation, token }).is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::TimedOut => {}
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        let _ = events.send(ReaderEvent::Failed {
                            generation,
                            message: err.to_string(),
                        });
                        return;
                    }
                }
            }

            drain(port.as_mut());
        })
}

fn drain(port: &mut dyn SerialPort) {
    let mut buf = [0u8; 512];
    let deadline = Instant::now() + DRAIN_GRACE;
    while Instant::now() < deadline {
        match port.bytes_to_read() {
            Ok(available) if available > 0 => {
                let _ = port.read(&mut buf);
            }
            _ => thread::sleep(Duration::from_millis(10)),
        }
    }
}
