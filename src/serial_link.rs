//! Serial link to the servo rig.
//!
//! Commands are ASCII lines `X:<deg>,Y:<deg>\n`, written best-effort with no acknowledgement.
//! Sends are rate limited to one attempt per send interval. When no port is open the link holds
//! a [`NullTransport`] and every send is a silent no-op, so the control loop runs the same with or
//! without a connected rig.

use crate::{
    config::SerialConfig,
    constants::SERIAL_WRITE_TIMEOUT_MS,
    servo_control::ServoCommand,
    Error, Result,
};
use log::{debug, info, warn};
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

/// Encode a command as one protocol line
#[must_use]
pub fn encode_command(command: &ServoCommand) -> String {
    format!("{command}\n")
}

/// Byte sink the link writes command lines to
pub trait Transport {
    /// Write one complete line
    fn write_line(&mut self, line: &[u8]) -> Result<()>;

    /// Whether bytes actually leave the process
    fn is_open(&self) -> bool;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Transport used when serial is disabled or failed to open
#[derive(Debug, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn write_line(&mut self, _line: &[u8]) -> Result<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        "serial disabled".to_string()
    }
}

/// A real serial port
pub struct SerialPortTransport {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SerialPortTransport {
    /// Open `port_name` at `baud_rate`
    ///
    /// # Errors
    ///
    /// Returns `SerialOpen` if the port cannot be opened.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(SERIAL_WRITE_TIMEOUT_MS))
            .open()
            .map_err(|e| Error::SerialOpen(format!("{port_name}: {e}")))?;

        Ok(Self {
            port,
            name: format!("{port_name} @ {baud_rate}"),
        })
    }
}

impl Transport for SerialPortTransport {
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.port
            .write_all(line)
            .and_then(|()| self.port.flush())
            .map_err(|e| Error::SerialWrite(format!("{}: {e}", self.name)))
    }

    fn is_open(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Result of a send request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to an open port
    Sent,
    /// Skipped, the send interval has not elapsed
    Throttled,
    /// Attempted with no port open
    Disabled,
    /// The write failed; the link stays as it was
    Failed,
}

/// Rate-limited, best-effort command link
pub struct SerialLink {
    transport: Box<dyn Transport>,
    send_interval: Duration,
    last_attempt: Option<Instant>,
    sent: u64,
}

impl SerialLink {
    #[must_use]
    pub fn new(transport: Box<dyn Transport>, send_interval: Duration) -> Self {
        Self {
            transport,
            send_interval,
            last_attempt: None,
            sent: 0,
        }
    }

    /// A link that never transmits
    #[must_use]
    pub fn disabled(send_interval: Duration) -> Self {
        Self::new(Box::new(NullTransport), send_interval)
    }

    /// Open the configured port, degrading to a disabled link on failure
    ///
    /// On success waits for the controller to settle, then centres both servos.
    #[must_use]
    pub fn open(config: &SerialConfig) -> Self {
        let send_interval = config.send_interval();
        if !config.enabled {
            info!("Serial disabled, running without servo output");
            return Self::disabled(send_interval);
        }

        match SerialPortTransport::open(&config.port, config.baud_rate) {
            Ok(transport) => {
                info!("Serial connection established on {}", transport.describe());
                thread::sleep(Duration::from_millis(config.settle_delay_ms));

                let mut link = Self::new(Box::new(transport), send_interval);
                if link.send_now(ServoCommand::center()) == SendOutcome::Failed {
                    warn!("Failed to send startup centering command");
                }
                link
            }
            Err(e) => {
                warn!("{e}. Continuing without serial (use --no-serial to silence this warning)");
                Self::disabled(send_interval)
            }
        }
    }

    /// Send if the send interval has elapsed
    pub fn send(&mut self, command: ServoCommand) -> SendOutcome {
        self.send_at(Instant::now(), command)
    }

    /// Send as of `now`, if at least one send interval has passed since the last attempt
    pub fn send_at(&mut self, now: Instant, command: ServoCommand) -> SendOutcome {
        if let Some(last) = self.last_attempt {
            if now.saturating_duration_since(last) < self.send_interval {
                return SendOutcome::Throttled;
            }
        }
        self.last_attempt = Some(now);
        self.transmit(command)
    }

    /// Send immediately, ignoring the rate limit
    pub fn send_now(&mut self, command: ServoCommand) -> SendOutcome {
        self.last_attempt = Some(Instant::now());
        self.transmit(command)
    }

    fn transmit(&mut self, command: ServoCommand) -> SendOutcome {
        if !self.transport.is_open() {
            return SendOutcome::Disabled;
        }

        match self.transport.write_line(encode_command(&command).as_bytes()) {
            Ok(()) => {
                self.sent += 1;
                debug!("-> {command}");
                SendOutcome::Sent
            }
            Err(e) => {
                debug!("{e}");
                SendOutcome::Failed
            }
        }
    }

    /// Whether a port is open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    /// Number of commands written successfully
    #[must_use]
    pub const fn sent_count(&self) -> u64 {
        self.sent
    }

    #[must_use]
    pub const fn send_interval(&self) -> Duration {
        self.send_interval
    }

    /// Close the port; later sends are no-ops
    pub fn close(&mut self) {
        if self.transport.is_open() {
            info!("Serial connection closed ({})", self.transport.describe());
        }
        self.transport = Box::new(NullTransport);
    }
}

/// Sweep both servos through `sequence`, pausing `dwell` after each step
///
/// # Errors
///
/// Returns `SerialOpen` if no port is open and `SerialWrite` if a step cannot be sent.
pub fn servo_sweep(link: &mut SerialLink, sequence: &[i32], dwell: Duration) -> Result<usize> {
    if !link.is_connected() {
        return Err(Error::SerialOpen(
            "servo test needs an open serial port (check --port, drop --no-serial)".to_string(),
        ));
    }

    info!("Sweeping servos through {:?}", sequence);
    for (sent, &angle) in sequence.iter().enumerate() {
        let command = ServoCommand::new(angle, angle);
        if link.send_now(command) != SendOutcome::Sent {
            return Err(Error::SerialWrite(format!("failed sending {command} after {sent} steps")));
        }
        info!("-> {command}");
        thread::sleep(dwell);
    }
    Ok(sequence.len())
}
